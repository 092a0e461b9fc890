use serde::Deserialize;

use crate::raffle_error::{RaffleError, RaffleResult};

/// Engine-wide limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most tickets a single submission may request
    pub max_tickets_per_submission: u64,
    /// Upper bound for a raffle's prize count
    pub max_prize_count: u32,
    /// Whether owners may end an active raffle before its end date
    pub allow_early_close: bool,
    /// Buffered notifications per subscriber before the slowest one lags
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tickets_per_submission: 1_000,
            max_prize_count: 100,
            allow_early_close: true,
            event_capacity: 1_024,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> RaffleResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|_| RaffleError::InvalidArgument("malformed engine config"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RaffleResult<()> {
        if self.max_tickets_per_submission == 0 {
            return Err(RaffleError::InvalidArgument(
                "max_tickets_per_submission must be greater than zero",
            ));
        }
        if self.max_prize_count == 0 {
            return Err(RaffleError::InvalidArgument("max_prize_count must be greater than zero"));
        }
        if self.event_capacity == 0 {
            return Err(RaffleError::InvalidArgument("event_capacity must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "max_prize_count": 3 }"#).unwrap();
        assert_eq!(config.max_prize_count, 3);
        assert_eq!(config.max_tickets_per_submission, 1_000);
        assert!(config.allow_early_close);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let err = EngineConfig::from_json(r#"{ "max_tickets_per_submission": 0 }"#).unwrap_err();
        assert!(matches!(err, RaffleError::InvalidArgument(_)));
    }
}
