use thiserror::Error;

use crate::raffle_state::{RaffleStatus, Stage, TokenId};

/// Why a participant failed a raffle's entry requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    /// Token balance is below the required amount
    InsufficientTokens {
        token_id: TokenId,
        /// Amount needed for every requested ticket
        required: u64,
        available: u64,
    },
    /// Participant does not follow the raffle's creator
    NotFollowing,
    /// A token requirement does not name the token it requires
    MissingToken,
}

impl std::fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligibility::InsufficientTokens { token_id, required, available } => write!(
                f,
                "token {} balance {} is below the required {}",
                token_id, available, required
            ),
            Ineligibility::NotFollowing => write!(f, "participant does not follow the creator"),
            Ineligibility::MissingToken => write!(f, "requirement does not reference a token"),
        }
    }
}

/// Errors that may be returned by the raffle engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Participant does not satisfy the raffle's entry requirements
    #[error("Requirement not met: {0}")]
    RequirementNotMet(Ineligibility),

    /// Token balance cannot cover the debit
    #[error("Insufficient balance: needed {needed}, had {available}")]
    InsufficientBalance { needed: u64, available: u64 },

    /// Raffle is not accepting entries
    #[error("Raffle is not active")]
    RaffleNotActive,

    /// Raffle start date has not been reached
    #[error("Raffle has not started yet")]
    RaffleNotStarted,

    /// Operation is not valid in the raffle's current state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Final stage has already been drawn
    #[error("Raffle has already been drawn")]
    AlreadyDrawn,

    /// Another draw for the same raffle stage is running
    #[error("A draw for stage {0:?} is already in progress")]
    DrawInProgress(Stage),

    /// Lifecycle transition is not allowed
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: RaffleStatus, to: RaffleStatus },

    /// Entry would push the raffle past its maximum entries
    #[error("Capacity exceeded: requested {requested}, remaining {remaining}")]
    CapacityExceeded { requested: u64, remaining: u64 },

    /// No eligible entries to draw from
    #[error("No eligible entries for stage {0:?}")]
    NoEntries(Stage),

    /// Unknown raffle, entry, winner or participant
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Only the raffle owner can perform this action
    #[error("Only the raffle owner can perform this action")]
    NotRaffleOwner,

    /// Only the winning participant can claim the prize
    #[error("Not the winner")]
    NotWinner,

    /// Prize has already been claimed
    #[error("Prize already claimed")]
    PrizeAlreadyClaimed,

    /// Caller supplied an out-of-range value
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Encoded instruction could not be decoded
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow")]
    Overflow,

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for RaffleError {
    fn from(e: std::io::Error) -> Self {
        RaffleError::Storage(e.to_string())
    }
}

pub type RaffleResult<T> = Result<T, RaffleError>;
