#![allow(dead_code)]

use std::sync::Arc;

use raffle_engine::{
    CreatorId, InMemoryFollows, ManualClock, NewRaffle, Raffle, RaffleEngine, RaffleType,
    RequirementKind, RequirementSpec, SeededSource, TokenId, UnixTimestamp,
};

pub const OWNER: CreatorId = CreatorId(1);
pub const TOKEN: TokenId = TokenId(77);
pub const START: UnixTimestamp = 1_000;
pub const END: UnixTimestamp = 2_000;

pub struct Harness {
    pub engine: Arc<RaffleEngine>,
    pub clock: Arc<ManualClock>,
    pub follows: Arc<InMemoryFollows>,
}

impl Harness {
    pub fn new(seed: u64) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let follows = Arc::new(InMemoryFollows::default());
        let engine = RaffleEngine::builder()
            .clock(clock.clone())
            .follows(follows.clone())
            .randomness(Arc::new(SeededSource::new(seed)))
            .build()
            .unwrap();
        Self {
            engine: Arc::new(engine),
            clock,
            follows,
        }
    }

    pub fn draft(&self, params: NewRaffle) -> Raffle {
        self.engine.lifecycle().create_raffle(OWNER, params).unwrap()
    }

    /// Create and publish, leaving the clock in the middle of the window
    pub fn active(&self, params: NewRaffle) -> Raffle {
        let raffle = self.draft(params);
        self.clock.set(START);
        self.engine.lifecycle().publish(OWNER, raffle.id).unwrap();
        self.clock.set(START + 500);
        self.engine.raffle(raffle.id).unwrap()
    }

    pub fn pass_end(&self) {
        self.clock.set(END + 1);
    }
}

pub fn params(
    raffle_type: RaffleType,
    max_entries: u64,
    prize_count: u32,
    stage_advance: Vec<u32>,
    requirements: Vec<RequirementSpec>,
) -> NewRaffle {
    NewRaffle {
        title: "Creator giveaway".to_string(),
        raffle_type,
        start_date: START,
        end_date: END,
        max_entries,
        prize_count,
        stage_advance,
        requirements,
    }
}

pub fn free(max_entries: u64, prize_count: u32) -> NewRaffle {
    params(RaffleType::Standard, max_entries, prize_count, vec![], vec![])
}

pub fn token_requirement(amount: u64) -> RequirementSpec {
    RequirementSpec {
        token_id: Some(TOKEN),
        required_amount: amount,
        kind: RequirementKind::Token,
        optional: false,
    }
}

pub fn follow_requirement(optional: bool) -> RequirementSpec {
    RequirementSpec {
        token_id: None,
        required_amount: 0,
        kind: RequirementKind::Follow,
        optional,
    }
}
