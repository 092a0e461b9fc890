// Raffle Engine
// Token-gated entries, weighted multi-stage draws and the raffle lifecycle,
// independent of any web framework or storage engine

// Core modules
pub mod clock;
pub mod config;
pub mod engine;
pub mod events;
pub mod store;

// Raffle modules
pub mod draw;
pub mod entry;
pub mod ledger;
pub mod lifecycle;
pub mod raffle_error;
pub mod raffle_instruction;
pub mod raffle_processor;
pub mod raffle_state;
pub mod requirements;

// Randomness for draws
pub mod vrf;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use draw::{DrawEngine, StageOutcome};
pub use engine::{RaffleEngine, RaffleEngineBuilder};
pub use entry::EntryService;
pub use events::{EventBus, RaffleEvent, Refund};
pub use ledger::TokenLedger;
pub use lifecycle::{NewRaffle, RaffleLifecycle, RequirementSpec};
pub use raffle_error::{Ineligibility, RaffleError, RaffleResult};
pub use raffle_instruction::RaffleInstruction;
pub use raffle_processor::{InstructionOutcome, Processor};
pub use raffle_state::*;
pub use requirements::{Eligibility, FollowGraph, InMemoryFollows, RequirementEvaluator};
pub use store::{KeyValue, MemoryBackend, Store};
pub use vrf::{OsEntropy, RandomSource, SeededSource};
