use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp in seconds
pub type UnixTimestamp = i64;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            BorshSerialize, BorshDeserialize, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }
    };
}

record_id!(
    /// Identifier of a raffle
    RaffleId
);
record_id!(
    /// Identifier of a creator (raffle owner)
    CreatorId
);
record_id!(
    /// Identifier of a participant
    ParticipantId
);
record_id!(
    /// Identifier of a creator-issued token
    TokenId
);
record_id!(RequirementId);
record_id!(EntryId);
record_id!(WinnerId);

/// Status of a raffle
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    /// Created, not yet published
    Draft,
    /// Open for entries inside its time window
    Active,
    /// Closed for entries, waiting for the final draw
    Ended,
    /// Final stage drawn, winners recorded
    Drawn,
    /// Cancelled by the owner
    Cancelled,
}

impl RaffleStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RaffleStatus::Drawn | RaffleStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `to`
    pub fn can_transition_to(self, to: RaffleStatus) -> bool {
        use RaffleStatus::*;
        match (self, to) {
            (Draft, Active) | (Active, Ended) | (Ended, Drawn) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RaffleType {
    Standard,
    Multiple,
    TwoStage,
    ThreeStage,
    Instant,
    Progressive,
}

impl RaffleType {
    /// Qualification rounds in draw order. The last one produces winners.
    pub fn stages(self) -> &'static [Stage] {
        match self {
            RaffleType::TwoStage => &[Stage::Primary, Stage::Final],
            RaffleType::ThreeStage => &[Stage::Primary, Stage::Secondary, Stage::Final],
            _ => &[Stage::Final],
        }
    }

    pub fn is_multi_stage(self) -> bool {
        self.stages().len() > 1
    }
}

/// Qualification round of a raffle
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
    BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Primary,
    Secondary,
    Final,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    /// Hold at least the required amount of the token
    Token,
    /// Follow the raffle's creator
    Follow,
    /// Token and follow
    Both,
    /// Token or follow
    Either,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Token,
    Follow,
    Free,
    Sponsored,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Unclaimed,
    Claimed,
}

/// Raffle record
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Raffle {
    pub id: RaffleId,
    /// Creator that owns the raffle
    pub creator: CreatorId,
    pub title: String,
    pub raffle_type: RaffleType,
    pub start_date: UnixTimestamp,
    pub end_date: UnixTimestamp,
    pub max_entries: u64,
    /// Tickets allocated so far
    pub current_entries: u64,
    pub prize_count: u32,
    /// Entries advancing out of each non-final stage, in stage order
    pub stage_advance: Vec<u32>,
    pub status: RaffleStatus,
    pub current_stage: Stage,
    /// Current (non-final) stage no longer takes part in entry and is ready to draw
    pub stage_closed: bool,
    /// Next entry number to hand out, starting at 1
    pub next_entry_number: u64,
    pub created_at: UnixTimestamp,
}

impl Raffle {
    pub fn stages(&self) -> &'static [Stage] {
        self.raffle_type.stages()
    }

    pub fn first_stage(&self) -> Stage {
        self.stages()[0]
    }

    pub fn final_stage(&self) -> Stage {
        *self.stages().last().unwrap_or(&Stage::Final)
    }

    pub fn stage_index(&self, stage: Stage) -> Option<usize> {
        self.stages().iter().position(|s| *s == stage)
    }

    pub fn next_stage(&self, stage: Stage) -> Option<Stage> {
        self.stage_index(stage)
            .and_then(|i| self.stages().get(i + 1).copied())
    }

    pub fn remaining_capacity(&self) -> u64 {
        self.max_entries.saturating_sub(self.current_entries)
    }

    /// Inclusive entry window check
    pub fn in_window(&self, now: UnixTimestamp) -> bool {
        now >= self.start_date && now <= self.end_date
    }

    pub fn has_ended(&self, now: UnixTimestamp) -> bool {
        now > self.end_date
    }
}

/// Entry requirement attached to a raffle
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TokenRequirement {
    pub id: RequirementId,
    pub raffle_id: RaffleId,
    pub token_id: Option<TokenId>,
    /// Amount per ticket; 0 means free
    pub required_amount: u64,
    pub kind: RequirementKind,
    /// Alternative (OR) path instead of a mandatory (AND) condition
    pub optional: bool,
}

/// Tokens debited for an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TokenSpend {
    pub token_id: TokenId,
    pub amount: u64,
}

/// A participant's ticket(s) in a raffle
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub raffle_id: RaffleId,
    pub participant: ParticipantId,
    pub kind: EntryKind,
    pub tokens_spent: u64,
    pub spends: Vec<TokenSpend>,
    /// Tickets bought with this entry; also its draw weight
    pub entry_count: u64,
    pub stage: Stage,
    pub qualified_for_next_stage: bool,
    /// Latest stage this entry was advanced into
    pub advanced_to: Option<Stage>,
    pub entry_numbers: Vec<u64>,
    pub created_at: UnixTimestamp,
}

impl Entry {
    /// Whether the entry takes part in the draw for `stage`
    pub fn competes_in(&self, stage: Stage) -> bool {
        self.stage == stage || self.advanced_to.map_or(false, |reached| reached >= stage)
    }
}

/// A drawn entry awarded a prize position
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Winner {
    pub id: WinnerId,
    pub raffle_id: RaffleId,
    pub entry_id: EntryId,
    pub participant: ParticipantId,
    /// 1-based prize position in draw order
    pub position: u32,
    pub stage: Stage,
    /// Specific entry number drawn
    pub winning_number: u64,
    pub claim_status: ClaimStatus,
    pub claimed_at: Option<UnixTimestamp>,
}

/// Spendable balance of one token for one participant
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TokenBalance {
    pub participant: ParticipantId,
    pub token_id: TokenId,
    pub amount: u64,
}

/// One selection event of a draw
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Selection {
    pub entry_id: EntryId,
    pub winning_number: u64,
}

/// Audit trail of a stage draw. Replaying `seed` over the same candidates
/// reproduces `selections`.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct DrawRecord {
    pub raffle_id: RaffleId,
    pub stage: Stage,
    pub seed: [u8; 32],
    pub candidate_count: u64,
    pub total_weight: u64,
    pub selections: Vec<Selection>,
    pub drawn_at: UnixTimestamp,
}
