use borsh::{BorshDeserialize, BorshSerialize};
use serde::Deserialize;

use crate::lifecycle::{NewRaffle, RequirementSpec};
use crate::raffle_error::{RaffleError, RaffleResult};
use crate::raffle_state::{CreatorId, ParticipantId, RaffleId, Stage, TokenId, WinnerId};

/// Commands accepted by the processor. Callers are already authenticated by
/// the host; `owner` and `participant` are trusted identities.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize, Deserialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum RaffleInstruction {
    /// Create a raffle in Draft
    CreateRaffle {
        owner: CreatorId,
        raffle: NewRaffle,
    },

    /// Attach a requirement to a draft raffle
    AddRequirement {
        owner: CreatorId,
        raffle_id: RaffleId,
        requirement: RequirementSpec,
    },

    /// Draft -> Active
    PublishRaffle {
        owner: CreatorId,
        raffle_id: RaffleId,
    },

    /// Buy tickets, spending `token_id` when a token path is available
    SubmitEntry {
        participant: ParticipantId,
        raffle_id: RaffleId,
        ticket_count: u64,
        token_id: Option<TokenId>,
    },

    /// Owner-granted tickets that skip requirements
    GrantSponsoredEntry {
        owner: CreatorId,
        participant: ParticipantId,
        raffle_id: RaffleId,
        ticket_count: u64,
    },

    /// Close the current intermediate stage for drawing
    CloseStage {
        owner: CreatorId,
        raffle_id: RaffleId,
    },

    /// Active -> Ended before the end date
    CloseRaffle {
        owner: CreatorId,
        raffle_id: RaffleId,
    },

    /// Timer tick: Active -> Ended once the end date has passed
    EndIfDue {
        raffle_id: RaffleId,
    },

    /// Cancel and report refunds
    CancelRaffle {
        owner: CreatorId,
        raffle_id: RaffleId,
    },

    /// Draw a stage
    DrawStage {
        raffle_id: RaffleId,
        stage: Stage,
    },

    /// Winner claims a prize
    ClaimPrize {
        participant: ParticipantId,
        winner_id: WinnerId,
    },

    /// Issue tokens to a participant
    CreditTokens {
        participant: ParticipantId,
        token_id: TokenId,
        amount: u64,
    },
}

impl RaffleInstruction {
    /// Unpacks a borsh-encoded byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> RaffleResult<Self> {
        if input.is_empty() {
            return Err(RaffleError::InvalidInstructionData);
        }
        Self::try_from_slice(input).map_err(|_| RaffleError::InvalidInstructionData)
    }

    pub fn pack(&self) -> RaffleResult<Vec<u8>> {
        Ok(self.try_to_vec()?)
    }

    /// Parses the JSON form used by the host's HTTP layer
    pub fn from_json(json: &str) -> RaffleResult<Self> {
        serde_json::from_str(json).map_err(|_| RaffleError::InvalidInstructionData)
    }

    pub fn name(&self) -> &'static str {
        match self {
            RaffleInstruction::CreateRaffle { .. } => "Create Raffle",
            RaffleInstruction::AddRequirement { .. } => "Add Requirement",
            RaffleInstruction::PublishRaffle { .. } => "Publish Raffle",
            RaffleInstruction::SubmitEntry { .. } => "Submit Entry",
            RaffleInstruction::GrantSponsoredEntry { .. } => "Grant Sponsored Entry",
            RaffleInstruction::CloseStage { .. } => "Close Stage",
            RaffleInstruction::CloseRaffle { .. } => "Close Raffle",
            RaffleInstruction::EndIfDue { .. } => "End If Due",
            RaffleInstruction::CancelRaffle { .. } => "Cancel Raffle",
            RaffleInstruction::DrawStage { .. } => "Draw Stage",
            RaffleInstruction::ClaimPrize { .. } => "Claim Prize",
            RaffleInstruction::CreditTokens { .. } => "Credit Tokens",
        }
    }
}
