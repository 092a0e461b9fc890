use tracing::info;

use crate::draw::StageOutcome;
use crate::engine::RaffleEngine;
use crate::events::Refund;
use crate::raffle_error::RaffleResult;
use crate::raffle_instruction::RaffleInstruction;
use crate::raffle_state::{Entry, Raffle, TokenRequirement, Winner};

/// What an instruction produced
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionOutcome {
    Raffle(Raffle),
    Requirement(TokenRequirement),
    Entry(Entry),
    Stage(StageOutcome),
    Refunds(Vec<Refund>),
    Winner(Winner),
    Balance(u64),
}

pub struct Processor;

impl Processor {
    /// Decode and run a borsh-encoded instruction
    pub fn process(engine: &RaffleEngine, instruction_data: &[u8]) -> RaffleResult<InstructionOutcome> {
        let instruction = RaffleInstruction::unpack(instruction_data)?;
        Self::process_instruction(engine, instruction)
    }

    pub fn process_instruction(
        engine: &RaffleEngine,
        instruction: RaffleInstruction,
    ) -> RaffleResult<InstructionOutcome> {
        info!("Instruction: {}", instruction.name());

        match instruction {
            RaffleInstruction::CreateRaffle { owner, raffle } => engine
                .lifecycle()
                .create_raffle(owner, raffle)
                .map(InstructionOutcome::Raffle),
            RaffleInstruction::AddRequirement {
                owner,
                raffle_id,
                requirement,
            } => engine
                .lifecycle()
                .add_requirement(owner, raffle_id, requirement)
                .map(InstructionOutcome::Requirement),
            RaffleInstruction::PublishRaffle { owner, raffle_id } => engine
                .lifecycle()
                .publish(owner, raffle_id)
                .map(InstructionOutcome::Raffle),
            RaffleInstruction::SubmitEntry {
                participant,
                raffle_id,
                ticket_count,
                token_id,
            } => engine
                .entries()
                .submit_entry(participant, raffle_id, ticket_count, token_id)
                .map(InstructionOutcome::Entry),
            RaffleInstruction::GrantSponsoredEntry {
                owner,
                participant,
                raffle_id,
                ticket_count,
            } => engine
                .entries()
                .grant_sponsored_entry(owner, participant, raffle_id, ticket_count)
                .map(InstructionOutcome::Entry),
            RaffleInstruction::CloseStage { owner, raffle_id } => engine
                .lifecycle()
                .close_stage(owner, raffle_id)
                .map(InstructionOutcome::Raffle),
            RaffleInstruction::CloseRaffle { owner, raffle_id } => engine
                .lifecycle()
                .close_early(owner, raffle_id)
                .map(InstructionOutcome::Raffle),
            RaffleInstruction::EndIfDue { raffle_id } => engine
                .lifecycle()
                .end_if_due(raffle_id)
                .map(InstructionOutcome::Raffle),
            RaffleInstruction::CancelRaffle { owner, raffle_id } => engine
                .lifecycle()
                .cancel(owner, raffle_id)
                .map(InstructionOutcome::Refunds),
            RaffleInstruction::DrawStage { raffle_id, stage } => engine
                .draws()
                .draw_stage(raffle_id, stage)
                .map(InstructionOutcome::Stage),
            RaffleInstruction::ClaimPrize {
                participant,
                winner_id,
            } => engine
                .draws()
                .claim_prize(participant, winner_id)
                .map(InstructionOutcome::Winner),
            RaffleInstruction::CreditTokens {
                participant,
                token_id,
                amount,
            } => engine
                .ledger()
                .credit(participant, token_id, amount)
                .map(InstructionOutcome::Balance),
        }
    }
}
