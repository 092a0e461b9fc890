use borsh::{BorshDeserialize, BorshSerialize};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{load_entries, EngineContext};
use crate::events::{RaffleEvent, Refund};
use crate::raffle_error::{RaffleError, RaffleResult};
use crate::raffle_state::{
    CreatorId, Raffle, RaffleId, RaffleStatus, RaffleType, RequirementId, RequirementKind,
    TokenId, TokenRequirement, UnixTimestamp,
};
use crate::store::{Key, Sequence, Transaction};

/// Requirement as supplied by the raffle owner
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize, Deserialize)]
pub struct RequirementSpec {
    pub token_id: Option<TokenId>,
    pub required_amount: u64,
    pub kind: RequirementKind,
    #[serde(default)]
    pub optional: bool,
}

/// Parameters of a raffle to create
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize, Deserialize)]
pub struct NewRaffle {
    pub title: String,
    pub raffle_type: RaffleType,
    pub start_date: UnixTimestamp,
    pub end_date: UnixTimestamp,
    pub max_entries: u64,
    pub prize_count: u32,
    /// Entries advancing out of each non-final stage
    #[serde(default)]
    pub stage_advance: Vec<u32>,
    #[serde(default)]
    pub requirements: Vec<RequirementSpec>,
}

/// Raffle status state machine
pub struct RaffleLifecycle {
    ctx: Arc<EngineContext>,
}

impl RaffleLifecycle {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Create a raffle in Draft together with its requirements
    #[tracing::instrument(level = "debug", skip(self, params), fields(title = %params.title))]
    pub fn create_raffle(&self, owner: CreatorId, params: NewRaffle) -> RaffleResult<Raffle> {
        validate_new_raffle(&self.ctx, &params)?;
        let now = self.ctx.now();

        let raffle = self.ctx.store.transact(|tx| {
            let raffle_id = RaffleId(tx.next_id(Sequence::Raffle)?);
            let raffle = Raffle {
                id: raffle_id,
                creator: owner,
                title: params.title.clone(),
                raffle_type: params.raffle_type,
                start_date: params.start_date,
                end_date: params.end_date,
                max_entries: params.max_entries,
                current_entries: 0,
                prize_count: params.prize_count,
                stage_advance: params.stage_advance.clone(),
                status: RaffleStatus::Draft,
                current_stage: params.raffle_type.stages()[0],
                stage_closed: false,
                next_entry_number: 1,
                created_at: now,
            };
            tx.put(Key::Raffle(raffle_id), &raffle)?;
            for spec in &params.requirements {
                insert_requirement(tx, raffle_id, spec)?;
            }
            Ok(raffle)
        })?;

        info!(
            raffle_id = %raffle.id,
            creator = %owner,
            raffle_type = ?raffle.raffle_type,
            max_entries = raffle.max_entries,
            prize_count = raffle.prize_count,
            "raffle created"
        );
        self.ctx.events.publish(RaffleEvent::RaffleCreated {
            raffle_id: raffle.id,
            creator: owner,
        });
        Ok(raffle)
    }

    /// Attach another requirement while the raffle is still a draft
    pub fn add_requirement(
        &self,
        owner: CreatorId,
        raffle_id: RaffleId,
        spec: RequirementSpec,
    ) -> RaffleResult<TokenRequirement> {
        validate_requirement(&spec)?;
        let requirement = self.ctx.store.transact(|tx| {
            let raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            ensure_owner(&raffle, owner)?;
            if raffle.status != RaffleStatus::Draft {
                return Err(RaffleError::InvalidState(
                    "requirements can only change while the raffle is a draft",
                ));
            }
            insert_requirement(tx, raffle_id, &spec)
        })?;
        info!(%raffle_id, requirement_id = %requirement.id, kind = ?requirement.kind, "requirement added");
        Ok(requirement)
    }

    /// Draft -> Active. The start date must have been reached and the end
    /// date must not have passed.
    pub fn publish(&self, owner: CreatorId, raffle_id: RaffleId) -> RaffleResult<Raffle> {
        let now = self.ctx.now();
        let raffle = self.update(raffle_id, |raffle| {
            ensure_owner(raffle, owner)?;
            if raffle.status == RaffleStatus::Draft && now < raffle.start_date {
                return Err(RaffleError::RaffleNotStarted);
            }
            if raffle.status == RaffleStatus::Draft && raffle.has_ended(now) {
                return Err(RaffleError::InvalidState("raffle window has already closed"));
            }
            transition(raffle, RaffleStatus::Active)
        })?;
        info!(%raffle_id, "raffle published");
        self.ctx
            .events
            .publish(RaffleEvent::RafflePublished { raffle_id });
        Ok(raffle)
    }

    /// Close the current non-final stage of an active multi-stage raffle so
    /// it can be drawn
    pub fn close_stage(&self, owner: CreatorId, raffle_id: RaffleId) -> RaffleResult<Raffle> {
        let raffle = self.update(raffle_id, |raffle| {
            ensure_owner(raffle, owner)?;
            if raffle.status != RaffleStatus::Active {
                return Err(RaffleError::RaffleNotActive);
            }
            if raffle.current_stage == raffle.final_stage() {
                return Err(RaffleError::InvalidState(
                    "the final stage closes when the raffle ends",
                ));
            }
            if raffle.stage_closed {
                return Err(RaffleError::InvalidState("stage is already closed"));
            }
            raffle.stage_closed = true;
            Ok(())
        })?;
        info!(%raffle_id, stage = ?raffle.current_stage, "stage closed");
        self.ctx.events.publish(RaffleEvent::StageClosed {
            raffle_id,
            stage: raffle.current_stage,
        });
        Ok(raffle)
    }

    /// Active -> Ended before the end date
    pub fn close_early(&self, owner: CreatorId, raffle_id: RaffleId) -> RaffleResult<Raffle> {
        if !self.ctx.config.allow_early_close {
            return Err(RaffleError::InvalidState("early close is disabled"));
        }
        let raffle = self.update(raffle_id, |raffle| {
            ensure_owner(raffle, owner)?;
            transition(raffle, RaffleStatus::Ended)
        })?;
        info!(%raffle_id, "raffle closed early");
        self.ctx.events.publish(RaffleEvent::RaffleEnded { raffle_id });
        Ok(raffle)
    }

    /// Active -> Ended once the end date has passed; otherwise a no-op.
    /// Called by the host's timer.
    pub fn end_if_due(&self, raffle_id: RaffleId) -> RaffleResult<Raffle> {
        let now = self.ctx.now();
        let mut ended = false;
        let raffle = self.update(raffle_id, |raffle| {
            ended = end_if_expired(raffle, now)?;
            Ok(())
        })?;
        if ended {
            info!(%raffle_id, end_date = raffle.end_date, "raffle ended");
            self.ctx.events.publish(RaffleEvent::RaffleEnded { raffle_id });
        }
        Ok(raffle)
    }

    /// Any non-terminal state -> Cancelled. Returns the token refunds owed
    /// for recorded entries; paying them out is up to the caller.
    pub fn cancel(&self, owner: CreatorId, raffle_id: RaffleId) -> RaffleResult<Vec<Refund>> {
        let refunds = self.ctx.store.transact(|tx| {
            let mut raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            ensure_owner(&raffle, owner)?;
            transition(&mut raffle, RaffleStatus::Cancelled)?;
            tx.put(Key::Raffle(raffle_id), &raffle)?;

            let entries = load_entries(tx, &Key::RaffleEntries(raffle_id))?;
            Ok(entries
                .iter()
                .flat_map(|entry| {
                    entry.spends.iter().map(move |spend| Refund {
                        participant: entry.participant,
                        entry_id: entry.id,
                        token_id: spend.token_id,
                        amount: spend.amount,
                    })
                })
                .collect::<Vec<_>>())
        })?;

        info!(%raffle_id, refunds = refunds.len(), "raffle cancelled");
        self.ctx.events.publish(RaffleEvent::RaffleCancelled {
            raffle_id,
            refunds: refunds.clone(),
        });
        Ok(refunds)
    }

    fn update<F>(&self, raffle_id: RaffleId, f: F) -> RaffleResult<Raffle>
    where
        F: FnOnce(&mut Raffle) -> RaffleResult<()>,
    {
        let result = self.ctx.store.transact(|tx| {
            let mut raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            f(&mut raffle)?;
            tx.put(Key::Raffle(raffle_id), &raffle)?;
            Ok(raffle)
        });
        if let Err(err) = &result {
            warn!(%raffle_id, %err, "lifecycle change rejected");
        }
        result
    }
}

/// Move `raffle` to `to` if the state machine allows it
pub(crate) fn transition(raffle: &mut Raffle, to: RaffleStatus) -> RaffleResult<()> {
    if !raffle.status.can_transition_to(to) {
        return Err(RaffleError::InvalidTransition {
            from: raffle.status,
            to,
        });
    }
    raffle.status = to;
    Ok(())
}

/// Automatic Active -> Ended at the end date. Returns whether it fired.
pub(crate) fn end_if_expired(raffle: &mut Raffle, now: UnixTimestamp) -> RaffleResult<bool> {
    if raffle.status == RaffleStatus::Active && raffle.has_ended(now) {
        transition(raffle, RaffleStatus::Ended)?;
        return Ok(true);
    }
    Ok(false)
}

pub(crate) fn ensure_owner(raffle: &Raffle, owner: CreatorId) -> RaffleResult<()> {
    if raffle.creator != owner {
        return Err(RaffleError::NotRaffleOwner);
    }
    Ok(())
}

fn insert_requirement(
    tx: &mut Transaction<'_>,
    raffle_id: RaffleId,
    spec: &RequirementSpec,
) -> RaffleResult<TokenRequirement> {
    let requirement = TokenRequirement {
        id: RequirementId(tx.next_id(Sequence::Requirement)?),
        raffle_id,
        token_id: spec.token_id,
        required_amount: spec.required_amount,
        kind: spec.kind,
        optional: spec.optional,
    };
    tx.put(Key::Requirement(requirement.id), &requirement)?;
    tx.push_index(Key::RaffleRequirements(raffle_id), requirement.id)?;
    Ok(requirement)
}

fn validate_new_raffle(ctx: &EngineContext, params: &NewRaffle) -> RaffleResult<()> {
    if params.title.trim().is_empty() {
        return Err(RaffleError::InvalidArgument("title must not be empty"));
    }
    if params.end_date <= params.start_date {
        return Err(RaffleError::InvalidArgument("end date must be after start date"));
    }
    if params.max_entries == 0 {
        return Err(RaffleError::InvalidArgument("max entries must be greater than zero"));
    }
    if params.prize_count == 0 || params.prize_count > ctx.config.max_prize_count {
        return Err(RaffleError::InvalidArgument("prize count is out of range"));
    }
    let intermediate = params.raffle_type.stages().len() - 1;
    if params.stage_advance.len() != intermediate {
        return Err(RaffleError::InvalidArgument(
            "stage_advance needs one count per non-final stage",
        ));
    }
    if params.stage_advance.iter().any(|count| *count == 0) {
        return Err(RaffleError::InvalidArgument("advancing counts must be greater than zero"));
    }
    params.requirements.iter().try_for_each(validate_requirement)
}

fn validate_requirement(spec: &RequirementSpec) -> RaffleResult<()> {
    let spends_tokens = spec.kind != RequirementKind::Follow && spec.required_amount > 0;
    if spends_tokens && spec.token_id.is_none() {
        return Err(RaffleError::InvalidArgument(
            "token requirements with an amount must name a token",
        ));
    }
    if spec.kind == RequirementKind::Token && spec.token_id.is_none() && spec.required_amount == 0 {
        return Err(RaffleError::InvalidArgument("token requirement must name a token"));
    }
    Ok(())
}
