use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::EngineContext;
use crate::events::RaffleEvent;
use crate::ledger::debit_all;
use crate::lifecycle::ensure_owner;
use crate::raffle_error::{Ineligibility, RaffleError, RaffleResult};
use crate::raffle_state::{
    CreatorId, Entry, EntryId, EntryKind, ParticipantId, Raffle, RaffleId, RaffleStatus,
    TokenId, TokenSpend, UnixTimestamp,
};
use crate::requirements::{evaluate_in, TokenCharge};
use crate::store::{Key, Sequence, Transaction};

/// Records entries, debits tokens and hands out entry numbers
pub struct EntryService {
    ctx: Arc<EngineContext>,
}

impl EntryService {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Enter `participant` into a raffle with `ticket_count` tickets.
    ///
    /// Status, window, capacity and requirements are checked, the token cost
    /// of the chosen path is debited and entry numbers are allocated in a
    /// single transaction: either all of it is persisted or none of it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn submit_entry(
        &self,
        participant: ParticipantId,
        raffle_id: RaffleId,
        ticket_count: u64,
        token_to_spend: Option<TokenId>,
    ) -> RaffleResult<Entry> {
        let ctx = &self.ctx;
        let now = ctx.now();
        let result = ctx.store.transact(|tx| {
            let mut raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            check_ticket_count(ctx, ticket_count)?;
            ensure_accepting_entries(&raffle, now)?;
            ensure_capacity(&raffle, ticket_count)?;

            let eligibility =
                evaluate_in(ctx, tx, participant, &raffle, ticket_count, token_to_spend)?;
            let path = match eligibility.path {
                Some(path) if eligibility.eligible => path,
                _ => return Err(rejection(eligibility.reason)),
            };

            let spends = spends_for(&path.charges, ticket_count)?;
            debit_all(tx, participant, &spends)?;
            record_entry(tx, &mut raffle, participant, path.kind, spends, ticket_count, now)
        });
        self.report(raffle_id, participant, result)
    }

    /// Owner-granted entry. Skips requirements and token spend but still
    /// respects status, window and capacity.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn grant_sponsored_entry(
        &self,
        owner: CreatorId,
        participant: ParticipantId,
        raffle_id: RaffleId,
        ticket_count: u64,
    ) -> RaffleResult<Entry> {
        let ctx = &self.ctx;
        let now = ctx.now();
        let result = ctx.store.transact(|tx| {
            let mut raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            ensure_owner(&raffle, owner)?;
            check_ticket_count(ctx, ticket_count)?;
            ensure_accepting_entries(&raffle, now)?;
            ensure_capacity(&raffle, ticket_count)?;
            record_entry(
                tx,
                &mut raffle,
                participant,
                EntryKind::Sponsored,
                Vec::new(),
                ticket_count,
                now,
            )
        });
        self.report(raffle_id, participant, result)
    }

    fn report(
        &self,
        raffle_id: RaffleId,
        participant: ParticipantId,
        result: RaffleResult<Entry>,
    ) -> RaffleResult<Entry> {
        match &result {
            Ok(entry) => {
                info!(
                    %raffle_id,
                    %participant,
                    entry_id = %entry.id,
                    tickets = entry.entry_count,
                    tokens_spent = entry.tokens_spent,
                    first_number = entry.entry_numbers.first().copied().unwrap_or_default(),
                    "entry recorded"
                );
                self.ctx.events.publish(RaffleEvent::EntryRecorded {
                    raffle_id,
                    entry_id: entry.id,
                    participant,
                    entry_numbers: entry.entry_numbers.clone(),
                    tokens_spent: entry.tokens_spent,
                });
            }
            Err(err) => warn!(%raffle_id, %participant, %err, "entry rejected"),
        }
        result
    }
}

fn check_ticket_count(ctx: &EngineContext, ticket_count: u64) -> RaffleResult<()> {
    if ticket_count == 0 {
        return Err(RaffleError::InvalidArgument("ticket count must be greater than zero"));
    }
    if ticket_count > ctx.config.max_tickets_per_submission {
        return Err(RaffleError::InvalidArgument(
            "ticket count exceeds the per-submission limit",
        ));
    }
    Ok(())
}

fn ensure_accepting_entries(raffle: &Raffle, now: UnixTimestamp) -> RaffleResult<()> {
    if raffle.status != RaffleStatus::Active || !raffle.in_window(now) {
        return Err(RaffleError::RaffleNotActive);
    }
    // multi-stage raffles only take entries into their first stage
    if raffle.current_stage != raffle.first_stage() || raffle.stage_closed {
        return Err(RaffleError::RaffleNotActive);
    }
    Ok(())
}

fn ensure_capacity(raffle: &Raffle, ticket_count: u64) -> RaffleResult<()> {
    let requested_total = raffle
        .current_entries
        .checked_add(ticket_count)
        .ok_or(RaffleError::Overflow)?;
    if requested_total > raffle.max_entries {
        return Err(RaffleError::CapacityExceeded {
            requested: ticket_count,
            remaining: raffle.remaining_capacity(),
        });
    }
    Ok(())
}

/// The first failing reason decides the error. A token shortfall surfaces as
/// a balance error for the whole purchase.
fn rejection(reason: Option<Ineligibility>) -> RaffleError {
    match reason {
        Some(Ineligibility::InsufficientTokens { required, available, .. }) => {
            RaffleError::InsufficientBalance {
                needed: required,
                available,
            }
        }
        Some(reason) => RaffleError::RequirementNotMet(reason),
        None => RaffleError::RequirementNotMet(Ineligibility::NotFollowing),
    }
}

fn spends_for(charges: &[TokenCharge], ticket_count: u64) -> RaffleResult<Vec<TokenSpend>> {
    charges
        .iter()
        .map(|charge| {
            let amount = charge
                .per_ticket
                .checked_mul(ticket_count)
                .ok_or(RaffleError::Overflow)?;
            Ok(TokenSpend {
                token_id: charge.token_id,
                amount,
            })
        })
        .collect()
}

fn record_entry(
    tx: &mut Transaction<'_>,
    raffle: &mut Raffle,
    participant: ParticipantId,
    kind: EntryKind,
    spends: Vec<TokenSpend>,
    ticket_count: u64,
    now: UnixTimestamp,
) -> RaffleResult<Entry> {
    let entry_id = EntryId(tx.next_id(Sequence::Entry)?);

    let first_number = raffle.next_entry_number;
    let next_number = first_number
        .checked_add(ticket_count)
        .ok_or(RaffleError::Overflow)?;
    raffle.next_entry_number = next_number;
    raffle.current_entries = raffle
        .current_entries
        .checked_add(ticket_count)
        .ok_or(RaffleError::Overflow)?;

    let tokens_spent = spends
        .iter()
        .try_fold(0u64, |total, spend| total.checked_add(spend.amount))
        .ok_or(RaffleError::Overflow)?;

    let entry = Entry {
        id: entry_id,
        raffle_id: raffle.id,
        participant,
        kind,
        tokens_spent,
        spends,
        entry_count: ticket_count,
        stage: raffle.first_stage(),
        qualified_for_next_stage: false,
        advanced_to: None,
        entry_numbers: (first_number..next_number).collect(),
        created_at: now,
    };

    tx.put(Key::Entry(entry_id), &entry)?;
    tx.push_index(Key::RaffleEntries(raffle.id), entry_id)?;
    tx.push_index(Key::ParticipantEntries(participant), entry_id)?;
    tx.put(Key::Raffle(raffle.id), &*raffle)?;
    Ok(entry)
}
