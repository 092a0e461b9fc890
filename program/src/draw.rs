use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::{load_entries, load_winners, EngineContext};
use crate::events::RaffleEvent;
use crate::lifecycle::{end_if_expired, transition};
use crate::raffle_error::{RaffleError, RaffleResult};
use crate::raffle_state::{
    ClaimStatus, DrawRecord, Entry, EntryId, ParticipantId, Raffle, RaffleId, RaffleStatus,
    Selection, Stage, Winner, WinnerId,
};
use crate::store::{Key, Sequence, Transaction};
use crate::vrf::{seed_fingerprint, verify_draw, weighted_draw, Candidate};

/// Result of drawing one stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Intermediate stage: entries qualified for `next_stage`
    Advanced {
        stage: Stage,
        next_stage: Stage,
        advancing: Vec<Entry>,
    },
    /// Final stage: winners in position order
    Winners(Vec<Winner>),
}

impl StageOutcome {
    pub fn winners(&self) -> &[Winner] {
        match self {
            StageOutcome::Winners(winners) => winners,
            StageOutcome::Advanced { .. } => &[],
        }
    }

    pub fn advancing(&self) -> &[Entry] {
        match self {
            StageOutcome::Advanced { advancing, .. } => advancing,
            StageOutcome::Winners(_) => &[],
        }
    }
}

/// Marks a (raffle, stage) draw as running; released on drop
struct DrawGuard<'a> {
    ctx: &'a EngineContext,
    key: (RaffleId, Stage),
}

impl<'a> DrawGuard<'a> {
    fn acquire(ctx: &'a EngineContext, raffle_id: RaffleId, stage: Stage) -> RaffleResult<Self> {
        let mut in_flight = ctx
            .draws_in_flight
            .lock()
            .map_err(|_| RaffleError::Storage("draw registry lock poisoned".to_string()))?;
        if !in_flight.insert((raffle_id, stage)) {
            return Err(RaffleError::DrawInProgress(stage));
        }
        Ok(Self {
            ctx,
            key: (raffle_id, stage),
        })
    }
}

impl Drop for DrawGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.ctx.draws_in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

/// Randomized, auditable winner selection
pub struct DrawEngine {
    ctx: Arc<EngineContext>,
}

impl DrawEngine {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Draw `stage` of a raffle.
    ///
    /// The final stage requires the raffle to be Ended and produces winners,
    /// moving the raffle to Drawn. An intermediate stage requires the stage to
    /// be closed (or the raffle Ended) and flags the advancing entries instead.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn draw_stage(&self, raffle_id: RaffleId, stage: Stage) -> RaffleResult<StageOutcome> {
        let ctx = &*self.ctx;
        let _guard = DrawGuard::acquire(ctx, raffle_id, stage)?;
        let seed = ctx.randomness.next_seed();
        let now = ctx.now();

        let result = ctx.store.transact(|tx| {
            let mut raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            end_if_expired(&mut raffle, now)?;
            ensure_drawable(&raffle, stage)?;

            let entries = load_entries(tx, &Key::RaffleEntries(raffle_id))?;
            let won: HashSet<EntryId> = load_winners(tx, raffle_id)?
                .iter()
                .map(|winner| winner.entry_id)
                .collect();
            let mut pool: Vec<&Entry> = entries
                .iter()
                .filter(|entry| entry.competes_in(stage) && !won.contains(&entry.id))
                .collect();
            if pool.is_empty() {
                return Err(RaffleError::NoEntries(stage));
            }
            pool.sort_by_key(|entry| entry.id);

            let candidates: Vec<Candidate<'_>> = pool
                .iter()
                .map(|entry| Candidate {
                    entry_id: entry.id,
                    entry_numbers: &entry.entry_numbers,
                })
                .collect();
            let total_weight = pool
                .iter()
                .try_fold(0u64, |total, entry| total.checked_add(entry.entry_count))
                .ok_or(RaffleError::Overflow)?;

            let target = draw_target(&raffle, stage)?;
            let selections = weighted_draw(seed, &candidates, target);
            debug!(
                %raffle_id,
                ?stage,
                candidates = candidates.len(),
                total_weight,
                target,
                seed = seed_fingerprint(&seed),
                "stage drawn"
            );

            tx.put(
                Key::DrawRecord(raffle_id, stage),
                &DrawRecord {
                    raffle_id,
                    stage,
                    seed,
                    candidate_count: candidates.len() as u64,
                    total_weight,
                    selections: selections.clone(),
                    drawn_at: now,
                },
            )?;

            match raffle.next_stage(stage) {
                Some(next_stage) => advance(tx, &mut raffle, &entries, &selections, stage, next_stage),
                None => award(tx, &mut raffle, &entries, &selections, stage),
            }
        });

        match &result {
            Ok(outcome) => self.announce(raffle_id, outcome),
            Err(err) => warn!(%raffle_id, ?stage, %err, "draw rejected"),
        }
        result
    }

    /// Replay the stored draw record of a stage against the stored entries
    pub fn verify(&self, raffle_id: RaffleId, stage: Stage) -> RaffleResult<bool> {
        self.ctx.store.view(|tx| {
            let record: DrawRecord = tx.load(&Key::DrawRecord(raffle_id, stage), "draw record")?;
            // winners only come out of the final draw, so every entry that
            // competes in the stage was in its pool
            let mut pool: Vec<Entry> = load_entries(tx, &Key::RaffleEntries(raffle_id))?
                .into_iter()
                .filter(|entry| entry.competes_in(stage))
                .collect();
            pool.sort_by_key(|entry| entry.id);
            let candidates: Vec<Candidate<'_>> = pool
                .iter()
                .map(|entry| Candidate {
                    entry_id: entry.id,
                    entry_numbers: &entry.entry_numbers,
                })
                .collect();
            Ok(verify_draw(&record, &candidates))
        })
    }

    /// Mark a prize as claimed by its winner
    pub fn claim_prize(&self, participant: ParticipantId, winner_id: WinnerId) -> RaffleResult<Winner> {
        let now = self.ctx.now();
        let winner = self.ctx.store.transact(|tx| {
            let mut winner: Winner = tx.load(&Key::Winner(winner_id), "winner")?;
            if winner.participant != participant {
                return Err(RaffleError::NotWinner);
            }
            if winner.claim_status == ClaimStatus::Claimed {
                return Err(RaffleError::PrizeAlreadyClaimed);
            }
            winner.claim_status = ClaimStatus::Claimed;
            winner.claimed_at = Some(now);
            tx.put(Key::Winner(winner_id), &winner)?;
            Ok(winner)
        })?;

        info!(
            raffle_id = %winner.raffle_id,
            %participant,
            position = winner.position,
            "prize claimed"
        );
        self.ctx.events.publish(RaffleEvent::PrizeClaimed {
            raffle_id: winner.raffle_id,
            participant,
            position: winner.position,
        });
        Ok(winner)
    }

    fn announce(&self, raffle_id: RaffleId, outcome: &StageOutcome) {
        match outcome {
            StageOutcome::Advanced {
                stage,
                next_stage,
                advancing,
            } => {
                info!(%raffle_id, ?stage, ?next_stage, advancing = advancing.len(), "entries advanced");
                self.ctx.events.publish(RaffleEvent::StageAdvanced {
                    raffle_id,
                    from: *stage,
                    to: *next_stage,
                    advancing: advancing.iter().map(|entry| entry.id).collect(),
                });
            }
            StageOutcome::Winners(winners) => {
                info!(%raffle_id, winners = winners.len(), "winners drawn");
                self.ctx.events.publish(RaffleEvent::WinnersDrawn {
                    raffle_id,
                    winners: winners.clone(),
                });
            }
        }
    }
}

fn ensure_drawable(raffle: &Raffle, stage: Stage) -> RaffleResult<()> {
    match raffle.status {
        RaffleStatus::Drawn => return Err(RaffleError::AlreadyDrawn),
        RaffleStatus::Cancelled => return Err(RaffleError::InvalidState("raffle was cancelled")),
        RaffleStatus::Draft => return Err(RaffleError::InvalidState("raffle is not published")),
        RaffleStatus::Active | RaffleStatus::Ended => {}
    }

    let index = raffle
        .stage_index(stage)
        .ok_or(RaffleError::InvalidArgument("stage is not part of this raffle"))?;
    let current = raffle
        .stage_index(raffle.current_stage)
        .ok_or(RaffleError::InvalidState("raffle is in an unknown stage"))?;
    if index < current {
        return Err(RaffleError::AlreadyDrawn);
    }
    if index > current {
        return Err(RaffleError::InvalidState("an earlier stage has not been drawn"));
    }

    if stage == raffle.final_stage() {
        if raffle.status != RaffleStatus::Ended {
            return Err(RaffleError::InvalidState("raffle has not ended"));
        }
    } else if raffle.status == RaffleStatus::Active && !raffle.stage_closed {
        return Err(RaffleError::InvalidState("stage is still open"));
    }
    Ok(())
}

fn draw_target(raffle: &Raffle, stage: Stage) -> RaffleResult<usize> {
    if stage == raffle.final_stage() {
        return Ok(raffle.prize_count as usize);
    }
    raffle
        .stage_index(stage)
        .and_then(|index| raffle.stage_advance.get(index))
        .map(|count| *count as usize)
        .ok_or(RaffleError::InvalidState("no advancing count for stage"))
}

fn advance(
    tx: &mut Transaction<'_>,
    raffle: &mut Raffle,
    entries: &[Entry],
    selections: &[Selection],
    stage: Stage,
    next_stage: Stage,
) -> RaffleResult<StageOutcome> {
    let mut advancing = Vec::with_capacity(selections.len());
    for selection in selections {
        let mut entry = entries
            .iter()
            .find(|entry| entry.id == selection.entry_id)
            .cloned()
            .ok_or(RaffleError::NotFound("entry"))?;
        entry.qualified_for_next_stage = true;
        entry.advanced_to = Some(next_stage);
        tx.put(Key::Entry(entry.id), &entry)?;
        advancing.push(entry);
    }

    raffle.current_stage = next_stage;
    raffle.stage_closed = false;
    tx.put(Key::Raffle(raffle.id), &*raffle)?;
    Ok(StageOutcome::Advanced {
        stage,
        next_stage,
        advancing,
    })
}

fn award(
    tx: &mut Transaction<'_>,
    raffle: &mut Raffle,
    entries: &[Entry],
    selections: &[Selection],
    stage: Stage,
) -> RaffleResult<StageOutcome> {
    let mut winners = Vec::with_capacity(selections.len());
    for (position, selection) in (1u32..).zip(selections) {
        let participant = entries
            .iter()
            .find(|entry| entry.id == selection.entry_id)
            .map(|entry| entry.participant)
            .ok_or(RaffleError::NotFound("entry"))?;
        let winner = Winner {
            id: WinnerId(tx.next_id(Sequence::Winner)?),
            raffle_id: raffle.id,
            entry_id: selection.entry_id,
            participant,
            position,
            stage,
            winning_number: selection.winning_number,
            claim_status: ClaimStatus::Unclaimed,
            claimed_at: None,
        };
        tx.put(Key::Winner(winner.id), &winner)?;
        tx.push_index(Key::RaffleWinners(raffle.id), winner.id)?;
        winners.push(winner);
    }

    transition(raffle, RaffleStatus::Drawn)?;
    tx.put(Key::Raffle(raffle.id), &*raffle)?;
    Ok(StageOutcome::Winners(winners))
}
