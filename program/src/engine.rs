use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::draw::DrawEngine;
use crate::entry::EntryService;
use crate::events::{EventBus, RaffleEvent};
use crate::ledger::TokenLedger;
use crate::lifecycle::RaffleLifecycle;
use crate::raffle_error::RaffleResult;
use crate::raffle_state::{
    DrawRecord, Entry, EntryId, ParticipantId, Raffle, RaffleId, RequirementId, Stage,
    TokenRequirement, UnixTimestamp, Winner, WinnerId,
};
use crate::requirements::{load_requirements, FollowGraph, InMemoryFollows, RequirementEvaluator};
use crate::store::{Key, KeyValue, Store, Transaction};
use crate::vrf::{OsEntropy, RandomSource};

/// Collaborators and shared state every service works against
pub struct EngineContext {
    pub(crate) store: Store,
    pub(crate) follows: Arc<dyn FollowGraph>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) randomness: Arc<dyn RandomSource>,
    pub(crate) events: EventBus,
    pub(crate) config: EngineConfig,
    pub(crate) draws_in_flight: Mutex<HashSet<(RaffleId, Stage)>>,
}

impl EngineContext {
    pub(crate) fn now(&self) -> UnixTimestamp {
        self.clock.now()
    }
}

pub struct RaffleEngineBuilder {
    store: Option<Store>,
    follows: Arc<dyn FollowGraph>,
    clock: Arc<dyn Clock>,
    randomness: Arc<dyn RandomSource>,
    config: EngineConfig,
}

impl Default for RaffleEngineBuilder {
    fn default() -> Self {
        Self {
            store: None,
            follows: Arc::new(InMemoryFollows::default()),
            clock: Arc::new(SystemClock),
            randomness: Arc::new(OsEntropy),
            config: EngineConfig::default(),
        }
    }
}

impl RaffleEngineBuilder {
    pub fn backend(mut self, backend: impl KeyValue + 'static) -> Self {
        self.store = Some(Store::new(backend));
        self
    }

    pub fn follows(mut self, follows: Arc<dyn FollowGraph>) -> Self {
        self.follows = follows;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn randomness(mut self, randomness: Arc<dyn RandomSource>) -> Self {
        self.randomness = randomness;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> RaffleResult<RaffleEngine> {
        self.config.validate()?;
        let ctx = Arc::new(EngineContext {
            store: self.store.unwrap_or_else(Store::in_memory),
            follows: self.follows,
            clock: self.clock,
            randomness: self.randomness,
            events: EventBus::new(self.config.event_capacity),
            config: self.config,
            draws_in_flight: Mutex::new(HashSet::new()),
        });
        Ok(RaffleEngine {
            ledger: TokenLedger::new(ctx.clone()),
            evaluator: RequirementEvaluator::new(ctx.clone()),
            entries: EntryService::new(ctx.clone()),
            draws: DrawEngine::new(ctx.clone()),
            lifecycle: RaffleLifecycle::new(ctx.clone()),
            ctx,
        })
    }
}

/// Raffle engine: the five services over one store, plus read accessors
pub struct RaffleEngine {
    ctx: Arc<EngineContext>,
    ledger: TokenLedger,
    evaluator: RequirementEvaluator,
    entries: EntryService,
    draws: DrawEngine,
    lifecycle: RaffleLifecycle,
}

impl RaffleEngine {
    pub fn builder() -> RaffleEngineBuilder {
        RaffleEngineBuilder::default()
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn evaluator(&self) -> &RequirementEvaluator {
        &self.evaluator
    }

    pub fn entries(&self) -> &EntryService {
        &self.entries
    }

    pub fn draws(&self) -> &DrawEngine {
        &self.draws
    }

    pub fn lifecycle(&self) -> &RaffleLifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.ctx.events.subscribe()
    }

    pub fn raffle(&self, raffle_id: RaffleId) -> RaffleResult<Raffle> {
        self.ctx
            .store
            .view(|tx| tx.load(&Key::Raffle(raffle_id), "raffle"))
    }

    pub fn requirements(&self, raffle_id: RaffleId) -> RaffleResult<Vec<TokenRequirement>> {
        self.ctx.store.view(|tx| {
            tx.load::<Raffle>(&Key::Raffle(raffle_id), "raffle")?;
            load_requirements(tx, raffle_id)
        })
    }

    pub fn requirement(&self, requirement_id: RequirementId) -> RaffleResult<TokenRequirement> {
        self.ctx
            .store
            .view(|tx| tx.load(&Key::Requirement(requirement_id), "requirement"))
    }

    pub fn entry(&self, entry_id: EntryId) -> RaffleResult<Entry> {
        self.ctx
            .store
            .view(|tx| tx.load(&Key::Entry(entry_id), "entry"))
    }

    /// Entries of a raffle in submission order
    pub fn raffle_entries(&self, raffle_id: RaffleId) -> RaffleResult<Vec<Entry>> {
        self.ctx.store.view(|tx| {
            tx.load::<Raffle>(&Key::Raffle(raffle_id), "raffle")?;
            load_entries(tx, &Key::RaffleEntries(raffle_id))
        })
    }

    pub fn participant_entries(&self, participant: ParticipantId) -> RaffleResult<Vec<Entry>> {
        self.ctx
            .store
            .view(|tx| load_entries(tx, &Key::ParticipantEntries(participant)))
    }

    /// Winners of a raffle by position
    pub fn winners(&self, raffle_id: RaffleId) -> RaffleResult<Vec<Winner>> {
        self.ctx.store.view(|tx| {
            tx.load::<Raffle>(&Key::Raffle(raffle_id), "raffle")?;
            load_winners(tx, raffle_id)
        })
    }

    pub fn winner(&self, winner_id: WinnerId) -> RaffleResult<Winner> {
        self.ctx
            .store
            .view(|tx| tx.load(&Key::Winner(winner_id), "winner"))
    }

    pub fn draw_record(&self, raffle_id: RaffleId, stage: Stage) -> RaffleResult<DrawRecord> {
        self.ctx
            .store
            .view(|tx| tx.load(&Key::DrawRecord(raffle_id, stage), "draw record"))
    }
}

pub(crate) fn load_entries(tx: &Transaction<'_>, index: &Key) -> RaffleResult<Vec<Entry>> {
    let ids: Vec<EntryId> = tx.index(index)?;
    ids.iter()
        .map(|id| tx.load(&Key::Entry(*id), "entry"))
        .collect()
}

pub(crate) fn load_winners(tx: &Transaction<'_>, raffle_id: RaffleId) -> RaffleResult<Vec<Winner>> {
    let ids: Vec<WinnerId> = tx.index(&Key::RaffleWinners(raffle_id))?;
    ids.iter()
        .map(|id| tx.load(&Key::Winner(*id), "winner"))
        .collect()
}
