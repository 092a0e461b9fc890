use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::engine::EngineContext;
use crate::ledger::balance_of;
use crate::raffle_error::{Ineligibility, RaffleResult};
use crate::raffle_state::{
    CreatorId, EntryKind, ParticipantId, Raffle, RaffleId, RequirementId, RequirementKind,
    TokenId, TokenRequirement,
};
use crate::store::{Key, Transaction};

/// Identity collaborator answering follow-relationship lookups
pub trait FollowGraph: Send + Sync {
    fn is_following(&self, participant: ParticipantId, creator: CreatorId) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryFollows {
    edges: RwLock<HashSet<(ParticipantId, CreatorId)>>,
}

impl InMemoryFollows {
    pub fn follow(&self, participant: ParticipantId, creator: CreatorId) {
        self.edges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((participant, creator));
    }

    pub fn unfollow(&self, participant: ParticipantId, creator: CreatorId) {
        self.edges
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(participant, creator));
    }
}

impl FollowGraph for InMemoryFollows {
    fn is_following(&self, participant: ParticipantId, creator: CreatorId) -> bool {
        self.edges
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(participant, creator))
    }
}

/// Tokens a path costs for every ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCharge {
    pub token_id: TokenId,
    pub per_ticket: u64,
}

/// Requirements a participant satisfied, and what they cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPath {
    pub kind: EntryKind,
    pub requirements: Vec<RequirementId>,
    pub charges: Vec<TokenCharge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    /// First failing reason when not eligible
    pub reason: Option<Ineligibility>,
    /// Chosen path when eligible
    pub path: Option<EntryPath>,
}

impl Eligibility {
    fn eligible(path: EntryPath) -> Self {
        Self {
            eligible: true,
            reason: None,
            path: Some(path),
        }
    }

    fn ineligible(reason: Ineligibility) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
            path: None,
        }
    }
}

/// Inputs for a single evaluation, resolved up front so the combinator is pure
#[derive(Debug, Default)]
pub(crate) struct Holdings {
    pub following: bool,
    pub balances: Vec<(TokenId, u64)>,
}

impl Holdings {
    fn balance(&self, token_id: TokenId) -> u64 {
        self.balances
            .iter()
            .find(|(t, _)| *t == token_id)
            .map(|(_, amount)| *amount)
            .unwrap_or(0)
    }
}

pub struct RequirementEvaluator {
    ctx: Arc<EngineContext>,
}

impl RequirementEvaluator {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Decide whether `participant` may enter `raffle_id` with a single
    /// ticket. Never mutates state.
    pub fn evaluate(
        &self,
        participant: ParticipantId,
        raffle_id: RaffleId,
    ) -> RaffleResult<Eligibility> {
        self.evaluate_with(participant, raffle_id, 1, None)
    }

    /// Same as `evaluate` for `ticket_count` tickets, preferring a path that
    /// spends `preferred_token`
    pub fn evaluate_with(
        &self,
        participant: ParticipantId,
        raffle_id: RaffleId,
        ticket_count: u64,
        preferred_token: Option<TokenId>,
    ) -> RaffleResult<Eligibility> {
        self.ctx.store.view(|tx| {
            let raffle: Raffle = tx.load(&Key::Raffle(raffle_id), "raffle")?;
            evaluate_in(&self.ctx, tx, participant, &raffle, ticket_count, preferred_token)
        })
    }
}

pub(crate) fn load_requirements(
    tx: &Transaction<'_>,
    raffle_id: RaffleId,
) -> RaffleResult<Vec<TokenRequirement>> {
    let ids: Vec<RequirementId> = tx.index(&Key::RaffleRequirements(raffle_id))?;
    ids.iter()
        .map(|id| tx.load(&Key::Requirement(*id), "requirement"))
        .collect()
}

pub(crate) fn evaluate_in(
    ctx: &EngineContext,
    tx: &Transaction<'_>,
    participant: ParticipantId,
    raffle: &Raffle,
    ticket_count: u64,
    preferred_token: Option<TokenId>,
) -> RaffleResult<Eligibility> {
    let requirements = load_requirements(tx, raffle.id)?;
    if requirements.is_empty() {
        return Ok(combine(&requirements, &Holdings::default(), ticket_count, preferred_token));
    }

    let mut holdings = Holdings {
        following: ctx.follows.is_following(participant, raffle.creator),
        balances: Vec::new(),
    };
    for token_id in requirements.iter().filter_map(|r| r.token_id) {
        if !holdings.balances.iter().any(|(t, _)| *t == token_id) {
            let amount = balance_of(tx, participant, token_id)?;
            holdings.balances.push((token_id, amount));
        }
    }

    let eligibility = combine(&requirements, &holdings, ticket_count, preferred_token);
    debug!(
        %participant,
        raffle_id = %raffle.id,
        ticket_count,
        eligible = eligibility.eligible,
        reason = ?eligibility.reason,
        "evaluated entry requirements"
    );
    Ok(eligibility)
}

/// Non-optional requirements form one AND path; each optional requirement is
/// an alternative path on its own. Token checks cover all `ticket_count`
/// tickets.
///
/// Among passing paths the one spending `preferred_token` wins, then one that
/// spends nothing, then the first.
pub(crate) fn combine(
    requirements: &[TokenRequirement],
    holdings: &Holdings,
    ticket_count: u64,
    preferred_token: Option<TokenId>,
) -> Eligibility {
    if requirements.is_empty() {
        return Eligibility::eligible(EntryPath {
            kind: EntryKind::Free,
            requirements: Vec::new(),
            charges: Vec::new(),
        });
    }

    let mandatory: Vec<&TokenRequirement> = requirements.iter().filter(|r| !r.optional).collect();
    let mut paths: Vec<Vec<&TokenRequirement>> = Vec::new();
    if !mandatory.is_empty() {
        paths.push(mandatory);
    }
    paths.extend(requirements.iter().filter(|r| r.optional).map(|r| vec![r]));

    let mut passing = Vec::new();
    let mut first_failure = None;
    for path in &paths {
        match satisfy_path(path, holdings, ticket_count, preferred_token) {
            Ok(entry_path) => passing.push(entry_path),
            Err(reason) => {
                if first_failure.is_none() {
                    first_failure = Some(reason);
                }
            }
        }
    }

    let spends_preferred = preferred_token.and_then(|token_id| {
        passing
            .iter()
            .position(|p| p.charges.iter().any(|c| c.token_id == token_id))
    });
    let spends_nothing = || passing.iter().position(|p| p.charges.is_empty());
    let first = if passing.is_empty() { None } else { Some(0) };
    match spends_preferred.or_else(spends_nothing).or(first) {
        Some(index) => Eligibility::eligible(passing.swap_remove(index)),
        None => Eligibility::ineligible(first_failure.unwrap_or(Ineligibility::NotFollowing)),
    }
}

fn satisfy_path(
    path: &[&TokenRequirement],
    holdings: &Holdings,
    ticket_count: u64,
    preferred_token: Option<TokenId>,
) -> Result<EntryPath, Ineligibility> {
    let mut charges: Vec<TokenCharge> = Vec::new();
    for requirement in path {
        if let Some(charge) = satisfy(requirement, holdings, ticket_count, preferred_token)? {
            charges.push(charge);
        }
    }

    // several requirements of one path may draw on the same token
    for charge in &charges {
        let per_ticket: u64 = charges
            .iter()
            .filter(|c| c.token_id == charge.token_id)
            .fold(0u64, |total, c| total.saturating_add(c.per_ticket));
        let required = per_ticket.saturating_mul(ticket_count);
        let available = holdings.balance(charge.token_id);
        if available < required {
            return Err(Ineligibility::InsufficientTokens {
                token_id: charge.token_id,
                required,
                available,
            });
        }
    }

    let kind = if !charges.is_empty() {
        EntryKind::Token
    } else if path.iter().any(|r| r.kind != RequirementKind::Token) {
        EntryKind::Follow
    } else {
        EntryKind::Free
    };
    Ok(EntryPath {
        kind,
        requirements: path.iter().map(|r| r.id).collect(),
        charges,
    })
}

/// Check one requirement for `ticket_count` tickets. Returns the token charge
/// when tokens back it.
fn satisfy(
    requirement: &TokenRequirement,
    holdings: &Holdings,
    ticket_count: u64,
    preferred_token: Option<TokenId>,
) -> Result<Option<TokenCharge>, Ineligibility> {
    let token_check = || -> Result<Option<TokenCharge>, Ineligibility> {
        if requirement.required_amount == 0 {
            return Ok(None);
        }
        let token_id = requirement.token_id.ok_or(Ineligibility::MissingToken)?;
        let required = requirement.required_amount.saturating_mul(ticket_count);
        let available = holdings.balance(token_id);
        if available < required {
            return Err(Ineligibility::InsufficientTokens {
                token_id,
                required,
                available,
            });
        }
        Ok(Some(TokenCharge {
            token_id,
            per_ticket: requirement.required_amount,
        }))
    };
    let follow_check = || {
        if holdings.following {
            Ok(None)
        } else {
            Err(Ineligibility::NotFollowing)
        }
    };

    match requirement.kind {
        RequirementKind::Token => token_check(),
        RequirementKind::Follow => follow_check(),
        RequirementKind::Both => {
            follow_check()?;
            token_check()
        }
        RequirementKind::Either => {
            let wants_token = preferred_token.is_some() && preferred_token == requirement.token_id;
            if wants_token {
                if let Ok(charge) = token_check() {
                    return Ok(charge);
                }
            }
            match follow_check() {
                Ok(none) => Ok(none),
                // a token shortfall is the more useful reason to report
                Err(_) => token_check(),
            }
        }
    }
}
