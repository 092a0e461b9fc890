use std::sync::Arc;
use tracing::{debug, info};

use crate::engine::EngineContext;
use crate::raffle_error::{RaffleError, RaffleResult};
use crate::raffle_state::{ParticipantId, TokenBalance, TokenId, TokenSpend};
use crate::store::{Key, Transaction};

/// Spendable token balances, one record per (participant, token)
pub struct TokenLedger {
    ctx: Arc<EngineContext>,
}

impl TokenLedger {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn balance(&self, participant: ParticipantId, token_id: TokenId) -> RaffleResult<u64> {
        self.ctx.store.view(|tx| balance_of(tx, participant, token_id))
    }

    /// Add tokens to a participant's balance (issuance, refunds)
    pub fn credit(
        &self,
        participant: ParticipantId,
        token_id: TokenId,
        amount: u64,
    ) -> RaffleResult<u64> {
        let balance = self.ctx.store.transact(|tx| {
            let current = balance_of(tx, participant, token_id)?;
            let updated = current.checked_add(amount).ok_or(RaffleError::Overflow)?;
            write_balance(tx, participant, token_id, updated)?;
            Ok(updated)
        })?;
        info!(%participant, %token_id, amount, balance, "credited tokens");
        Ok(balance)
    }

    pub fn debit(
        &self,
        participant: ParticipantId,
        token_id: TokenId,
        amount: u64,
    ) -> RaffleResult<u64> {
        self.ctx.store.transact(|tx| {
            debit_all(tx, participant, &[TokenSpend { token_id, amount }])?;
            balance_of(tx, participant, token_id)
        })
    }
}

pub(crate) fn balance_of(
    tx: &Transaction<'_>,
    participant: ParticipantId,
    token_id: TokenId,
) -> RaffleResult<u64> {
    let record: Option<TokenBalance> = tx.get(&Key::Balance(participant, token_id))?;
    Ok(record.map(|b| b.amount).unwrap_or(0))
}

fn write_balance(
    tx: &mut Transaction<'_>,
    participant: ParticipantId,
    token_id: TokenId,
    amount: u64,
) -> RaffleResult<()> {
    tx.put(
        Key::Balance(participant, token_id),
        &TokenBalance {
            participant,
            token_id,
            amount,
        },
    )
}

/// Debit every spend or none. All balances are checked before any is written.
pub(crate) fn debit_all(
    tx: &mut Transaction<'_>,
    participant: ParticipantId,
    spends: &[TokenSpend],
) -> RaffleResult<()> {
    let mut updated = Vec::with_capacity(spends.len());
    for spend in spends {
        // the same token may appear on several requirements of one path
        let already: u64 = updated
            .iter()
            .filter(|(token, _)| *token == spend.token_id)
            .map(|(_, debited)| *debited)
            .sum();
        let needed = already.checked_add(spend.amount).ok_or(RaffleError::Overflow)?;
        let available = balance_of(tx, participant, spend.token_id)?;
        if available < needed {
            debug!(%participant, token_id = %spend.token_id, needed, available, "debit rejected");
            return Err(RaffleError::InsufficientBalance { needed, available });
        }
        updated.push((spend.token_id, spend.amount));
    }

    for spend in spends {
        let available = balance_of(tx, participant, spend.token_id)?;
        let remaining = available
            .checked_sub(spend.amount)
            .ok_or(RaffleError::Overflow)?;
        write_balance(tx, participant, spend.token_id, remaining)?;
    }
    Ok(())
}
