use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::raffle_state::{
    CreatorId, EntryId, ParticipantId, RaffleId, Stage, TokenId, Winner,
};

/// Tokens to hand back to a participant after a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Refund {
    pub participant: ParticipantId,
    pub entry_id: EntryId,
    pub token_id: TokenId,
    pub amount: u64,
}

/// Notifications published after a state change has been committed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaffleEvent {
    RaffleCreated {
        raffle_id: RaffleId,
        creator: CreatorId,
    },
    RafflePublished {
        raffle_id: RaffleId,
    },
    EntryRecorded {
        raffle_id: RaffleId,
        entry_id: EntryId,
        participant: ParticipantId,
        entry_numbers: Vec<u64>,
        tokens_spent: u64,
    },
    StageClosed {
        raffle_id: RaffleId,
        stage: Stage,
    },
    StageAdvanced {
        raffle_id: RaffleId,
        from: Stage,
        to: Stage,
        advancing: Vec<EntryId>,
    },
    RaffleEnded {
        raffle_id: RaffleId,
    },
    WinnersDrawn {
        raffle_id: RaffleId,
        winners: Vec<Winner>,
    },
    RaffleCancelled {
        raffle_id: RaffleId,
        refunds: Vec<Refund>,
    },
    PrizeClaimed {
        raffle_id: RaffleId,
        participant: ParticipantId,
        position: u32,
    },
}

/// Publish/subscribe channel handed to the services
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RaffleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: RaffleEvent) {
        // no subscribers is not an error
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            trace!(?event, "event dropped, no subscribers");
        }
    }
}
