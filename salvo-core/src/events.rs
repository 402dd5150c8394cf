//! Session change notifications.
//!
//! Every successful operation appends the events it caused; clients drain them
//! to refresh their view. Rejected calls leave no events behind.

use crate::types::{AccountId, EndState, SessionState};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    PlayerJoined {
        participant: AccountId,
    },
    ShipAdded {
        participant: AccountId,
        ship_index: usize,
    },
    MoveMade {
        participant: AccountId,
        x: u32,
        y: u32,
    },
    ShipRevealed {
        participant: AccountId,
        ship_index: usize,
    },
    DepositMade {
        participant: AccountId,
        amount: Amount,
    },
    GameEnded {
        end_state: EndState,
    },
    Withdrawn {
        participant: AccountId,
        amount: Amount,
    },
}
