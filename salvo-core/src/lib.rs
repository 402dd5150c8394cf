//! Salvo core - two-player naval wager sessions
//!
//! Participants commit to hidden fleets with salted hashes, trade alternating
//! shots whose results they report about themselves, reveal at the end, and
//! have every claim checked against the revealed placements before the pooled
//! stakes are released.

pub mod arena;
pub mod clock;
pub mod commitment;
pub mod config;
pub mod error;
pub mod escrow;
pub mod events;
pub mod ledger;
pub mod participant;
pub mod session;
pub mod storage;
pub mod types;
pub mod verdict;

pub use arena::SessionArena;
pub use commitment::{generate_nonce, CommitHash, CommitmentScheme, Nonce, ShipCommitment, ShipOpening};
pub use config::{RevealPolicy, SessionConfig};
pub use error::{Result, SalvoError};
pub use escrow::{payout_split, Escrow, PayoutSink};
pub use events::SessionEvent;
pub use ledger::Report;
pub use participant::Participant;
pub use session::{Session, SessionInfo};
pub use storage::{SessionRecord, SessionStore, Storage};
pub use types::{
    AccountId, EndState, Orientation, Seat, SessionState, ShipPlacement, Shot, ShotResult,
};
pub use verdict::Assessment;

pub use ::bitcoin::Amount;
