use crate::types::{AccountId, SessionState};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, SalvoError>;

#[derive(Error, Debug)]
pub enum SalvoError {
    #[error("Not a participant of this session: {0}")]
    NotParticipant(AccountId),

    #[error("Account already joined: {0}")]
    AlreadyJoined(AccountId),

    #[error("Session is full")]
    SessionFull,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Not your turn: {0}")]
    NotYourTurn(AccountId),

    #[error("Coordinate ({x}, {y}) is outside the {width}x{height} board")]
    OutOfBoard {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Ship index {index} out of range (fleet has {fleet_len} ships)")]
    ShipIndexOutOfRange { index: usize, fleet_len: usize },

    #[error("Commitment already submitted for ship {0}")]
    AlreadyCommitted(usize),

    #[error("Expected {expected} commitments, got {got}")]
    CommitmentCount { expected: usize, got: usize },

    #[error("Reveal does not match commitment for ship {0}")]
    CommitmentMismatch(usize),

    #[error("Ship {0} already revealed")]
    AlreadyRevealed(usize),

    #[error("Illegal placement for ship {index}: {reason}")]
    IllegalPlacement { index: usize, reason: String },

    #[error("Already fired at ({x}, {y})")]
    AlreadyFired { x: u32, y: u32 },

    #[error("No unresolved incoming shot to report")]
    NoPendingShot,

    #[error("Unknown is not a valid reported result")]
    UnknownResult,

    #[error("A fleet has been fully sunk; declare the game finished")]
    FleetSunk,

    #[error("Ship {0} was sunk by this report and must be revealed with it")]
    SunkShipNotRevealed(usize),

    #[error("Phase deadline not reached: {0}")]
    DeadlineNotReached(chrono::DateTime<chrono::Utc>),

    #[error("Stake mismatch: need {need} sats, got {got} sats")]
    StakeMismatch { need: u64, got: u64 },

    #[error("Stake already deposited by: {0}")]
    AlreadyDeposited(AccountId),

    #[error("Nothing to withdraw for: {0}")]
    NothingToWithdraw(AccountId),

    #[error("Unauthorized: {0}")]
    Unauthorized(AccountId),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Payout failed: {0}")]
    PayoutFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SalvoError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn payout(msg: impl Into<String>) -> Self {
        Self::PayoutFailed(msg.into())
    }

    pub(crate) fn wrong_phase(expected: &str, actual: SessionState) -> Self {
        Self::InvalidState(format!("expected {}, session is {:?}", expected, actual))
    }
}
