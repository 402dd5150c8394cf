use crate::error::{Result, SalvoError};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BOARD_SIZE: u32 = 10;
pub const CLASSIC_FLEET: [u32; 5] = [5, 4, 3, 3, 2];
pub const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub board_width: u32,
    pub board_height: u32,
    /// Ship lengths, one per commitment slot.
    pub fleet: Vec<u32>,
    pub stake: Amount,
    pub phase_timeout: Duration,
    pub reveal_policy: RevealPolicy,
    /// Require a ship to be revealed in the same move that reports it sunk.
    pub reveal_on_sink: bool,
}

/// How structural problems in a revealed fleet are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealPolicy {
    /// Reject the reveal outright.
    Strict,
    /// Accept the reveal and let the verdict penalize it.
    Tolerant,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_width: DEFAULT_BOARD_SIZE,
            board_height: DEFAULT_BOARD_SIZE,
            fleet: CLASSIC_FLEET.to_vec(),
            stake: Amount::ZERO,
            phase_timeout: DEFAULT_PHASE_TIMEOUT,
            reveal_policy: RevealPolicy::Strict,
            reveal_on_sink: false,
        }
    }
}

impl SessionConfig {
    pub fn classic(stake: Amount) -> Self {
        Self {
            stake,
            ..Self::default()
        }
    }

    pub fn with_board(mut self, width: u32, height: u32) -> Self {
        self.board_width = width;
        self.board_height = height;
        self
    }

    pub fn with_fleet(mut self, fleet: Vec<u32>) -> Self {
        self.fleet = fleet;
        self
    }

    pub fn with_policy(mut self, policy: RevealPolicy) -> Self {
        self.reveal_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    /// Total number of cells occupied by a full fleet.
    /// Total cells the fleet occupies. Summed wide so no fleet can overflow it.
    pub fn fleet_cells(&self) -> u64 {
        self.fleet.iter().map(|&length| u64::from(length)).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.board_width == 0 || self.board_height == 0 {
            return Err(SalvoError::config("Board dimensions must be positive"));
        }

        if self.fleet.is_empty() {
            return Err(SalvoError::config("Fleet cannot be empty"));
        }

        let longest_side = self.board_width.max(self.board_height);
        for (index, &length) in self.fleet.iter().enumerate() {
            if length == 0 {
                return Err(SalvoError::config(format!("Ship {} has zero length", index)));
            }
            if length > longest_side {
                return Err(SalvoError::config(format!(
                    "Ship {} (length {}) does not fit a {}x{} board",
                    index, length, self.board_width, self.board_height
                )));
            }
        }

        let area = u64::from(self.board_width) * u64::from(self.board_height);
        let occupied = self.fleet_cells();
        if occupied > area {
            return Err(SalvoError::config(format!(
                "Fleet occupies {} cells but the board only has {}",
                occupied, area
            )));
        }

        if self.phase_timeout.is_zero() {
            return Err(SalvoError::config("Phase timeout must be greater than 0"));
        }

        Ok(())
    }
}
