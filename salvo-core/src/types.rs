use serde::{Deserialize, Serialize};
use std::fmt;

/// Account handle of a participant or of an administrative authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Session lifecycle. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    PlayersJoined,
    Started,
    Finished,
    ShipsRevealed,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndState {
    Unknown,
    Draw,
    Player1WinsValidGame,
    Player2WinsValidGame,
    Player1WinsInvalidGame,
    Player2WinsInvalidGame,
}

impl EndState {
    pub fn winner(&self) -> Option<Seat> {
        match self {
            EndState::Player1WinsValidGame | EndState::Player1WinsInvalidGame => Some(Seat::First),
            EndState::Player2WinsValidGame | EndState::Player2WinsInvalidGame => Some(Seat::Second),
            EndState::Unknown | EndState::Draw => None,
        }
    }

    pub fn is_valid_game(&self) -> bool {
        matches!(
            self,
            EndState::Player1WinsValidGame | EndState::Player2WinsValidGame
        )
    }

    pub(crate) fn valid_win(seat: Seat) -> Self {
        match seat {
            Seat::First => EndState::Player1WinsValidGame,
            Seat::Second => EndState::Player2WinsValidGame,
        }
    }

    pub(crate) fn invalid_win(seat: Seat) -> Self {
        match seat {
            Seat::First => EndState::Player1WinsInvalidGame,
            Seat::Second => EndState::Player2WinsInvalidGame,
        }
    }
}

impl fmt::Display for EndState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which of the two participant slots an account occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn opponent(self) -> Self {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotResult {
    Unknown,
    Miss,
    Hit,
}

/// One entry of a participant's `shots_fired` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shot {
    pub x: u32,
    pub y: u32,
    pub result: ShotResult,
    pub ship_index: usize,
}

impl Shot {
    pub fn unresolved(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            result: ShotResult::Unknown,
            ship_index: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.result == ShotResult::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Extends along increasing x.
    Horizontal,
    /// Extends along increasing y.
    Vertical,
}

impl Orientation {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Orientation::Horizontal => 0,
            Orientation::Vertical => 1,
        }
    }
}

/// Plaintext position of one ship, as revealed after play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub length: u32,
    pub orientation: Orientation,
    pub x: u32,
    pub y: u32,
}

impl ShipPlacement {
    pub fn new(length: u32, orientation: Orientation, x: u32, y: u32) -> Self {
        Self {
            length,
            orientation,
            x,
            y,
        }
    }

    /// Cells covered by the ship. Coordinates saturate instead of wrapping.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.length).map(move |step| match self.orientation {
            Orientation::Horizontal => (self.x.saturating_add(step), self.y),
            Orientation::Vertical => (self.x, self.y.saturating_add(step)),
        })
    }

    pub fn covers(&self, x: u32, y: u32) -> bool {
        match self.orientation {
            Orientation::Horizontal => {
                y == self.y && x >= self.x && u64::from(x) < u64::from(self.x) + u64::from(self.length)
            }
            Orientation::Vertical => {
                x == self.x && y >= self.y && u64::from(y) < u64::from(self.y) + u64::from(self.length)
            }
        }
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        if self.length == 0 {
            return false;
        }
        let (end_x, end_y) = match self.orientation {
            Orientation::Horizontal => (u64::from(self.x) + u64::from(self.length), u64::from(self.y) + 1),
            Orientation::Vertical => (u64::from(self.x) + 1, u64::from(self.y) + u64::from(self.length)),
        };
        end_x <= u64::from(width) && end_y <= u64::from(height)
    }

    pub fn overlaps(&self, other: &ShipPlacement) -> bool {
        self.cells().any(|(x, y)| other.covers(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_geometry() {
        let ship = ShipPlacement::new(3, Orientation::Horizontal, 7, 9);
        assert!(ship.fits(10, 10));
        assert!(!ship.fits(9, 10));
        assert!(ship.covers(9, 9));
        assert!(!ship.covers(10, 9));

        let vertical = ShipPlacement::new(2, Orientation::Vertical, 8, 8);
        assert!(vertical.overlaps(&ship));
        assert!(!vertical.fits(10, 9));
    }

    #[test]
    fn test_end_state_winner() {
        assert_eq!(EndState::Player2WinsInvalidGame.winner(), Some(Seat::Second));
        assert_eq!(EndState::Draw.winner(), None);
        assert!(EndState::Player1WinsValidGame.is_valid_game());
    }
}
