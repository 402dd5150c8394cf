//! Post-reveal adjudication.
//!
//! Every claim made during play is checked against the defender's own revealed
//! fleet. A defender who misreports shots against itself, or whose fleet is
//! not a legal placement, is the one penalized.

use crate::config::SessionConfig;
use crate::session::Session;
use crate::types::{AccountId, EndState, Seat, SessionState, ShipPlacement, Shot, ShotResult};
use crate::{Result, SalvoError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Index of the first revealed ship covering a cell.
fn covering_ship(fleet: &[ShipPlacement], x: u32, y: u32) -> Option<usize> {
    fleet.iter().position(|ship| ship.covers(x, y))
}

/// Ships match their slot lengths, stay on the board and never overlap.
pub fn placement_sane(config: &SessionConfig, fleet: &[ShipPlacement]) -> bool {
    if fleet.len() != config.fleet.len() {
        return false;
    }

    for (index, ship) in fleet.iter().enumerate() {
        if ship.length != config.fleet[index] {
            return false;
        }
        if !ship.fits(config.board_width, config.board_height) {
            return false;
        }
        if fleet[index + 1..].iter().any(|other| other.overlaps(ship)) {
            return false;
        }
    }

    true
}

/// Every resolved shot received matches the defender's revealed fleet.
/// A still-unanswered final shot carries no claim and is skipped.
pub fn reported_correctly(fleet: &[ShipPlacement], incoming: &[Shot]) -> bool {
    incoming.iter().all(|shot| {
        let truth = covering_ship(fleet, shot.x, shot.y);
        match (shot.result, truth) {
            (ShotResult::Unknown, _) => true,
            (ShotResult::Miss, None) => true,
            (ShotResult::Hit, Some(index)) => shot.ship_index == index,
            _ => false,
        }
    })
}

/// 1-based position of the shot that first completes hits on every cell of
/// the defender's fleet, or `None` if the attacker never got there.
pub fn shots_to_sink(config: &SessionConfig, fleet: &[ShipPlacement], shots: &[Shot]) -> Option<usize> {
    let total = usize::try_from(config.fleet_cells()).unwrap_or(usize::MAX);
    let mut hit_cells = HashSet::new();

    for (position, shot) in shots.iter().enumerate() {
        if covering_ship(fleet, shot.x, shot.y).is_some() {
            hit_cells.insert((shot.x, shot.y));
            if hit_cells.len() >= total {
                return Some(position + 1);
            }
        }
    }

    None
}

/// Verdict inputs for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Reports made by this participant about its own fleet were truthful.
    pub reported_correctly: bool,
    pub placement_sane: bool,
    /// Shots this participant needed to sink the opponent, judged against the
    /// opponent's revealed fleet.
    pub shots_to_sink: Option<usize>,
}

impl Assessment {
    pub fn honest(&self) -> bool {
        self.reported_correctly && self.placement_sane
    }
}

/// The decision table. Reporting and placement failures weigh the same.
pub fn decide(first: &Assessment, second: &Assessment) -> EndState {
    match (first.honest(), second.honest()) {
        (true, true) => match (first.shots_to_sink, second.shots_to_sink) {
            (Some(a), Some(b)) if a < b => EndState::valid_win(Seat::First),
            (Some(a), Some(b)) if a > b => EndState::valid_win(Seat::Second),
            (Some(_), None) => EndState::valid_win(Seat::First),
            (None, Some(_)) => EndState::valid_win(Seat::Second),
            _ => EndState::Draw,
        },
        (false, true) => EndState::invalid_win(Seat::Second),
        (true, false) => EndState::invalid_win(Seat::First),
        (false, false) => EndState::Draw,
    }
}

impl Session {
    /// Close play once a fleet has been reported fully sunk.
    pub fn try_declare_finished(&mut self, caller: &AccountId, now: DateTime<Utc>) -> Result<()> {
        self.seat_of(caller)?;
        if self.state != SessionState::Started {
            return Err(SalvoError::wrong_phase("Started", self.state));
        }

        if !self.fleet_sunk() {
            return Err(SalvoError::invalid_state("no fleet has been reported sunk yet"));
        }

        self.finished_at = Some(now);
        self.transition(SessionState::Finished);
        self.maybe_all_revealed();
        Ok(())
    }

    /// Resolve and end the game once both fleets are revealed.
    pub fn check_winner_when_both_revealed(
        &mut self,
        caller: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<EndState> {
        self.seat_of(caller)?;
        if self.state != SessionState::ShipsRevealed {
            return Err(SalvoError::wrong_phase("ShipsRevealed", self.state));
        }

        let end_state = self.resolve()?;
        self.end(end_state, now);
        Ok(end_state)
    }

    pub fn is_placement_sane(&self, account: &AccountId) -> Result<bool> {
        let seat = self.seat_of(account)?;
        Ok(self
            .revealed_fleet_of(seat)?
            .map_or(false, |fleet| placement_sane(&self.config, &fleet)))
    }

    pub fn is_moves_reported_correctly(&self, account: &AccountId) -> Result<bool> {
        let seat = self.seat_of(account)?;
        let incoming = self.seat_ref(seat.opponent())?.shots_fired();
        Ok(self
            .revealed_fleet_of(seat)?
            .map_or(false, |fleet| reported_correctly(&fleet, incoming)))
    }

    pub fn assess(&self, seat: Seat) -> Result<Assessment> {
        let own = self.seat_ref(seat)?;
        let opponent = self.seat_ref(seat.opponent())?;

        let Some(own_fleet) = own.revealed_fleet() else {
            return Err(SalvoError::invalid_state(format!(
                "{} has not revealed every ship",
                own.id()
            )));
        };
        let Some(opponent_fleet) = opponent.revealed_fleet() else {
            return Err(SalvoError::invalid_state(format!(
                "{} has not revealed every ship",
                opponent.id()
            )));
        };

        Ok(Assessment {
            reported_correctly: reported_correctly(&own_fleet, opponent.shots_fired()),
            placement_sane: placement_sane(&self.config, &own_fleet),
            shots_to_sink: shots_to_sink(&self.config, &opponent_fleet, own.shots_fired()),
        })
    }

    pub(crate) fn resolve(&self) -> Result<EndState> {
        let first = self.assess(Seat::First)?;
        let second = self.assess(Seat::Second)?;

        for (seat, assessment) in [(Seat::First, &first), (Seat::Second, &second)] {
            if !assessment.honest() {
                tracing::warn!(
                    "Session {}: {:?} failed verification (reported correctly: {}, placement sane: {})",
                    self.id,
                    seat,
                    assessment.reported_correctly,
                    assessment.placement_sane
                );
            }
        }

        Ok(decide(&first, &second))
    }

    fn revealed_fleet_of(&self, seat: Seat) -> Result<Option<Vec<ShipPlacement>>> {
        Ok(self.seat_ref(seat)?.revealed_fleet())
    }
}
