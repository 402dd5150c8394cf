//! Move ledger: alternating shots and self-reported results.
//!
//! Turn order is never stored. Participant1 fires first and afterwards leads by
//! exactly one shot while play is live, so the holder follows from the two
//! list lengths alone.

use crate::commitment::ShipOpening;
use crate::events::SessionEvent;
use crate::session::Session;
use crate::types::{AccountId, Seat, SessionState, Shot, ShotResult};
use crate::{Result, SalvoError};
use chrono::{DateTime, Utc};

/// A result asserted by the defender for the shot it last received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub result: ShotResult,
    pub ship_index: usize,
}

impl Report {
    pub fn miss() -> Self {
        Self {
            result: ShotResult::Miss,
            ship_index: 0,
        }
    }

    pub fn hit(ship_index: usize) -> Self {
        Self {
            result: ShotResult::Hit,
            ship_index,
        }
    }
}

impl Session {
    /// Whoever owes the next move, while the game is being played.
    pub fn current_turn_holder(&self) -> Option<&AccountId> {
        self.turn_seat().and_then(|seat| self.account_at(seat))
    }

    pub(crate) fn turn_seat(&self) -> Option<Seat> {
        if self.state != SessionState::Started || self.participants.len() != 2 {
            return None;
        }

        let first = self.participants[0].shot_count();
        let second = self.participants[1].shot_count();
        if first == second {
            Some(Seat::First)
        } else {
            Some(Seat::Second)
        }
    }

    /// True once either side has reported every cell of its own fleet hit.
    pub fn fleet_sunk(&self) -> bool {
        let cells = self.config.fleet_cells();
        self.participants
            .iter()
            .any(|p| u64::from(p.hits_confirmed()) >= cells)
    }

    /// Opening shot of the game. Only participant1, only once.
    pub fn fire_shot(
        &mut self,
        caller: &AccountId,
        x: u32,
        y: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seat = self.ensure_can_move(caller)?;
        if self.participants.iter().any(|p| p.shot_count() > 0) {
            return Err(SalvoError::invalid_state(
                "opening shot already fired; report the pending shot with your move",
            ));
        }
        self.ensure_fresh_target(seat, x, y)?;

        self.record_move(seat, x, y, now)?;
        Ok(())
    }

    /// Report the result of the shot the caller last received, then fire.
    pub fn fire_shot_and_report_prior_result(
        &mut self,
        caller: &AccountId,
        x: u32,
        y: u32,
        prior: Report,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seat = self.ensure_can_move(caller)?;
        let sunk = self.check_report(seat, x, y, prior)?;

        if let Some(ship_index) = sunk.filter(|_| self.config.reveal_on_sink) {
            return Err(SalvoError::SunkShipNotRevealed(ship_index));
        }

        self.apply_report(seat, prior)?;
        self.record_move(seat, x, y, now)?;
        Ok(())
    }

    /// As [`Session::fire_shot_and_report_prior_result`], additionally opening
    /// one of the caller's own ships in the same call.
    #[allow(clippy::too_many_arguments)]
    pub fn fire_shot_and_report_prior_result_and_reveal_ship(
        &mut self,
        caller: &AccountId,
        x: u32,
        y: u32,
        prior: Report,
        reveal_index: usize,
        opening: &ShipOpening,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seat = self.ensure_can_move(caller)?;
        let sunk = self.check_report(seat, x, y, prior)?;

        if let Some(ship_index) = sunk.filter(|_| self.config.reveal_on_sink) {
            if ship_index != reveal_index {
                return Err(SalvoError::SunkShipNotRevealed(ship_index));
            }
        }

        let mut next = self.clone();
        next.apply_report(seat, prior)?;
        next.reveal_for(seat, reveal_index, opening)?;
        next.record_move(seat, x, y, now)?;

        *self = next;
        Ok(())
    }

    /// Administrative bulk replay. Each element is one move in play order,
    /// made by whoever holds the turn at that point; `results[i]` and
    /// `ship_indices[i]` are the report carried by move `i` and are ignored for
    /// the opening shot. The outcome matches issuing the single calls one by one.
    pub fn batch_report_moves(
        &mut self,
        caller: &AccountId,
        xs: &[u32],
        ys: &[u32],
        results: &[ShotResult],
        ship_indices: &[usize],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if caller != &self.authority {
            return Err(SalvoError::Unauthorized(caller.clone()));
        }

        let len = xs.len();
        if ys.len() != len || results.len() != len || ship_indices.len() != len {
            return Err(SalvoError::invalid_state(
                "batch columns must all have the same length",
            ));
        }

        let mut next = self.clone();
        for i in 0..len {
            let seat = next
                .turn_seat()
                .ok_or_else(|| SalvoError::wrong_phase("Started", next.state))?;
            let mover = next.seat_ref(seat)?.id().clone();

            if next.participants.iter().all(|p| p.shot_count() == 0) {
                next.fire_shot(&mover, xs[i], ys[i], now)?;
            } else {
                let prior = Report {
                    result: results[i],
                    ship_index: ship_indices[i],
                };
                let seat = next.ensure_can_move(&mover)?;
                next.check_report(seat, xs[i], ys[i], prior)?;
                next.apply_report(seat, prior)?;
                next.record_move(seat, xs[i], ys[i], now)?;
            }
        }

        tracing::info!("Session {} replayed {} moves in batch", self.id, len);
        *self = next;
        Ok(())
    }

    fn ensure_can_move(&self, caller: &AccountId) -> Result<Seat> {
        if self.state != SessionState::Started {
            return Err(SalvoError::wrong_phase("Started", self.state));
        }

        let seat = self.seat_of(caller)?;

        if self.fleet_sunk() {
            return Err(SalvoError::FleetSunk);
        }

        if self.turn_seat() != Some(seat) {
            return Err(SalvoError::NotYourTurn(caller.clone()));
        }

        Ok(seat)
    }

    fn ensure_on_board(&self, x: u32, y: u32) -> Result<()> {
        if x >= self.config.board_width || y >= self.config.board_height {
            return Err(SalvoError::OutOfBoard {
                x,
                y,
                width: self.config.board_width,
                height: self.config.board_height,
            });
        }
        Ok(())
    }

    /// On the board and not a cell this seat has already fired at, so every
    /// confirmed hit stands for a distinct cell.
    fn ensure_fresh_target(&self, seat: Seat, x: u32, y: u32) -> Result<()> {
        self.ensure_on_board(x, y)?;
        if self
            .seat_ref(seat)?
            .shots_fired()
            .iter()
            .any(|shot| shot.x == x && shot.y == y)
        {
            return Err(SalvoError::AlreadyFired { x, y });
        }
        Ok(())
    }

    /// Validate a report-and-fire move. Returns the ship index this report
    /// claims to sink, if any.
    fn check_report(&self, seat: Seat, x: u32, y: u32, prior: Report) -> Result<Option<usize>> {
        if self.seat_ref(seat.opponent())?.pending_shot().is_none() {
            return Err(SalvoError::NoPendingShot);
        }

        self.ensure_fresh_target(seat, x, y)?;

        let fleet_len = self.config.fleet.len();
        if prior.ship_index >= fleet_len {
            return Err(SalvoError::ShipIndexOutOfRange {
                index: prior.ship_index,
                fleet_len,
            });
        }

        match prior.result {
            ShotResult::Unknown => Err(SalvoError::UnknownResult),
            ShotResult::Miss => Ok(None),
            ShotResult::Hit => {
                let tally = self.seat_ref(seat)?.per_ship_hits()[prior.ship_index];
                let length = self.config.fleet[prior.ship_index];
                Ok((tally + 1 == length).then_some(prior.ship_index))
            }
        }
    }

    fn apply_report(&mut self, seat: Seat, prior: Report) -> Result<()> {
        let shot = self
            .seat_mut(seat.opponent())?
            .pending_shot_mut()
            .ok_or(SalvoError::NoPendingShot)?;
        shot.result = prior.result;
        shot.ship_index = prior.ship_index;

        if prior.result == ShotResult::Hit {
            self.seat_mut(seat)?.record_hit_against(prior.ship_index);
        }
        Ok(())
    }

    fn record_move(&mut self, seat: Seat, x: u32, y: u32, now: DateTime<Utc>) -> Result<()> {
        let participant = self.seat_mut(seat)?;
        participant.push_shot(Shot::unresolved(x, y));
        let id = participant.id().clone();

        self.last_move_at = Some(now);
        tracing::debug!("Session {}: {} fired at ({}, {})", self.id, id, x, y);
        self.events.push(SessionEvent::MoveMade {
            participant: id,
            x,
            y,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::ShipOpening;
    use crate::config::SessionConfig;
    use crate::types::{Orientation, ShipPlacement};
    use bitcoin::Amount;

    fn started() -> (Session, AccountId, AccountId) {
        let now = Utc::now();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let mut s = Session::new(
            SessionConfig::classic(Amount::from_sat(500)),
            AccountId::new("registry"),
            now,
        )
        .unwrap();
        s.join(&alice).unwrap();
        s.join(&bob).unwrap();
        let hashes: Vec<_> = [5u32, 4, 3, 3, 2]
            .iter()
            .enumerate()
            .map(|(row, &len)| {
                ShipOpening::new(
                    ShipPlacement::new(len, Orientation::Horizontal, 0, row as u32),
                    [3u8; 32],
                )
                .commitment()
            })
            .collect();
        s.submit_all_ship_commitments(&alice, &hashes, now).unwrap();
        s.submit_all_ship_commitments(&bob, &hashes, now).unwrap();
        (s, alice, bob)
    }

    #[test]
    fn test_no_shots_before_start() {
        let mut s = Session::new(
            SessionConfig::default(),
            AccountId::new("registry"),
            Utc::now(),
        )
        .unwrap();
        let alice = AccountId::new("alice");
        s.join(&alice).unwrap();
        assert!(matches!(
            s.fire_shot(&alice, 0, 0, Utc::now()),
            Err(SalvoError::InvalidState(_))
        ));
    }

    #[test]
    fn test_opening_shot_rules() {
        let (mut s, alice, bob) = started();
        let now = Utc::now();

        assert!(matches!(
            s.fire_shot(&AccountId::new("carol"), 0, 0, now),
            Err(SalvoError::NotParticipant(_))
        ));
        assert!(matches!(
            s.fire_shot(&bob, 0, 0, now),
            Err(SalvoError::NotYourTurn(_))
        ));
        assert!(matches!(
            s.fire_shot(&alice, 10, 0, now),
            Err(SalvoError::OutOfBoard { .. })
        ));

        s.fire_shot(&alice, 0, 0, now).unwrap();
        assert_eq!(s.participant(&alice).unwrap().shot_count(), 1);
        assert_eq!(s.current_turn_holder(), Some(&bob));

        // bob must answer the pending shot rather than open
        assert!(s.fire_shot(&bob, 0, 0, now).is_err());
        assert!(matches!(
            s.fire_shot(&alice, 0, 1, now),
            Err(SalvoError::NotYourTurn(_))
        ));
    }

    #[test]
    fn test_strict_alternation() {
        let (mut s, alice, bob) = started();
        let now = Utc::now();

        s.fire_shot(&alice, 0, 0, now).unwrap();
        s.fire_shot_and_report_prior_result(&bob, 0, 0, Report::miss(), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&bob, 0, 1, Report::miss(), now),
            Err(SalvoError::NotYourTurn(_))
        ));

        s.fire_shot_and_report_prior_result(&alice, 0, 1, Report::miss(), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&alice, 0, 2, Report::miss(), now),
            Err(SalvoError::NotYourTurn(_))
        ));

        let alice_shots = s.participant(&alice).unwrap().shots_fired();
        assert_eq!(alice_shots[0].result, ShotResult::Miss);
        assert!(alice_shots[1].is_pending());
        assert_eq!(s.last_move_at(), Some(now));
    }

    #[test]
    fn test_report_validation() {
        let (mut s, alice, bob) = started();
        let now = Utc::now();
        s.fire_shot(&alice, 0, 0, now).unwrap();

        assert!(matches!(
            s.fire_shot_and_report_prior_result(
                &bob,
                0,
                0,
                Report {
                    result: ShotResult::Unknown,
                    ship_index: 0
                },
                now
            ),
            Err(SalvoError::UnknownResult)
        ));
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&bob, 0, 0, Report::hit(5), now),
            Err(SalvoError::ShipIndexOutOfRange { .. })
        ));
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&bob, 0, 10, Report::hit(0), now),
            Err(SalvoError::OutOfBoard { .. })
        ));
        assert!(s.drain_events().iter().all(|e| !matches!(
            e,
            SessionEvent::MoveMade { participant, .. } if participant == &bob
        )));

        s.fire_shot_and_report_prior_result(&bob, 0, 0, Report::hit(0), now)
            .unwrap();
        let bob_p = s.participant(&bob).unwrap();
        assert_eq!(bob_p.hits_confirmed(), 1);
        assert_eq!(bob_p.per_ship_hits()[0], 1);
    }

    #[test]
    fn test_repeat_target_rejected() {
        let now = Utc::now();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let mut s = Session::new(
            SessionConfig::classic(Amount::from_sat(500)).with_fleet(vec![3]),
            AccountId::new("registry"),
            now,
        )
        .unwrap();
        s.join(&alice).unwrap();
        s.join(&bob).unwrap();
        let hash = ShipOpening::new(
            ShipPlacement::new(3, Orientation::Horizontal, 0, 0),
            [3u8; 32],
        )
        .commitment();
        s.submit_all_ship_commitments(&alice, &[hash], now).unwrap();
        s.submit_all_ship_commitments(&bob, &[hash], now).unwrap();

        s.fire_shot(&alice, 0, 0, now).unwrap();
        s.fire_shot_and_report_prior_result(&bob, 9, 9, Report::hit(0), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&alice, 0, 0, Report::miss(), now),
            Err(SalvoError::AlreadyFired { x: 0, y: 0 })
        ));
        s.fire_shot_and_report_prior_result(&alice, 1, 0, Report::miss(), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&bob, 9, 9, Report::hit(0), now),
            Err(SalvoError::AlreadyFired { x: 9, y: 9 })
        ));
        assert_eq!(s.participant(&bob).unwrap().hits_confirmed(), 1);

        // alice's second hit lands on a fresh cell
        s.fire_shot_and_report_prior_result(&bob, 0, 0, Report::hit(0), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&alice, 1, 0, Report::miss(), now),
            Err(SalvoError::AlreadyFired { .. })
        ));
        s.fire_shot_and_report_prior_result(&alice, 1, 1, Report::hit(0), now)
            .unwrap();
        assert_eq!(s.participant(&bob).unwrap().hits_confirmed(), 2);
        assert_eq!(s.participant(&alice).unwrap().hits_confirmed(), 1);
        assert!(!s.fleet_sunk());

        let registry = AccountId::new("registry");
        assert!(matches!(
            s.batch_report_moves(
                &registry,
                &[0],
                &[0],
                &[ShotResult::Miss],
                &[0],
                now
            ),
            Err(SalvoError::AlreadyFired { x: 0, y: 0 })
        ));
        assert_eq!(s.participant(&bob).unwrap().shot_count(), 2);
    }

    #[test]
    fn test_sunk_ship_must_be_revealed_when_required() {
        let (mut s, alice, bob) = started();
        s.config.reveal_on_sink = true;
        let now = Utc::now();

        // alice sinks bob's two-cell ship in row 4
        s.fire_shot(&alice, 0, 4, now).unwrap();
        s.fire_shot_and_report_prior_result(&bob, 9, 9, Report::hit(4), now)
            .unwrap();
        s.fire_shot_and_report_prior_result(&alice, 1, 4, Report::miss(), now)
            .unwrap();
        assert!(matches!(
            s.fire_shot_and_report_prior_result(&bob, 9, 8, Report::hit(4), now),
            Err(SalvoError::SunkShipNotRevealed(4))
        ));

        let wrong = ShipOpening::new(
            ShipPlacement::new(2, Orientation::Horizontal, 0, 4),
            [4u8; 32],
        );
        assert!(matches!(
            s.fire_shot_and_report_prior_result_and_reveal_ship(
                &bob,
                9,
                8,
                Report::hit(4),
                4,
                &wrong,
                now
            ),
            Err(SalvoError::CommitmentMismatch(4))
        ));
        assert_eq!(s.participant(&bob).unwrap().hits_confirmed(), 1);

        let opening = ShipOpening::new(
            ShipPlacement::new(2, Orientation::Horizontal, 0, 4),
            [3u8; 32],
        );
        s.fire_shot_and_report_prior_result_and_reveal_ship(
            &bob,
            9,
            8,
            Report::hit(4),
            4,
            &opening,
            now,
        )
        .unwrap();
        assert_eq!(s.participant(&bob).unwrap().revealed_count(), 1);
        assert_eq!(s.participant(&bob).unwrap().shot_count(), 2);
    }

    #[test]
    fn test_batch_requires_authority() {
        let (mut s, alice, _bob) = started();
        assert!(matches!(
            s.batch_report_moves(&alice, &[0], &[0], &[ShotResult::Unknown], &[0], Utc::now()),
            Err(SalvoError::Unauthorized(_))
        ));
        assert!(s
            .batch_report_moves(
                &AccountId::new("registry"),
                &[0, 1],
                &[0],
                &[ShotResult::Unknown],
                &[0],
                Utc::now()
            )
            .is_err());
    }
}
