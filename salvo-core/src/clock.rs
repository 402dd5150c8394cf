//! Phase deadlines and the forced transitions they allow.
//!
//! Nothing here runs on a timer. A participant supplies the current time and
//! the check is otherwise a pure function of session state.

use crate::session::Session;
use crate::types::{AccountId, EndState, Seat, SessionState};
use crate::{Result, SalvoError};
use chrono::{DateTime, Duration, Utc};

impl Session {
    /// Timestamp the current phase is measured from.
    pub fn phase_anchor(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Created | SessionState::PlayersJoined => Some(self.created_at),
            SessionState::Started => self.last_move_at.or(self.started_at),
            SessionState::Finished | SessionState::ShipsRevealed => self.finished_at,
            SessionState::Ended => None,
        }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let timeout = Duration::from_std(self.config.phase_timeout).ok()?;
        self.phase_anchor()?.checked_add_signed(timeout)
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Force the session forward if its phase deadline has passed, or resolve
    /// it if both fleets are already revealed.
    pub fn try_declare_timeout_or_ended(
        &mut self,
        caller: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<EndState> {
        self.seat_of(caller)?;

        if self.state == SessionState::Ended {
            return Err(SalvoError::wrong_phase("a live session", self.state));
        }

        if self.state == SessionState::ShipsRevealed {
            let end_state = self.resolve()?;
            self.end(end_state, now);
            return Ok(end_state);
        }

        // nobody owes a move once a fleet is down
        if self.state == SessionState::Started && self.fleet_sunk() {
            return Err(SalvoError::FleetSunk);
        }

        let deadline = self
            .deadline()
            .ok_or_else(|| SalvoError::internal("phase has no deadline"))?;
        if now < deadline {
            return Err(SalvoError::DeadlineNotReached(deadline));
        }

        let end_state = match self.state {
            SessionState::Created | SessionState::PlayersJoined => EndState::Draw,
            SessionState::Started => self.stalled_play_outcome(),
            SessionState::Finished => self.missing_reveal_outcome()?,
            SessionState::ShipsRevealed | SessionState::Ended => {
                return Err(SalvoError::internal("unreachable timeout state"))
            }
        };

        tracing::warn!(
            "Session {} timed out in {} (deadline {}): {}",
            self.id,
            self.state,
            deadline,
            end_state
        );
        self.end(end_state, now);
        Ok(end_state)
    }

    /// Whoever owes the next move forfeits. No moves at all is a draw.
    fn stalled_play_outcome(&self) -> EndState {
        if self.participants.iter().all(|p| p.shot_count() == 0) {
            return EndState::Draw;
        }

        match self.turn_seat() {
            Some(stalled) => EndState::invalid_win(stalled.opponent()),
            None => EndState::Draw,
        }
    }

    fn missing_reveal_outcome(&self) -> Result<EndState> {
        let first = self.seat_ref(Seat::First)?.has_revealed_all();
        let second = self.seat_ref(Seat::Second)?.has_revealed_all();

        Ok(match (first, second) {
            (true, false) => EndState::invalid_win(Seat::First),
            (false, true) => EndState::invalid_win(Seat::Second),
            (true, true) => self.resolve()?,
            (false, false) => EndState::Draw,
        })
    }
}
