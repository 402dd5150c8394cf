use crate::commitment::{CommitHash, ShipOpening};
use crate::config::SessionConfig;
use crate::escrow::Escrow;
use crate::events::SessionEvent;
use crate::participant::Participant;
use crate::types::{AccountId, EndState, Seat, SessionState};
use crate::{Result, SalvoError};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single two-party game, from creation to payout.
///
/// All mutation goes through the operations defined on this type (here and in
/// the `ledger`, `verdict`, `clock` and `escrow` modules). An operation either
/// succeeds completely or returns an error and leaves the session untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) config: SessionConfig,
    pub(crate) authority: AccountId,
    pub(crate) state: SessionState,
    pub(crate) end_state: EndState,
    pub(crate) participants: Vec<Participant>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    pub(crate) last_move_at: Option<DateTime<Utc>>,
    pub(crate) ended_at: Option<DateTime<Utc>>,
    pub(crate) escrow: Escrow,
    pub(crate) emergency_stopped: bool,
    #[serde(skip)]
    pub(crate) events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: SessionConfig, authority: AccountId, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;

        let session = Self {
            id: Uuid::new_v4(),
            config,
            authority,
            state: SessionState::Created,
            end_state: EndState::Unknown,
            participants: Vec::with_capacity(2),
            created_at: now,
            started_at: None,
            finished_at: None,
            last_move_at: None,
            ended_at: None,
            escrow: Escrow::new(),
            emergency_stopped: false,
            events: Vec::new(),
        };

        tracing::info!(
            "Session {} created ({}x{}, fleet {:?}, stake {} sats)",
            session.id,
            session.config.board_width,
            session.config.board_height,
            session.config.fleet,
            session.config.stake.to_sat()
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn authority(&self) -> &AccountId {
        &self.authority
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn end_state(&self) -> EndState {
        self.end_state
    }

    pub fn fleet(&self) -> &[u32] {
        &self.config.fleet
    }

    pub fn board_width(&self) -> u32 {
        self.config.board_width
    }

    pub fn board_height(&self) -> u32 {
        self.config.board_height
    }

    pub fn stake(&self) -> Amount {
        self.config.stake
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn last_move_at(&self) -> Option<DateTime<Utc>> {
        self.last_move_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stopped
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant1(&self) -> Option<&AccountId> {
        self.participants.first().map(Participant::id)
    }

    pub fn participant2(&self) -> Option<&AccountId> {
        self.participants.get(1).map(Participant::id)
    }

    pub fn participant(&self, account: &AccountId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == account)
    }

    pub fn is_participant(&self, account: &AccountId) -> bool {
        self.participant(account).is_some()
    }

    /// Events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn get_info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            state: self.state,
            end_state: self.end_state,
            participant1: self.participant1().cloned(),
            participant2: self.participant2().cloned(),
            stake: self.config.stake,
            pool: self.escrow.pool(),
            turn_holder: self.current_turn_holder().cloned(),
            deadline: self.deadline(),
            created_at: self.created_at,
        }
    }

    /// Add the caller as the next participant.
    pub fn join(&mut self, caller: &AccountId) -> Result<Seat> {
        if self.is_participant(caller) {
            return Err(SalvoError::AlreadyJoined(caller.clone()));
        }

        if self.participants.len() >= 2 {
            return Err(SalvoError::SessionFull);
        }

        if self.state != SessionState::Created {
            return Err(SalvoError::wrong_phase("Created", self.state));
        }

        self.participants
            .push(Participant::new(caller.clone(), self.config.fleet.len()));
        let seat = if self.participants.len() == 1 {
            Seat::First
        } else {
            Seat::Second
        };

        tracing::info!("Player {} joined session {} as {:?}", caller, self.id, seat);
        self.events.push(SessionEvent::PlayerJoined {
            participant: caller.clone(),
        });

        if self.participants.len() == 2 {
            self.transition(SessionState::PlayersJoined);
        }

        Ok(seat)
    }

    pub fn submit_ship_commitment(
        &mut self,
        caller: &AccountId,
        ship_index: usize,
        commitment: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seat = self.seat_of(caller)?;
        self.ensure_placement_open()?;

        self.seat_mut(seat)?.commit(ship_index, commitment)?;
        self.events.push(SessionEvent::ShipAdded {
            participant: caller.clone(),
            ship_index,
        });

        self.maybe_start(now);
        Ok(())
    }

    pub fn submit_all_ship_commitments(
        &mut self,
        caller: &AccountId,
        commitments: &[CommitHash],
        now: DateTime<Utc>,
    ) -> Result<()> {
        let seat = self.seat_of(caller)?;
        self.ensure_placement_open()?;

        let expected = self.config.fleet.len();
        if commitments.len() != expected {
            return Err(SalvoError::CommitmentCount {
                expected,
                got: commitments.len(),
            });
        }

        let participant = self.seat_ref(seat)?;
        if let Some(filled) = participant.commitments().iter().position(Option::is_some) {
            return Err(SalvoError::AlreadyCommitted(filled));
        }

        let participant = self.seat_mut(seat)?;
        for (index, commitment) in commitments.iter().enumerate() {
            participant.commit(index, *commitment)?;
        }
        for ship_index in 0..expected {
            self.events.push(SessionEvent::ShipAdded {
                participant: caller.clone(),
                ship_index,
            });
        }

        self.maybe_start(now);
        Ok(())
    }

    /// Open one of the caller's commitments after play has finished.
    pub fn reveal_ship(
        &mut self,
        caller: &AccountId,
        ship_index: usize,
        opening: &ShipOpening,
    ) -> Result<()> {
        let seat = self.seat_of(caller)?;
        if self.state != SessionState::Finished {
            return Err(SalvoError::wrong_phase("Finished", self.state));
        }

        self.reveal_for(seat, ship_index, opening)?;
        self.maybe_all_revealed();
        Ok(())
    }

    /// Open every slot in fleet order. Slots already opened must be repeated
    /// unchanged.
    pub fn reveal_all_ships(&mut self, caller: &AccountId, openings: &[ShipOpening]) -> Result<()> {
        let seat = self.seat_of(caller)?;
        if self.state != SessionState::Finished {
            return Err(SalvoError::wrong_phase("Finished", self.state));
        }

        let expected = self.config.fleet.len();
        if openings.len() != expected {
            return Err(SalvoError::CommitmentCount {
                expected,
                got: openings.len(),
            });
        }

        let mut next = self.clone();
        for (index, opening) in openings.iter().enumerate() {
            let existing = next.seat_ref(seat)?.revealed()[index];
            match existing {
                Some(placement) if placement == opening.placement => continue,
                Some(_) => return Err(SalvoError::AlreadyRevealed(index)),
                None => next.reveal_for(seat, index, opening)?,
            }
        }
        next.maybe_all_revealed();

        *self = next;
        Ok(())
    }

    pub(crate) fn reveal_for(
        &mut self,
        seat: Seat,
        ship_index: usize,
        opening: &ShipOpening,
    ) -> Result<()> {
        let config = self.config.clone();
        let participant = self.seat_mut(seat)?;
        participant.reveal(ship_index, opening, &config)?;
        let id = participant.id().clone();
        self.events.push(SessionEvent::ShipRevealed {
            participant: id,
            ship_index,
        });
        Ok(())
    }

    pub(crate) fn seat_of(&self, account: &AccountId) -> Result<Seat> {
        match self.participants.iter().position(|p| p.id() == account) {
            Some(0) => Ok(Seat::First),
            Some(_) => Ok(Seat::Second),
            None => Err(SalvoError::NotParticipant(account.clone())),
        }
    }

    pub(crate) fn seat_ref(&self, seat: Seat) -> Result<&Participant> {
        self.participants
            .get(seat.index())
            .ok_or_else(|| SalvoError::internal(format!("{:?} seat is empty", seat)))
    }

    pub(crate) fn seat_mut(&mut self, seat: Seat) -> Result<&mut Participant> {
        self.participants
            .get_mut(seat.index())
            .ok_or_else(|| SalvoError::internal(format!("{:?} seat is empty", seat)))
    }

    pub(crate) fn account_at(&self, seat: Seat) -> Option<&AccountId> {
        self.participants.get(seat.index()).map(Participant::id)
    }

    pub(crate) fn transition(&mut self, to: SessionState) {
        let from = self.state;
        debug_assert!(to > from, "session state must move forward");
        self.state = to;
        tracing::info!("Session {} moved {} -> {}", self.id, from, to);
        self.events.push(SessionEvent::StateChanged { from, to });
    }

    /// Record the outcome, enter `Ended` and credit payouts.
    pub(crate) fn end(&mut self, end_state: EndState, now: DateTime<Utc>) {
        self.end_state = end_state;
        self.ended_at = Some(now);
        self.transition(SessionState::Ended);
        self.escrow.settle(end_state);
        tracing::info!(
            "Session {} ended: {} (owed {} / {} sats)",
            self.id,
            end_state,
            self.escrow.owed(Seat::First).to_sat(),
            self.escrow.owed(Seat::Second).to_sat()
        );
        self.events.push(SessionEvent::GameEnded { end_state });
    }

    fn ensure_placement_open(&self) -> Result<()> {
        match self.state {
            SessionState::Created | SessionState::PlayersJoined => Ok(()),
            other => Err(SalvoError::wrong_phase("Created or PlayersJoined", other)),
        }
    }

    fn maybe_start(&mut self, now: DateTime<Utc>) {
        let ready = self.participants.len() == 2
            && self.participants.iter().all(Participant::has_committed_all);
        if ready && self.state == SessionState::PlayersJoined {
            self.started_at = Some(now);
            self.transition(SessionState::Started);
        }
    }

    pub(crate) fn maybe_all_revealed(&mut self) {
        let all = self.participants.len() == 2
            && self.participants.iter().all(Participant::has_revealed_all);
        if all && self.state == SessionState::Finished {
            self.transition(SessionState::ShipsRevealed);
        }
    }
}

/// Session info for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub state: SessionState,
    pub end_state: EndState,
    pub participant1: Option<AccountId>,
    pub participant2: Option<AccountId>,
    pub stake: Amount,
    pub pool: Amount,
    pub turn_holder: Option<AccountId>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::ShipOpening;
    use crate::types::{Orientation, ShipPlacement};

    fn session() -> Session {
        Session::new(
            SessionConfig::classic(Amount::from_sat(1_000)),
            AccountId::new("registry"),
            Utc::now(),
        )
        .unwrap()
    }

    fn row_fleet() -> Vec<CommitHash> {
        [5u32, 4, 3, 3, 2]
            .iter()
            .enumerate()
            .map(|(row, &len)| {
                ShipOpening::new(
                    ShipPlacement::new(len, Orientation::Horizontal, 0, row as u32),
                    [1u8; 32],
                )
                .commitment()
            })
            .collect()
    }

    #[test]
    fn test_join_rules() {
        let mut s = session();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");

        assert_eq!(s.join(&alice).unwrap(), Seat::First);
        assert_eq!(s.state(), SessionState::Created);
        assert!(matches!(s.join(&alice), Err(SalvoError::AlreadyJoined(_))));

        assert_eq!(s.join(&bob).unwrap(), Seat::Second);
        assert_eq!(s.state(), SessionState::PlayersJoined);
        assert!(matches!(
            s.join(&AccountId::new("carol")),
            Err(SalvoError::SessionFull)
        ));
    }

    #[test]
    fn test_commitments_start_the_game() {
        let mut s = session();
        let alice = AccountId::new("alice");
        let bob = AccountId::new("bob");
        let now = Utc::now();
        s.join(&alice).unwrap();

        // the creator may place before an opponent shows up
        s.submit_ship_commitment(&alice, 4, row_fleet()[4], now).unwrap();
        assert!(matches!(
            s.submit_ship_commitment(&AccountId::new("carol"), 0, row_fleet()[0], now),
            Err(SalvoError::NotParticipant(_))
        ));
        assert!(matches!(
            s.submit_ship_commitment(&alice, 5, row_fleet()[0], now),
            Err(SalvoError::ShipIndexOutOfRange { .. })
        ));
        assert!(matches!(
            s.submit_all_ship_commitments(&alice, &row_fleet(), now),
            Err(SalvoError::AlreadyCommitted(4))
        ));

        for (i, hash) in row_fleet().into_iter().enumerate().take(4) {
            s.submit_ship_commitment(&alice, i, hash, now).unwrap();
        }
        s.join(&bob).unwrap();
        assert_eq!(s.state(), SessionState::PlayersJoined);

        s.submit_all_ship_commitments(&bob, &row_fleet(), now).unwrap();
        assert_eq!(s.state(), SessionState::Started);
        assert_eq!(s.started_at(), Some(now));
        assert_eq!(s.current_turn_holder(), Some(&alice));

        assert!(s
            .submit_ship_commitment(&bob, 0, row_fleet()[0], now)
            .is_err());
    }

    #[test]
    fn test_reveal_requires_finished() {
        let mut s = session();
        let alice = AccountId::new("alice");
        s.join(&alice).unwrap();
        let opening = ShipOpening::new(
            ShipPlacement::new(5, Orientation::Horizontal, 0, 0),
            [1u8; 32],
        );
        assert!(matches!(
            s.reveal_ship(&alice, 0, &opening),
            Err(SalvoError::InvalidState(_))
        ));
    }
}
