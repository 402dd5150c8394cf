use crate::config::SessionConfig;
use crate::session::Session;
use crate::types::{AccountId, SessionState};
use crate::{Result, SalvoError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Sessions keyed by id. The arena is the administrative authority of every
/// session it creates.
pub struct SessionArena {
    authority: AccountId,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionArena {
    pub fn new(authority: AccountId) -> Self {
        Self {
            authority,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn authority(&self) -> &AccountId {
        &self.authority
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Track an existing session, e.g. one loaded from storage.
    pub fn insert(&self, session: Session) -> Result<()> {
        if session.authority() != &self.authority {
            return Err(SalvoError::Unauthorized(session.authority().clone()));
        }
        self.sessions.write().insert(session.id(), session);
        Ok(())
    }

    pub fn create_open_session(
        &self,
        creator: &AccountId,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let mut session = Session::new(config, self.authority.clone(), now)?;
        session.join(creator)?;

        let id = session.id();
        self.sessions.write().insert(id, session);
        tracing::info!("Open session {} created by {}", id, creator);
        Ok(id)
    }

    pub fn create_session_with_opponent(
        &self,
        creator: &AccountId,
        opponent: &AccountId,
        config: SessionConfig,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        if creator == opponent {
            return Err(SalvoError::AlreadyJoined(opponent.clone()));
        }

        let mut session = Session::new(config, self.authority.clone(), now)?;
        session.join(creator)?;
        session.join(opponent)?;

        let id = session.id();
        self.sessions.write().insert(id, session);
        tracing::info!("Session {} created by {} against {}", id, creator, opponent);
        Ok(id)
    }

    /// Sessions still waiting for a second participant, oldest first.
    pub fn list_open_sessions(&self) -> Vec<Uuid> {
        let sessions = self.sessions.read();
        let mut open: Vec<_> = sessions
            .values()
            .filter(|s| s.state() == SessionState::Created && s.participant_count() == 1)
            .map(|s| (s.created_at(), s.id()))
            .collect();
        open.sort();
        open.into_iter().map(|(_, id)| id).collect()
    }

    pub fn list_sessions_for_participant(&self, account: &AccountId) -> Vec<Uuid> {
        let sessions = self.sessions.read();
        let mut mine: Vec<_> = sessions
            .values()
            .filter(|s| s.is_participant(account))
            .map(|s| (s.created_at(), s.id()))
            .collect();
        mine.sort();
        mine.into_iter().map(|(_, id)| id).collect()
    }

    pub fn join_open_session(&self, id: Uuid, caller: &AccountId) -> Result<()> {
        self.with_session_mut(id, |session| session.join(caller).map(|_| ()))
    }

    /// Run a read-only operation against one session.
    pub fn with_session<T>(&self, id: Uuid, f: impl FnOnce(&Session) -> T) -> Result<T> {
        let sessions = self.sessions.read();
        let session = sessions.get(&id).ok_or(SalvoError::SessionNotFound(id))?;
        Ok(f(session))
    }

    /// Run one operation atomically against one session.
    pub fn with_session_mut<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or(SalvoError::SessionNotFound(id))?;
        f(session)
    }

    pub fn snapshot(&self, id: Uuid) -> Result<Session> {
        self.with_session(id, Session::clone)
    }

    pub fn force_stop(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let authority = self.authority.clone();
        self.with_session_mut(id, |session| session.emergency_stop(&authority, now))
    }

    /// Drop an ended session from the arena.
    pub fn destroy(&self, id: Uuid) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let state = sessions
            .get(&id)
            .map(Session::state)
            .ok_or(SalvoError::SessionNotFound(id))?;

        if state != SessionState::Ended {
            return Err(SalvoError::wrong_phase("Ended", state));
        }

        tracing::info!("Session {} destroyed", id);
        sessions
            .remove(&id)
            .ok_or(SalvoError::SessionNotFound(id))
    }
}
