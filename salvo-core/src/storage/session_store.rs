use crate::error::{Result, SalvoError};
use crate::session::Session;
use crate::storage::Storage;
use crate::types::{AccountId, SessionState};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

/// Summary row of a stored session, readable without decoding the full state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub state: String,
    pub end_state: String,
    pub participant1: Option<AccountId>,
    pub participant2: Option<AccountId>,
    pub stake_sats: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended.to_string()
    }
}

pub struct SessionStore<'a> {
    storage: &'a Storage,
}

impl<'a> SessionStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let data = serde_json::to_string(session)?;
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO sessions
                (id, state, end_state, participant1, participant2, stake_sats, created_at, updated_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                session.id().to_string(),
                session.state().to_string(),
                session.end_state().to_string(),
                session.participant1().map(AccountId::as_str),
                session.participant2().map(AccountId::as_str),
                session.stake().to_sat() as i64,
                session.created_at().timestamp(),
                Utc::now().timestamp(),
                data,
            ],
        )?;

        tracing::debug!("Saved session {} ({})", session.id(), session.state());
        Ok(())
    }

    pub async fn load_session(&self, id: Uuid) -> Result<Session> {
        let conn = self.storage.get_connection().await;

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM sessions WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let data = data.ok_or(SalvoError::SessionNotFound(id))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Every stored session, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT id, state, end_state, participant1, participant2, stake_sats, created_at, updated_at
             FROM sessions ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, state, end_state, p1, p2, stake, created_at, updated_at) = row?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| SalvoError::internal(format!("Corrupt session id {}: {}", id, e)))?;

            records.push(SessionRecord {
                id,
                state,
                end_state,
                participant1: p1.map(AccountId::new),
                participant2: p2.map(AccountId::new),
                stake_sats: stake as u64,
                created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
                updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
            });
        }

        Ok(records)
    }

    /// Decode every stored session, e.g. to warm a [`crate::SessionArena`].
    pub async fn load_all(&self) -> Result<Vec<Session>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT data FROM sessions ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for data in rows {
            sessions.push(serde_json::from_str(&data?)?);
        }
        Ok(sessions)
    }

    pub async fn delete_session(&self, id: Uuid) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id.to_string()])?;
        if removed == 0 {
            return Err(SalvoError::SessionNotFound(id));
        }
        Ok(())
    }

    pub async fn session_exists(&self, id: Uuid) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use bitcoin::Amount;

    #[tokio::test]
    async fn test_save_load_roundtrip_keeps_game_state() {
        let storage = Storage::in_memory().await.unwrap();
        let store = SessionStore::new(&storage);

        let alice = AccountId::new("alice");
        let mut session = Session::new(
            SessionConfig::classic(Amount::from_sat(2_500)),
            AccountId::new("registry"),
            Utc::now(),
        )
        .unwrap();
        session.join(&alice).unwrap();
        session.deposit_stake(&alice, Amount::from_sat(2_500)).unwrap();

        store.save_session(&session).await.unwrap();
        assert!(store.session_exists(session.id()).await.unwrap());

        let mut loaded = store.load_session(session.id()).await.unwrap();
        assert_eq!(loaded.id(), session.id());
        assert_eq!(loaded.participant1(), Some(&alice));
        assert_eq!(loaded.deposited_of(&alice).unwrap(), Amount::from_sat(2_500));
        assert!(loaded.drain_events().is_empty());

        let records = store.list_sessions().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stake_sats, 2_500);
        assert_eq!(records[0].participant2, None);
        assert!(!records[0].is_ended());
    }

    #[tokio::test]
    async fn test_delete_and_missing_sessions() {
        let storage = Storage::in_memory().await.unwrap();
        let store = SessionStore::new(&storage);
        let missing = Uuid::new_v4();

        assert!(!store.session_exists(missing).await.unwrap());
        assert!(matches!(
            store.load_session(missing).await,
            Err(SalvoError::SessionNotFound(_))
        ));
        assert!(store.delete_session(missing).await.is_err());

        let session = Session::new(SessionConfig::default(), AccountId::new("registry"), Utc::now())
            .unwrap();
        store.save_session(&session).await.unwrap();
        store.delete_session(session.id()).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
