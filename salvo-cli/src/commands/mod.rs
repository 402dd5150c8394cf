pub mod escrow;
pub mod play;
pub mod session;

pub use escrow::{deposit, withdraw};
pub use play::{declare_finished, declare_timeout, fire, place_fleet, reveal_fleet, settle};
pub use session::{
    create_session, join_session, list_sessions, show_status, stop_session, CreateOptions,
};

use crate::config::CliConfig;
use anyhow::{anyhow, Context, Result};
use salvo_core::{AccountId, SessionArena, SessionEvent, SessionStore, ShipOpening, Storage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Secrets and balances that only this machine knows about.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    /// key: "session_id:account"
    placements: HashMap<String, Vec<ShipOpening>>,
    /// Sats withdrawn into each local account.
    balances: HashMap<String, u64>,
}

impl ClientState {
    fn key(session_id: Uuid, account: &AccountId) -> String {
        format!("{}:{}", session_id, account)
    }

    pub fn placement(&self, session_id: Uuid, account: &AccountId) -> Option<&[ShipOpening]> {
        self.placements
            .get(&Self::key(session_id, account))
            .map(Vec::as_slice)
    }

    pub fn set_placement(&mut self, session_id: Uuid, account: &AccountId, fleet: Vec<ShipOpening>) {
        self.placements.insert(Self::key(session_id, account), fleet);
    }

    pub fn balance(&self, account: &AccountId) -> u64 {
        self.balances.get(account.as_str()).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, account: &AccountId, sats: u64) -> u64 {
        let balance = self.balances.entry(account.to_string()).or_insert(0);
        *balance += sats;
        *balance
    }
}

/// Everything a command needs: config, persisted sessions and local secrets.
pub struct App {
    pub config: CliConfig,
    storage: Storage,
    pub arena: SessionArena,
    pub client: ClientState,
}

impl App {
    pub async fn open(config: CliConfig) -> Result<Self> {
        let storage = Storage::new(&config.db_path()).await?;
        let arena = SessionArena::new(AccountId::new(config.authority.as_str()));

        for session in SessionStore::new(&storage).load_all().await? {
            let id = session.id();
            if let Err(e) = arena.insert(session) {
                tracing::warn!("Skipping session {}: {}", id, e);
            }
        }

        let client = load_client_state(&config.client_state_path())?;
        Ok(Self {
            config,
            storage,
            arena,
            client,
        })
    }

    pub fn store(&self) -> SessionStore<'_> {
        SessionStore::new(&self.storage)
    }

    /// Write the session back, print what changed and save local state.
    pub async fn commit(&mut self, id: Uuid) -> Result<()> {
        let events = self.arena.with_session_mut(id, |s| Ok(s.drain_events()))?;
        let snapshot = self.arena.snapshot(id)?;
        self.store().save_session(&snapshot).await?;
        save_client_state(&self.config.client_state_path(), &self.client)?;

        for event in &events {
            println!("  {}", describe_event(event));
        }
        Ok(())
    }
}

fn load_client_state(path: &Path) -> Result<ClientState> {
    if !path.exists() {
        return Ok(ClientState::default());
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn save_client_state(path: &Path, state: &ClientState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(state)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn parse_session_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| anyhow!("Invalid session ID '{}': {}", s, e))
}

pub fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::StateChanged { from, to } => format!("state {} -> {}", from, to),
        SessionEvent::PlayerJoined { participant } => format!("{} joined", participant),
        SessionEvent::ShipAdded {
            participant,
            ship_index,
        } => format!("{} committed ship {}", participant, ship_index),
        SessionEvent::MoveMade { participant, x, y } => {
            format!("{} fired at ({}, {})", participant, x, y)
        }
        SessionEvent::ShipRevealed {
            participant,
            ship_index,
        } => format!("{} revealed ship {}", participant, ship_index),
        SessionEvent::DepositMade {
            participant,
            amount,
        } => format!("{} deposited {} sats", participant, amount.to_sat()),
        SessionEvent::GameEnded { end_state } => format!("game ended: {}", end_state),
        SessionEvent::Withdrawn {
            participant,
            amount,
        } => format!("{} withdrew {} sats", participant, amount.to_sat()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvo_core::{Orientation, ShipPlacement};

    #[test]
    fn test_client_state_keys_by_session_and_account() {
        let mut state = ClientState::default();
        let session = Uuid::new_v4();
        let alice = AccountId::new("alice");
        let fleet = vec![ShipOpening::new(
            ShipPlacement::new(2, Orientation::Vertical, 4, 4),
            [1; 32],
        )];

        state.set_placement(session, &alice, fleet.clone());
        assert_eq!(state.placement(session, &alice), Some(fleet.as_slice()));
        assert!(state.placement(session, &AccountId::new("bob")).is_none());
        assert!(state.placement(Uuid::new_v4(), &alice).is_none());

        assert_eq!(state.credit(&alice, 500), 500);
        assert_eq!(state.credit(&alice, 250), 750);

        let json = serde_json::to_string(&state).unwrap();
        let back: ClientState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.balance(&alice), 750);
    }
}
