use super::{parse_session_id, App};
use anyhow::{bail, Result};
use chrono::Utc;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use salvo_core::{AccountId, Amount, RevealPolicy, Session, SessionConfig};

pub struct CreateOptions {
    pub stake: Option<u64>,
    pub opponent: Option<String>,
    pub board: Option<u32>,
    pub fleet: Option<Vec<u32>>,
    pub tolerant: bool,
    pub reveal_on_sink: bool,
}

impl CreateOptions {
    fn session_config(&self, app: &App) -> Result<SessionConfig> {
        let stake = self.stake.unwrap_or(app.config.default_stake_sats);
        let mut config = SessionConfig::classic(Amount::from_sat(stake))
            .with_timeout(app.config.phase_timeout()?);

        if let Some(size) = self.board {
            config = config.with_board(size, size);
        }
        if let Some(fleet) = &self.fleet {
            config = config.with_fleet(fleet.clone());
        }
        if self.tolerant {
            config = config.with_policy(RevealPolicy::Tolerant);
        }
        config.reveal_on_sink = self.reveal_on_sink;
        Ok(config)
    }
}

pub async fn create_session(app: &mut App, player: &str, options: CreateOptions) -> Result<()> {
    let creator = AccountId::new(player);
    let config = options.session_config(app)?;
    let stake = config.stake;
    let now = Utc::now();

    let id = match &options.opponent {
        Some(opponent) => {
            app.arena
                .create_session_with_opponent(&creator, &AccountId::new(opponent.as_str()), config, now)?
        }
        None => app.arena.create_open_session(&creator, config, now)?,
    };

    println!("Created session {}", id);
    app.commit(id).await?;
    println!();
    println!("Stake: {} sats per player", stake.to_sat());
    if options.opponent.is_none() {
        println!("Waiting for a second player. Share this command:");
        println!("salvo join <player> {}", id);
    } else {
        println!("Both players can now place their fleets:");
        println!("salvo place <player> {} --random", id);
    }

    Ok(())
}

pub async fn join_session(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    app.arena.join_open_session(id, &AccountId::new(player))?;

    println!("Joined session {}", id);
    app.commit(id).await?;
    Ok(())
}

pub async fn list_sessions(app: &App, player: Option<&str>, open_only: bool) -> Result<()> {
    let records = app.store().list_sessions().await?;

    let visible: Vec<_> = match (player, open_only) {
        (_, true) => {
            let open = app.arena.list_open_sessions();
            records.into_iter().filter(|r| open.contains(&r.id)).collect()
        }
        (Some(player), false) => {
            let mine = app
                .arena
                .list_sessions_for_participant(&AccountId::new(player));
            records.into_iter().filter(|r| mine.contains(&r.id)).collect()
        }
        (None, false) => records,
    };

    if visible.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "State", "Outcome", "Player 1", "Player 2", "Stake", "Created"]);

    for record in visible {
        let name = |p: Option<AccountId>| p.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            record.id.to_string(),
            record.state,
            record.end_state,
            name(record.participant1),
            name(record.participant2),
            format!("{} sats", record.stake_sats),
            record.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn show_status(app: &App, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let session = app.arena.snapshot(id)?;
    print_status(&session);
    Ok(())
}

fn print_status(session: &Session) {
    let info = session.get_info();

    println!("Session: {}", info.id);
    println!("State: {}", info.state);
    if session.ended_at().is_some() {
        println!("Outcome: {}", info.end_state);
    }
    println!(
        "Board: {}x{}, fleet {:?}",
        session.board_width(),
        session.board_height(),
        session.fleet()
    );
    println!(
        "Stake: {} sats, pool: {} sats",
        info.stake.to_sat(),
        info.pool.to_sat()
    );
    if let Some(holder) = &info.turn_holder {
        println!("Turn: {}", holder);
    }
    if let Some(deadline) = info.deadline {
        println!("Phase deadline: {}", deadline.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if session.is_emergency_stopped() {
        println!("Emergency stopped by {}", session.authority());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Player", "Committed", "Revealed", "Shots", "Hits taken", "Deposited", "Owed",
    ]);

    let fleet_len = session.fleet().len();
    let escrow = session.escrow();
    for participant in session.participants() {
        let id = participant.id();
        let deposited = session.deposited_of(id).map(|a| a.to_sat()).unwrap_or(0);
        let owed = session.owed_of(id).map(|a| a.to_sat()).unwrap_or(0);
        table.add_row(vec![
            id.to_string(),
            format!("{}/{}", participant.committed_count(), fleet_len),
            format!("{}/{}", participant.revealed_count(), fleet_len),
            participant.shot_count().to_string(),
            participant.hits_confirmed().to_string(),
            format!("{} sats", deposited),
            format!("{} sats", owed),
        ]);
    }

    println!("{}", table);
    if escrow.is_settled() {
        println!("Payouts settled.");
    }
}

pub async fn stop_session(app: &mut App, session_id: &str, force: bool) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let state = app.arena.with_session(id, Session::state)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Stop session {} ({}) and refund both players?",
                id, state
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            bail!("Stop cancelled");
        }
    }

    app.arena.force_stop(id, Utc::now())?;
    println!("Session {} stopped by {}", id, app.arena.authority());
    app.commit(id).await?;
    Ok(())
}
