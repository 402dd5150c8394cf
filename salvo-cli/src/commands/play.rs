use super::{parse_session_id, App};
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rand::Rng;
use salvo_core::verdict::placement_sane;
use salvo_core::{
    generate_nonce, AccountId, Orientation, Report, RevealPolicy, Session, SessionConfig,
    SessionState, ShipOpening, ShipPlacement, ShotResult,
};

const PLACEMENT_ATTEMPTS: usize = 1_000;

/// Parse `x,y,h` or `x,y,v` into a ship of the given length.
pub fn parse_ship(input: &str, length: u32) -> Result<ShipPlacement> {
    let parts: Vec<_> = input.split(',').map(str::trim).collect();
    let [x, y, orientation] = parts.as_slice() else {
        bail!("Ship '{}' must look like x,y,h or x,y,v", input);
    };

    let x: u32 = x.parse().with_context(|| format!("bad x in '{}'", input))?;
    let y: u32 = y.parse().with_context(|| format!("bad y in '{}'", input))?;
    let orientation = match orientation.to_ascii_lowercase().as_str() {
        "h" | "horizontal" => Orientation::Horizontal,
        "v" | "vertical" => Orientation::Vertical,
        other => bail!("Unknown orientation '{}'", other),
    };

    Ok(ShipPlacement::new(length, orientation, x, y))
}

/// `miss` or `hit:<ship index>`.
pub fn parse_report(input: &str) -> Result<Report> {
    match input.trim().to_ascii_lowercase().as_str() {
        "miss" => Ok(Report::miss()),
        other => {
            let index = other
                .strip_prefix("hit:")
                .ok_or_else(|| anyhow!("Report must be 'miss' or 'hit:<ship>', got '{}'", input))?;
            Ok(Report::hit(index.parse().context("bad ship index")?))
        }
    }
}

/// The truthful answer to a shot at (x, y) against our own fleet.
pub fn honest_report(fleet: &[ShipOpening], x: u32, y: u32) -> Report {
    match fleet.iter().position(|o| o.placement.covers(x, y)) {
        Some(index) => Report::hit(index),
        None => Report::miss(),
    }
}

pub fn random_placement(config: &SessionConfig) -> Result<Vec<ShipPlacement>> {
    let mut rng = rand::thread_rng();
    let mut fleet: Vec<ShipPlacement> = Vec::with_capacity(config.fleet.len());

    for &length in &config.fleet {
        let ship = (0..PLACEMENT_ATTEMPTS)
            .map(|_| {
                let orientation = if rng.gen_bool(0.5) {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                ShipPlacement::new(
                    length,
                    orientation,
                    rng.gen_range(0..config.board_width),
                    rng.gen_range(0..config.board_height),
                )
            })
            .find(|candidate| {
                candidate.fits(config.board_width, config.board_height)
                    && !fleet.iter().any(|placed| placed.overlaps(candidate))
            })
            .ok_or_else(|| anyhow!("Could not fit a ship of length {} on the board", length))?;
        fleet.push(ship);
    }

    Ok(fleet)
}

pub async fn place_fleet(
    app: &mut App,
    player: &str,
    session_id: &str,
    ships: &[String],
    random: bool,
) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);
    let config = app.arena.with_session(id, |s| s.config().clone())?;

    let placements = match (random, ships.is_empty()) {
        (true, true) => random_placement(&config)?,
        (true, false) => bail!("Pass either ships or --random, not both"),
        (false, _) => {
            if ships.len() != config.fleet.len() {
                bail!(
                    "Fleet {:?} needs {} ships, got {}",
                    config.fleet,
                    config.fleet.len(),
                    ships.len()
                );
            }
            ships
                .iter()
                .zip(&config.fleet)
                .map(|(input, &length)| parse_ship(input, length))
                .collect::<Result<Vec<_>>>()?
        }
    };

    if !placement_sane(&config, &placements) {
        if config.reveal_policy == RevealPolicy::Strict {
            bail!("Placement is not legal: ships must stay on the board and not overlap");
        }
        tracing::warn!("Committing an illegal placement; it will lose at the verdict");
    }

    let openings: Vec<_> = placements
        .into_iter()
        .map(|placement| ShipOpening::new(placement, generate_nonce()))
        .collect();
    let hashes: Vec<_> = openings.iter().map(ShipOpening::commitment).collect();

    app.arena.with_session_mut(id, |s| {
        s.submit_all_ship_commitments(&account, &hashes, Utc::now())
    })?;
    app.client.set_placement(id, &account, openings.clone());

    println!("Fleet committed for {}:", account);
    for (index, opening) in openings.iter().enumerate() {
        let p = opening.placement;
        println!(
            "  ship {} (length {}) at ({}, {}) {:?}",
            index, p.length, p.x, p.y, p.orientation
        );
    }
    app.commit(id).await?;
    Ok(())
}

pub async fn fire(
    app: &mut App,
    player: &str,
    session_id: &str,
    x: u32,
    y: u32,
    report_override: Option<&str>,
) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);
    let session = app.arena.snapshot(id)?;
    let now = Utc::now();

    if session.participants().iter().all(|p| p.shot_count() == 0) {
        app.arena
            .with_session_mut(id, |s| s.fire_shot(&account, x, y, now))?;
        println!("Opening shot at ({}, {})", x, y);
        return app.commit(id).await;
    }

    let fleet = app.client.placement(id, &account).map(<[ShipOpening]>::to_vec);
    let report = match report_override {
        Some(input) => parse_report(input)?,
        None => {
            let fleet = fleet.as_deref().ok_or_else(|| {
                anyhow!("No local placement for {} in {}; pass --report", account, id)
            })?;
            let (px, py) = incoming_shot(&session, &account)?;
            honest_report(fleet, px, py)
        }
    };

    match sinking_reveal(&session, &account, report, fleet.as_deref())? {
        Some(opening) => {
            app.arena.with_session_mut(id, |s| {
                s.fire_shot_and_report_prior_result_and_reveal_ship(
                    &account,
                    x,
                    y,
                    report,
                    report.ship_index,
                    &opening,
                    now,
                )
            })?;
            println!("Ship {} sunk and revealed", report.ship_index);
        }
        None => {
            app.arena.with_session_mut(id, |s| {
                s.fire_shot_and_report_prior_result(&account, x, y, report, now)
            })?;
        }
    }

    match report.result {
        ShotResult::Hit => println!("Reported hit on ship {}", report.ship_index),
        _ => println!("Reported miss"),
    }
    println!("Fired at ({}, {})", x, y);
    app.commit(id).await?;

    if app.arena.with_session(id, Session::fleet_sunk)? {
        println!();
        println!("A fleet has been sunk. Close play with:");
        println!("salvo declare {} {}", player, id);
    }
    Ok(())
}

fn incoming_shot(session: &Session, account: &AccountId) -> Result<(u32, u32)> {
    session
        .participants()
        .iter()
        .find(|p| p.id() != account)
        .and_then(|opponent| opponent.shots_fired().last())
        .filter(|shot| shot.is_pending())
        .map(|shot| (shot.x, shot.y))
        .ok_or_else(|| anyhow!("No incoming shot to report"))
}

/// The opening to send along when this report sinks a ship and the session
/// requires sunk ships to be shown.
fn sinking_reveal(
    session: &Session,
    account: &AccountId,
    report: Report,
    fleet: Option<&[ShipOpening]>,
) -> Result<Option<ShipOpening>> {
    if report.result != ShotResult::Hit || !session.config().reveal_on_sink {
        return Ok(None);
    }

    let me = session
        .participant(account)
        .ok_or_else(|| anyhow!("{} is not in session {}", account, session.id()))?;
    let index = report.ship_index;
    let taken = me.per_ship_hits().get(index).copied().unwrap_or(0);
    if session.fleet().get(index) != Some(&(taken + 1)) {
        return Ok(None);
    }

    let opening = fleet
        .and_then(|fleet| fleet.get(index))
        .copied()
        .ok_or_else(|| anyhow!("Ship {} is sunk but no local placement is stored", index))?;
    Ok(Some(opening))
}

pub async fn declare_finished(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);

    app.arena
        .with_session_mut(id, |s| s.try_declare_finished(&account, Utc::now()))?;
    println!("Play closed. Both players must now reveal:");
    println!("salvo reveal <player> {}", id);
    app.commit(id).await
}

pub async fn reveal_fleet(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);
    let openings = app
        .client
        .placement(id, &account)
        .map(<[ShipOpening]>::to_vec)
        .ok_or_else(|| anyhow!("No local placement for {} in {}", account, id))?;

    let state = app.arena.with_session_mut(id, |s| {
        s.reveal_all_ships(&account, &openings)?;
        Ok(s.state())
    })?;

    println!("Fleet revealed for {}", account);
    app.commit(id).await?;
    if state == SessionState::ShipsRevealed {
        println!();
        println!("Both fleets are revealed. Decide the winner with:");
        println!("salvo settle {} {}", player, id);
    }
    Ok(())
}

pub async fn settle(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);

    let end_state = app
        .arena
        .with_session_mut(id, |s| s.check_winner_when_both_revealed(&account, Utc::now()))?;
    println!("Outcome: {}", end_state);
    app.commit(id).await
}

pub async fn declare_timeout(app: &mut App, player: &str, session_id: &str) -> Result<()> {
    let id = parse_session_id(session_id)?;
    let account = AccountId::new(player);

    let end_state = app
        .arena
        .with_session_mut(id, |s| s.try_declare_timeout_or_ended(&account, Utc::now()))?;
    println!("Session ended: {}", end_state);
    app.commit(id).await
}
