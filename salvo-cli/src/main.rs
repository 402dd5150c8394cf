mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::App;
use config::CliConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "salvo")]
#[command(about = "Commit-reveal naval wager sessions between two players")]
#[command(version)]
struct Cli {
    /// Data directory for session storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new session
    Create {
        /// Account creating the session
        player: String,
        /// Stake per participant in satoshis
        #[arg(short, long)]
        stake: Option<u64>,
        /// Invite this account directly instead of waiting for a joiner
        #[arg(short, long)]
        opponent: Option<String>,
        /// Board width and height
        #[arg(long)]
        board: Option<u32>,
        /// Ship lengths, comma separated
        #[arg(long, value_delimiter = ',')]
        fleet: Option<Vec<u32>>,
        /// Accept structurally illegal reveals and penalize them at the verdict
        #[arg(long)]
        tolerant: bool,
        /// Require sunk ships to be revealed in the move that reports them
        #[arg(long)]
        reveal_on_sink: bool,
    },
    /// Join an open session
    Join {
        /// Account joining
        player: String,
        /// Session ID
        session_id: String,
    },
    /// List sessions
    List {
        /// Only sessions this account takes part in
        #[arg(short, long)]
        player: Option<String>,
        /// Only sessions still waiting for a second player
        #[arg(long)]
        open: bool,
    },
    /// Show session status
    Status {
        /// Session ID
        session_id: String,
    },
    /// Commit to a fleet placement
    Place {
        player: String,
        session_id: String,
        /// One ship per fleet slot as x,y,h or x,y,v
        ships: Vec<String>,
        /// Generate a random legal placement
        #[arg(short, long)]
        random: bool,
    },
    /// Report the incoming shot and fire back
    Fire {
        player: String,
        session_id: String,
        x: u32,
        y: u32,
        /// Override the reported result: "miss" or "hit:<ship>"
        #[arg(short, long)]
        report: Option<String>,
    },
    /// Close play once a fleet is sunk
    Declare { player: String, session_id: String },
    /// Reveal the locally stored placement
    Reveal { player: String, session_id: String },
    /// Decide the winner once both fleets are revealed
    Settle { player: String, session_id: String },
    /// Force the session forward after its phase deadline
    Timeout { player: String, session_id: String },
    /// Deposit the session stake
    Deposit { player: String, session_id: String },
    /// Withdraw everything owed after the session ended
    Withdraw { player: String, session_id: String },
    /// Administrative emergency stop, refunding both participants
    Stop {
        session_id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "salvo={},salvo_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| CliConfig::default().data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;

    let mut config = CliConfig::load(&data_dir)?;
    config.verbose |= cli.verbose;

    let mut app = App::open(config).await?;

    let result = match cli.command {
        Commands::Create {
            player,
            stake,
            opponent,
            board,
            fleet,
            tolerant,
            reveal_on_sink,
        } => {
            let options = commands::CreateOptions {
                stake,
                opponent,
                board,
                fleet,
                tolerant,
                reveal_on_sink,
            };
            commands::create_session(&mut app, &player, options).await
        }
        Commands::Join { player, session_id } => {
            commands::join_session(&mut app, &player, &session_id).await
        }
        Commands::List { player, open } => commands::list_sessions(&app, player.as_deref(), open).await,
        Commands::Status { session_id } => commands::show_status(&app, &session_id),
        Commands::Place {
            player,
            session_id,
            ships,
            random,
        } => commands::place_fleet(&mut app, &player, &session_id, &ships, random).await,
        Commands::Fire {
            player,
            session_id,
            x,
            y,
            report,
        } => commands::fire(&mut app, &player, &session_id, x, y, report.as_deref()).await,
        Commands::Declare { player, session_id } => {
            commands::declare_finished(&mut app, &player, &session_id).await
        }
        Commands::Reveal { player, session_id } => {
            commands::reveal_fleet(&mut app, &player, &session_id).await
        }
        Commands::Settle { player, session_id } => {
            commands::settle(&mut app, &player, &session_id).await
        }
        Commands::Timeout { player, session_id } => {
            commands::declare_timeout(&mut app, &player, &session_id).await
        }
        Commands::Deposit { player, session_id } => {
            commands::deposit(&mut app, &player, &session_id).await
        }
        Commands::Withdraw { player, session_id } => {
            commands::withdraw(&mut app, &player, &session_id).await
        }
        Commands::Stop { session_id, force } => {
            commands::stop_session(&mut app, &session_id, force).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
