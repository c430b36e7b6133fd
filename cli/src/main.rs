//! Venue Ledger CLI
//!
//! Front-desk commands that operate directly on the configured storage,
//! plus `serve` to run the REST API headless.
//!
//! ```sh
//! venue-cli serve --api-port 8080
//! venue-cli status
//! venue-cli start game-room 3 --players 4
//! venue-cli stop game-room 3
//! venue-cli reset billiard --yes
//! venue-cli watch billiard
//! venue-cli hash-password 's3cret'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use venue_ledger::application::{
    create_event_bus, LedgerService, LiveBoard, LiveTicker, VenueRegistry,
};
use venue_ledger::config::AppConfig;
use venue_ledger::domain::PlayerCount;
use venue_ledger::infrastructure::crypto::password::hash_password;
use venue_ledger::resolve_config_path;
use venue_ledger::server::{build_registry, init_tracing, LedgerStorage, ServerHandle, ServerOptions};
use venue_ledger::shared::shutdown::{listen_for_shutdown_signals, ShutdownSignal};
use venue_ledger::shared::time::{format_hms, SharedClock, SystemClock};

#[derive(Parser, Debug)]
#[command(
    name = "venue-cli",
    version,
    about = "Session billing for billiard tables and game room stations",
    long_about = "Venue Ledger: start and stop timed sessions, print receipts, \
                  watch live boards or serve the REST API.\n\n\
                  Default config: ~/.config/venue-ledger/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "VENUE_LEDGER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API until Ctrl+C.
    Serve {
        #[arg(long)]
        api_port: Option<u16>,
    },
    /// Validate the configuration and exit.
    Check,
    /// Print the ledger of one venue, or all of them.
    Status { venue: Option<String> },
    /// Start a session.
    Start {
        venue: String,
        station: u32,
        /// 2 or 4; ignored by venues that do not price by players.
        #[arg(short, long)]
        players: Option<u8>,
    },
    /// Stop a session and print its receipt.
    Stop { venue: String, station: u32 },
    /// Replace the ledger with a fresh one, dropping running sessions.
    Reset {
        venue: String,
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Redraw the live board every tick until Ctrl+C.
    Watch { venue: String },
    /// Print a bcrypt hash for `admin.users[].password_hash`.
    HashPassword { password: String },
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = resolve_config_path(cli.config.clone());
    let mut config = AppConfig::load(&path)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}

/// One-shot commands keep stdout for their output and log quietly to stderr.
fn init_quiet_tracing(config: &AppConfig, explicit_level: bool) {
    let level = if explicit_level {
        config.logging.level.as_str()
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn open_registry(config: &AppConfig) -> Result<(LedgerStorage, VenueRegistry), Box<dyn std::error::Error>> {
    let storage = LedgerStorage::open(&config.storage).await?;
    let clock: SharedClock = Arc::new(SystemClock);
    let registry = build_registry(config, storage.repo.clone(), clock, create_event_bus()).await;
    Ok((storage, registry))
}

fn print_board(service: &LedgerService, board: &LiveBoard) {
    let venue = service.venue();
    println!(
        "{} ({}) - {}   revenue {:.3} TND   running {}/{}",
        venue.name, venue.id, board.date, board.revenue, board.running, venue.station_count
    );
    for live in &board.stations {
        let station = &live.station;
        let players = station
            .player_count
            .map(|p| format!("  {}p", p))
            .unwrap_or_default();
        if station.running {
            println!(
                "  {} #{:<2} RUNNING  {}  {:>8.3} TND  @ {:.2}/min{}",
                venue.station_label, station.id, live.elapsed, live.live_cost, live.display_rate, players
            );
        } else {
            println!(
                "  {} #{:<2} idle     {}  {:>8.3} TND  @ {:.2}/min",
                venue.station_label,
                station.id,
                format_hms(0),
                live.live_cost,
                live.display_rate
            );
        }
    }
    if !board.persisted {
        println!("  ! latest changes are not saved to {} storage", service.backend_name());
    }
}

fn print_warning(warning: Option<String>) {
    if let Some(warning) = warning {
        eprintln!("warning: {}", warning);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Serve { api_port } => {
            init_tracing(&config);
            if let Some(port) = api_port {
                info!(port, "CLI override: api_port");
                config.server.api_port = port;
            }
            let handle = ServerHandle::start(ServerOptions {
                config,
                ..Default::default()
            })
            .await?;
            handle.install_signal_handler();
            info!("Press Ctrl+C to shut down gracefully");
            handle.run_until_shutdown().await;
        }

        Command::Check => {
            println!("Configuration is valid");
            println!("   Config file : {}", resolve_config_path(cli.config).display());
            println!("   API address : {}", config.api_address());
            println!("   Storage     : {}", config.storage.backend);
            println!("   Time zone   : {} (UTC{:+} min)", config.clock.name, config.clock.utc_offset_minutes);
            for venue in &config.venues {
                println!(
                    "   Venue       : {} '{}' with {} {}s",
                    venue.id,
                    venue.name,
                    venue.station_count,
                    venue.station_label.to_lowercase()
                );
            }
        }

        Command::Status { venue } => {
            init_quiet_tracing(&config, cli.log_level.is_some());
            let (storage, registry) = open_registry(&config).await?;
            let services = match &venue {
                Some(id) => vec![registry.get(id)?],
                None => registry.all().cloned().collect(),
            };
            for service in services {
                print_board(&service, &service.live_board().await);
                println!();
            }
            storage.close().await;
        }

        Command::Start {
            venue,
            station,
            players,
        } => {
            init_quiet_tracing(&config, cli.log_level.is_some());
            let players = players.map(PlayerCount::try_from).transpose()?;
            let (storage, registry) = open_registry(&config).await?;
            let service = registry.get(&venue)?;
            let outcome = service.start(station, players).await?;
            let rate = outcome.value.rate_per_minute.unwrap_or_default();
            match outcome.value.player_count {
                Some(p) => println!(
                    "{} #{} started at {:.2} TND/min for {} players",
                    service.venue().station_label,
                    station,
                    rate,
                    p
                ),
                None => println!(
                    "{} #{} started at {:.2} TND/min",
                    service.venue().station_label,
                    station,
                    rate
                ),
            }
            print_warning(outcome.warning);
            storage.close().await;
        }

        Command::Stop { venue, station } => {
            init_quiet_tracing(&config, cli.log_level.is_some());
            let (storage, registry) = open_registry(&config).await?;
            let service = registry.get(&venue)?;
            let outcome = service.stop(station).await?;
            match &outcome.value {
                Some(receipt) => {
                    println!("{}", receipt.render_ticket(service.venue(), service.zone()));
                    println!();
                    println!("Revenue today: {:.3} TND", outcome.revenue);
                }
                None => println!("{} #{} was not running", service.venue().station_label, station),
            }
            print_warning(outcome.warning);
            storage.close().await;
        }

        Command::Reset { venue, yes } => {
            init_quiet_tracing(&config, cli.log_level.is_some());
            if !yes {
                error!("Refusing to reset without --yes");
                return Err("reset discards revenue and running sessions; pass --yes to confirm".into());
            }
            let (storage, registry) = open_registry(&config).await?;
            let service = registry.get(&venue)?;
            let outcome = service.reset().await?;
            println!("{} ledger reset for {}", service.venue().name, outcome.value.date_key);
            print_warning(outcome.warning);
            storage.close().await;
        }

        Command::Watch { venue } => {
            init_quiet_tracing(&config, cli.log_level.is_some());
            let (storage, registry) = open_registry(&config).await?;
            let service = registry.get(&venue)?;

            let shutdown = ShutdownSignal::new();
            tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));
            let (mut boards, ticker) = LiveTicker::new(service.clone())
                .with_interval_ms(config.display.tick_interval_ms)
                .spawn(shutdown.clone())
                .await;

            loop {
                {
                    let board = boards.borrow_and_update();
                    print!("\x1B[2J\x1B[H");
                    print_board(&service, &board);
                    println!("\nCtrl+C to exit");
                }
                if boards.changed().await.is_err() {
                    break;
                }
            }
            let _ = ticker.await;
            storage.close().await;
        }

        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
    }

    Ok(())
}
