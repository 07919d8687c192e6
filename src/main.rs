// Headless match runner
// Plays one side of a match over the relay server with a simple ball-following
// pointer, then stores the observed result locally.

use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use p2pong_sync::config::{self, Config};
use p2pong_sync::driver::MatchDriver;
use p2pong_sync::game::Role;
use p2pong_sync::ledger::MatchRecord;
use p2pong_sync::logging;
use p2pong_sync::network::RelayTransport;
use p2pong_sync::results::{GameResult, ResultStore};
use p2pong_sync::ConnectionState;

// Pointer speed cap (field units per frame) so rallies eventually end
const POINTER_MAX_STEP: f32 = 7.0;

// Frames to keep running after the end so the last messages reach the relay
const FLUSH_DURATION: Duration = Duration::from_millis(500);

enum Command {
    Play {
        role: Role,
        record: MatchRecord,
        server: Option<String>,
    },
    Results {
        clear: bool,
    },
}

struct Args {
    command: Command,
    debug: bool,
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let parsed = parse_args(&args)?;

    logging::init(parsed.debug)?;
    if parsed.debug {
        eprintln!("Debug log: {}", logging::LOG_FILE_PATH);
    }

    match parsed.command {
        Command::Play {
            role,
            record,
            server,
        } => {
            let mut config = config::load_config().context("Failed to load configuration")?;
            if let Some(server) = server {
                config.session.signaling_server = server;
            }
            play(role, record, &config)
        }
        Command::Results { clear } => show_results(clear),
    }
}

/// Parse command line arguments
fn parse_args(args: &[String]) -> Result<Args> {
    let program = args.first().map(String::as_str).unwrap_or("p2pong-sync");
    let debug = args.iter().any(|a| a == "--debug");
    let rest: Vec<&String> = args.iter().skip(1).filter(|a| *a != "--debug").collect();

    let Some(first) = rest.first() else {
        print_usage(program);
        std::process::exit(0);
    };

    let command = match first.as_str() {
        "--host" | "--join" => {
            if rest.len() < 4 {
                print_usage(program);
                bail!("{} requires <match-id> <side-a> <side-b>", first);
            }
            let role = if first.as_str() == "--host" {
                Role::Host
            } else {
                Role::Guest
            };
            let server = match rest.get(4).map(|s| s.as_str()) {
                Some("--server") => Some(
                    rest.get(5)
                        .map(|s| s.to_string())
                        .context("--server requires a URL")?,
                ),
                Some(other) => bail!("Unknown argument: {}", other),
                None => None,
            };
            Command::Play {
                role,
                record: MatchRecord {
                    match_id: rest[1].clone(),
                    side_a: rest[2].clone(),
                    side_b: rest[3].clone(),
                    stake: 0,
                    outcome_already_finalized: false,
                },
                server,
            }
        }
        "--results" => Command::Results {
            clear: rest.get(1).map(|s| s.as_str()) == Some("--clear"),
        },
        "--help" | "-h" => {
            print_usage(program);
            std::process::exit(0);
        }
        other => {
            print_usage(program);
            bail!("Unknown argument: {}", other);
        }
    };

    Ok(Args { command, debug })
}

fn print_usage(program: &str) {
    println!("P2Pong Sync - headless peer-to-peer pong match runner");
    println!();
    println!("Usage:");
    println!(
        "  {} --host <match-id> <side-a> <side-b> [--server <url>]   # Play as side A",
        program
    );
    println!(
        "  {} --join <match-id> <side-a> <side-b> [--server <url>]   # Play as side B",
        program
    );
    println!(
        "  {} --results [--clear]                                     # Show stored results",
        program
    );
    println!();
    println!("Add --debug to log to {}", logging::LOG_FILE_PATH);
}

fn play(role: Role, record: MatchRecord, config: &Config) -> Result<()> {
    let identity = match role {
        Role::Host => record.side_a.clone(),
        Role::Guest => record.side_b.clone(),
    };
    let transport = RelayTransport::new(config.session.signaling_server.clone());
    let mut driver = MatchDriver::new(record, &identity, transport, config)?;

    driver.start(Instant::now())?;
    info!("Waiting for opponent via {}", config.session.signaling_server);

    let frame_duration = config.display.frame_duration();
    let mut pointer_y = config.physics.field_height / 2.0;
    let mut last_state = driver.connection_state();
    let mut finished_at: Option<Instant> = None;

    loop {
        let frame_start = Instant::now();

        // Chase the ball, but no faster than a hand would
        let target = driver.state().ball.y;
        pointer_y += (target - pointer_y).clamp(-POINTER_MAX_STEP, POINTER_MAX_STEP);
        driver.pointer_at_field(pointer_y);

        driver.frame(frame_start);

        let state = driver.connection_state();
        if state != last_state {
            match state {
                ConnectionState::Connected => eprintln!("✅ Connected"),
                ConnectionState::Disconnected | ConnectionState::Errored => {
                    eprintln!("⚠️  Link lost ({:?}), retrying...", state)
                }
                _ => {}
            }
            last_state = state;
        }

        if let Some(report) = driver.report() {
            let at = *finished_at.get_or_insert(frame_start);
            if frame_start.duration_since(at) >= FLUSH_DURATION {
                let outcome = driver.outcome();
                eprintln!(
                    "🏁 Final score {}-{} ({})",
                    report.final_score_a,
                    report.final_score_b,
                    if outcome.is_local_win(driver.role()) {
                        "you win"
                    } else {
                        "you lose"
                    }
                );

                let result = GameResult::from_report(driver.record(), report);
                if let Err(e) = ResultStore::open_default().upsert(result) {
                    warn!("Could not save game result: {}", e);
                }
                driver.navigate_away();
                return Ok(());
            }
        }

        limit_frame_rate(frame_start, frame_duration);
    }
}

fn show_results(clear: bool) -> Result<()> {
    let store = ResultStore::open_default();
    if clear {
        store.clear().context("Failed to clear results")?;
        println!("Cleared {}", store.path().display());
        return Ok(());
    }

    let results = store.load();
    if results.is_empty() {
        println!("No stored results");
    }
    for r in results {
        println!(
            "match {}: {} {} - {} {} (winner {})",
            r.match_id, r.side_a, r.score_a, r.score_b, r.side_b, r.winner
        );
    }
    Ok(())
}

/// Sleep away what is left of the frame budget
fn limit_frame_rate(frame_start: Instant, frame_duration: Duration) {
    let elapsed = frame_start.elapsed();
    if elapsed < frame_duration {
        std::thread::sleep(frame_duration - elapsed);
    }
}
