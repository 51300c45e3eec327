use clap::Parser;
use game::config::GameConfig;
use game::game::Game;
use game::input::Command;
use game::udp_transport::UdpConnector;
use game::utils::get_timestamp;
use log::{info, warn};
use shared::config::{DEFAULT_HOST, DEFAULT_PORT, INITIAL_SPEED_MS, MATCH_DURATION_SECONDS};
use std::io::BufRead;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const SUMMARY_INTERVAL_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Relay port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Name sent to the host when joining
    #[arg(short, long, default_value = "Player")]
    name: String,

    /// Initial movement interval in milliseconds
    #[arg(long, default_value_t = INITIAL_SPEED_MS)]
    tick_interval: u64,

    /// Match length in seconds
    #[arg(long, default_value_t = MATCH_DURATION_SECONDS)]
    match_duration: u64,

    /// Disable client-side prediction of the own snake
    #[arg(long)]
    no_prediction: bool,

    /// Publish and accept per-peer snake updates
    #[arg(long)]
    peer_echo: bool,
}

// The UDP transport drives its own runtime, so main stays synchronous
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = GameConfig {
        host: args.host,
        port: args.port,
        player_name: args.name,
        tick_interval_ms: args.tick_interval,
        match_duration_secs: args.match_duration,
        prediction: !args.no_prediction,
        peer_echo: args.peer_echo,
    };

    info!("Relay at {}:{}", config.host, config.port);
    info!("Commands: start | m | h | l | j<N> | w a s d | p | back | quit");

    let mut game = Game::new(config, Box::new(UdpConnector));

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut last_summary = 0;
    loop {
        let now = get_timestamp();

        while let Ok(line) = line_rx.try_recv() {
            let Some(command) = Command::parse(&line) else {
                if !line.trim().is_empty() {
                    warn!("Unknown command: {}", line.trim());
                }
                continue;
            };

            if command == Command::Quit {
                game.back_to_menu(now)?;
                game.update(now);
                info!("Bye");
                return Ok(());
            }
            if let Err(e) = game.handle_command(command, now) {
                warn!("{}", e);
            }
        }

        game.update(now);

        if now.saturating_sub(last_summary) >= SUMMARY_INTERVAL_MS {
            last_summary = now;
            info!("{}", game.snapshot(now).summary());
        }

        thread::sleep(FRAME_INTERVAL);
    }
}
