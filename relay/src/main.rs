use clap::Parser;
use log::info;
use relay::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = shared::config::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::config::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of peers across all sessions
    #[arg(short, long, default_value = "64")]
    max_peers: usize,

    /// Seconds of silence before a peer is dropped
    #[arg(short, long, default_value = "10")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting relay on {}", address);
    info!("Max peers: {}", args.max_peers);

    let mut server = Server::new(
        &address,
        args.max_peers,
        Duration::from_secs(args.timeout_secs),
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
