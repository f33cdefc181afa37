use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Ticks between snapshots sent to each client
    #[arg(short, long, default_value = "1")]
    snapshot_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Base seed for room randomness
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate.max(1) as f64),
        snapshot_interval: args.snapshot_rate.max(1),
        max_clients: args.max_clients,
        seed: args.seed,
    };

    info!(
        "Starting server at {}Hz, snapshot every {} ticks",
        args.tick_rate, config.snapshot_interval
    );
    if let Some(seed) = config.seed {
        info!("Using base seed {}", seed);
    }

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    server.run().await?;

    Ok(())
}
