mod signal;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use peering_protocol::{
    configure, CancellationToken, LogSink, PeerId, RandomCapacity, ReactorConfig, StateReactor,
};
use peering_transport::{StateSocket, TransportConfig};

#[derive(Parser, Debug)]
#[command(
    name = "peering-broker",
    about = "Announce free worker capacity to peer brokers and log theirs",
    override_usage = "peering-broker [OPTIONS] <ME> <YOU>..."
)]
struct Cli {
    /// This broker's name.
    me: String,

    /// Names of the peer brokers.
    #[arg(required = true)]
    peers: Vec<String>,

    /// Heartbeat period in ms: broadcast our state after this much silence.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    period_ms: u64,

    /// Directory holding the `<name>-state.ipc` sockets (overrides PEERING_IPC_DIR).
    #[arg(long)]
    ipc_dir: Option<PathBuf>,

    /// Seed for the simulated capacity, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,

    /// Max frame size in bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    max_frame_size: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let peers = configure(&cli.me, &cli.peers)?;
    tracing::info!("preparing broker at {}...", peers.local());

    let mut config = TransportConfig::new().max_frame_size(cli.max_frame_size);
    if let Some(dir) = cli.ipc_dir {
        config = config.ipc_dir(dir);
    }
    let socket = StateSocket::open(
        peers.local().as_str(),
        peers.iter().map(PeerId::as_str),
        &config,
    )?;

    let metric = match cli.seed {
        Some(seed) => RandomCapacity::seeded(seed),
        None => RandomCapacity::new(),
    };

    let cancel = CancellationToken::new();
    signal::cancel_on_shutdown(cancel.clone());

    let reactor_config = ReactorConfig::new().period(Duration::from_millis(cli.period_ms));
    let stats = StateReactor::new(peers, socket, metric, LogSink, reactor_config)
        .run(cancel)
        .await?;

    eprintln!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
