use clap::Parser;
use telemetry_bridge::{
    TelemetrySnapshot,
    actors::{ingest::IngestHandle, relay::RelayHandle},
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, read_config_file},
    mirror::MirrorSink,
    monitors::SystemProbe,
    relay::RelayPublisher,
    store::SnapshotStore,
    users::UserDirectory,
};
use tokio::sync::watch;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); defaults apply when omitted
    #[arg(short, long)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("telemetry_bridge", LevelFilter::DEBUG),
        ("tower_http", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    dotenv::dotenv().ok();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file(file)?,
        None => Config::default(),
    };
    let config = config.apply_env(|key| std::env::var(key).ok());

    let users = UserDirectory::load(config.users_file.clone()).await;
    let store = SnapshotStore::new();
    let (snapshot_tx, snapshot_rx) = watch::channel(TelemetrySnapshot::default());

    let publisher = RelayPublisher::new(&config.relay)?;
    match publisher.destination() {
        Some(destination) => {
            // startup probe; does not count against the rate limit
            match publisher.push(&store.read().await).await {
                Ok(()) => info!("relay probe OK ({destination})"),
                Err(e) => warn!("relay probe FAILED ({destination}): {e:#}"),
            }
        }
        None => info!("relay disabled (no gist id or token)"),
    }
    let relay = RelayHandle::spawn(publisher, snapshot_rx);

    let mirror = config
        .mirror
        .enabled
        .then(|| MirrorSink::new(config.mirror.path.clone()));
    let ingest = IngestHandle::spawn(
        config.ingest.clone(),
        store.clone(),
        Box::new(SystemProbe::new()),
        mirror,
        snapshot_tx,
    );

    let api_config = ApiConfig::from(config.api.clone());
    let addr = spawn_api_server(api_config, ApiState::new(store, users)).await?;

    info!(
        "bridge running: http://{addr}/api/telemetry (watching {})",
        config.ingest.telem_file.display()
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    if let Err(e) = ingest.shutdown().await {
        error!("failed to stop ingest actor: {e:#}");
    }
    match relay.stats().await {
        Ok(stats) => info!("relay stats: {stats:?}"),
        Err(e) => warn!("relay stats unavailable: {e:#}"),
    }
    if let Err(e) = relay.shutdown().await {
        error!("failed to stop relay actor: {e:#}");
    }

    Ok(())
}
