use std::net::SocketAddr;

use clap::Parser;
use game_server_exporter::{
    api::{self, ApiState},
    cache::StateCache,
    config::{Settings, load_targets},
    metrics::Metrics,
    query::HttpBridgeProvider,
    scrape::Scraper,
};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Path to the Prometheus file-SD targets file (overrides TARGETS_JSON_FILE)
    #[arg(short, long)]
    targets_file: Option<String>,

    /// Listening port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("game_server_exporter", LevelFilter::TRACE),
        ("exporter", LevelFilter::TRACE),
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
    dotenv::dotenv().ok();
    init();

    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut settings = Settings::from_env();
    if let Some(targets_file) = args.targets_file {
        settings.targets_file = targets_file;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }

    // Load once at startup purely to tell the operator what is configured;
    // every scrape re-reads the file.
    let initial = load_targets(&settings.targets_file);
    info!(
        "game server exporter starting, {} target(s) in {}",
        initial.len(),
        settings.targets_file
    );
    for target in &initial {
        info!(
            "  * {} ({}) - {}:{}",
            target.name, target.game_type, target.host, target.port
        );
    }
    info!(
        "suggested scrape interval: {}ms (cycles run on inbound /metrics requests)",
        settings.scrape_interval_ms
    );

    let metrics = Metrics::new()?;
    let cache = StateCache::new();
    let provider = Arc::new(HttpBridgeProvider::from_env());
    let scraper = Scraper::new(provider, Arc::clone(&cache), Arc::clone(&metrics));

    let state = ApiState::new(scraper, cache, metrics, settings.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    api::serve(addr, state).await
}
