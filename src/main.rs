use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod cache;
mod catalog;
mod config;
mod contact;
mod routes;
mod snapshot;
mod upstream;

use aggregate::Aggregator;
use cache::{MemoryCache, ResponseCache};
use config::Config;
use contact::{ContactRelay, ContactSettings};
use routes::{create_router, AppState};
use snapshot::ReturnsSnapshot;
use upstream::UpstreamClient;

#[derive(Parser)]
#[command(name = "salmon-health-server", version, about = "Puget Sound Salmon Health data service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Rebuild the salmon-returns snapshot from the WDFW escapement dataset
    RefreshReturns {
        /// Output path; defaults to RETURNS_SNAPSHOT_PATH
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salmon_health_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::RefreshReturns { out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(&config.returns_snapshot_path));
            let client = UpstreamClient::new(config)?;
            snapshot::refresh::refresh(&client, &out).await?;
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let upstream = Arc::new(UpstreamClient::new(config.clone())?);

    // One cache for the whole process, dropped on shutdown
    let memory = MemoryCache::new(config.cache_ttl());
    tracing::debug!("Response cache TTL {}s", memory.ttl().as_secs());
    let cache: Arc<dyn ResponseCache> = Arc::new(memory);

    let snapshot = match ReturnsSnapshot::load(&config.returns_snapshot_path) {
        Ok(snapshot) => {
            tracing::info!(
                "Loaded {} salmon return records from {}",
                snapshot.record_count,
                config.returns_snapshot_path
            );
            Some(Arc::new(snapshot))
        }
        Err(e) => {
            tracing::warn!(
                "No salmon return snapshot at {} ({}); run `refresh-returns` to build one",
                config.returns_snapshot_path,
                e
            );
            None
        }
    };

    let contact = Arc::new(ContactRelay::new(
        upstream.http().clone(),
        &config.resend_base_url,
    ));

    // Create application state
    let state = AppState {
        cache: cache.clone(),
        upstream,
        aggregator: Arc::new(Aggregator::scrape()),
        contact,
        contact_settings: ContactSettings::from_env,
        snapshot,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Puget Sound Salmon Health server running at http://{}", config.bind_addr);
    tracing::info!("API routes: /api/wdfw /api/usgs /api/barriers /api/scrape");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache.clear().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
