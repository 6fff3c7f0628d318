//! # Civic-Pulse Binary
//!
//! The entry point that assembles the engine: config, tracing, the SQLite
//! store, the four engine services, and the HTTP surface.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cp_api::{AppState, Metrics};
use cp_core::config::EngineConfig;
use cp_core::traits::{EngineStore, Notifier};
use cp_db_sqlite::SqliteEngineStore;
use cp_engine::{
    AggregateCache, AnomalyDetector, ModerationWorkflow, TracingNotifier, TrustScoreLedger,
    VoteAggregationEngine, VotingService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = EngineConfig::load()?;

    // 1. Storage adapter
    let store: Arc<dyn EngineStore> =
        Arc::new(SqliteEngineStore::connect(&config.http.database_url).await?);

    // 2. Engine services, ledger first
    let ledger = Arc::new(TrustScoreLedger::new(store.clone(), config.trust.clone()));
    let aggregator = Arc::new(VoteAggregationEngine::new(
        store.clone(),
        config.weights.clone(),
    ));
    let cache = Arc::new(AggregateCache::new(aggregator));
    let voting = Arc::new(VotingService::new(
        store.clone(),
        config.weights.clone(),
        cache.clone(),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let anomalies = Arc::new(AnomalyDetector::new(
        store.clone(),
        cache.clone(),
        notifier.clone(),
    ));
    let moderation = Arc::new(ModerationWorkflow::new(
        store.clone(),
        ledger.clone(),
        notifier,
        &config,
    ));

    // 3. Background aggregate refresh
    tokio::spawn(
        cache
            .clone()
            .run_refresh_loop(Duration::from_secs(config.cache_refresh_secs)),
    );

    // 4. HTTP surface
    let state = AppState {
        store,
        ledger,
        voting,
        cache,
        anomalies,
        moderation,
        metrics: Arc::new(Metrics::new()),
    };
    let app = cp_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.http.bind_addr).await?;
    info!(addr = %config.http.bind_addr, "civic-pulse engine listening");
    axum::serve(listener, app).await?;
    Ok(())
}
