use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use feedrec_api::api::{create_router, AppState};
use feedrec_api::config::Config;
use feedrec_api::db::{create_pool, PgFeatureSource};
use feedrec_api::services::{FeatureStore, ModelRegistry, Recommender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    // The whole snapshot is built before the listener is bound: a failed
    // load means the process exits instead of serving bad state.
    let pool = create_pool(&config.database_url).await?;
    let source = PgFeatureSource::new(pool);
    let store = FeatureStore::load(&source).await?;

    let registry = ModelRegistry::load(Path::new(&config.model_dir), store.schema())?;

    let recommender = Recommender::new(
        Arc::new(store),
        Arc::new(registry),
        config.experiment_salt.clone(),
    );
    let state = AppState::new(Arc::new(recommender));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "Service is up and running");
    axum::serve(listener, app).await?;

    Ok(())
}
