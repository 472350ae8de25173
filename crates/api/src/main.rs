mod cache;
mod config;
mod metrics;
mod retry;
mod routes;

use anyhow::{Context, Result};
use extract::{LanguageModel, OllamaClient};
use index::{Embedder, GraphStore, Neo4jStore, OllamaEmbedder};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::cache::{Cache, CachedEmbedder, CachedModel};
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::retry::{RetryPolicy, RetryingModel};
use crate::routes::{router, AppState};

/// `GRAPHRAG_LOG_FORMAT=json` switches to JSON lines; `RUST_LOG` filters.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("GRAPHRAG_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    tracing::info!(mode = ?config.mode, bind = %config.bind, "starting graphrag api");

    let policy = RetryPolicy::from_config(&config.retry);
    let store = policy
        .retry("neo4j_connect", || Neo4jStore::connect(&config.neo4j))
        .await
        .context("Failed to connect to Neo4j")?;
    store.init_schema().await.context("Failed to initialize graph schema")?;
    let store: Arc<dyn GraphStore> = Arc::new(store);

    let ollama = OllamaClient::connect(config.llm.clone())
        .await
        .context("Language model backend is not available")?;
    tracing::info!(model = ollama.model(), "language model ready");

    let cache = Arc::new(Cache::new(config.cache.max_entries));
    let retrying = RetryingModel::new(ollama, policy);
    let (llm, embedder): (Arc<dyn LanguageModel>, Arc<dyn Embedder>) = if config.cache.enabled {
        (
            Arc::new(CachedModel::new(retrying, cache.clone())),
            Arc::new(CachedEmbedder::new(OllamaEmbedder::new(config.embedding.clone()), cache.clone())),
        )
    } else {
        (
            Arc::new(retrying),
            Arc::new(OllamaEmbedder::new(config.embedding.clone())),
        )
    };

    let bind = config.bind.clone();
    let state = Arc::new(AppState {
        config,
        store,
        llm,
        embedder: Some(embedder),
        cache,
        metrics: Arc::new(Metrics::new()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    tracing::info!("Server listening on http://{}", bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
