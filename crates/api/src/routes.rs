use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use communities::{CommunityDetection, CommunityDetector, CommunityReporter, ReportSummary};
use extract::{Extractor, LanguageModel, LlmError};
use index::{
    ClearSummary, ConsolidationSummary, DescriptionConsolidator, Embedder, GraphError, GraphStats,
    GraphStore, IngestSummary, Indexer, LabelClearSummary,
};
use query::{GlobalSearch, GlobalSearchResult, LocalSearch, LocalSearchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{Cache, CacheStats};
use crate::config::AppConfig;
use crate::metrics::{Metrics, MetricsSnapshot, Operation, TimedOperation};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn GraphStore>,
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub cache: Arc<Cache>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        for cause in err.chain() {
            if let Some(graph_err) = cause.downcast_ref::<GraphError>() {
                if graph_err.is_unavailable() {
                    return ApiError::Unavailable(message);
                }
                if matches!(graph_err, GraphError::InvalidInput(_)) {
                    return ApiError::BadRequest(message);
                }
            }
            if let Some(LlmError::Unavailable(_)) = cause.downcast_ref::<LlmError>() {
                return ApiError::Unavailable(message);
            }
        }
        ApiError::Internal(message)
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        anyhow::Error::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Batch results carry the id their log lines are tagged with.
#[derive(Serialize)]
pub struct RunResponse<T> {
    pub run_id: String,
    #[serde(flatten)]
    pub result: T,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    llm_model: String,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub path: String,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub books: Vec<String>,
    pub chunks: usize,
    #[serde(flatten)]
    pub summary: IngestSummary,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub response_type: Option<String>,
}

#[derive(Deserialize)]
pub struct ClearRequest {
    pub labels: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ClearResponse {
    All(ClearSummary),
    Labels(LabelClearSummary),
}

#[derive(Serialize)]
struct MetricsResponse {
    metrics: MetricsSnapshot,
    cache: CacheStats,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(ingest))
        .route("/consolidate", post(consolidate))
        .route("/communities", post(detect_communities))
        .route("/reports", post(generate_reports))
        .route("/query/global", post(query_global))
        .route("/query/local", post(query_local))
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .route("/admin/clear", post(admin_clear))
        .with_state(state)
}

/// Time `work`, count it, and tag its logs with a fresh run id.
async fn tracked<T, F>(state: &AppState, operation: Operation, work: F) -> Result<Json<RunResponse<T>>, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let run_id = Uuid::new_v4().to_string();
    let timer = TimedOperation::start();
    let result = work
        .instrument(info_span!("run", operation = operation.name(), run_id = %run_id))
        .await;
    state
        .metrics
        .record_request(operation, timer.elapsed(), result.is_ok());

    match result {
        Ok(result) => Ok(Json(RunResponse { run_id, result })),
        Err(e) => {
            warn!(operation = operation.name(), %run_id, error = %e, "request failed");
            Err(e)
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    state.store.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        llm_model: state.config.llm.model.clone(),
    }))
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<RunResponse<IngestResponse>>, ApiError> {
    tracked(&state, Operation::Ingest, async {
        let path = PathBuf::from(&req.path);
        let chunks = if path.is_file() {
            ingest::ingest_file(&path, &state.config.chunker).await?
        } else if path.is_dir() {
            ingest::ingest_directory(&path, &state.config.chunker).await?
        } else {
            return Err(ApiError::BadRequest(format!("no such file or directory: {}", req.path)));
        };

        let books: BTreeSet<String> = chunks.iter().map(|c| c.book_id.clone()).collect();
        let extractor = Arc::new(Extractor::new(state.llm.clone(), state.config.extractor_config()));
        let indexer = Indexer::new(
            extractor,
            state.store.clone(),
            state.config.concurrency.max_concurrent_extractions,
        );
        let summary = indexer.index_chunks(&chunks).await?;
        state
            .metrics
            .record_ingest(summary.chunks_succeeded, summary.chunks_failed, summary.entities);

        Ok::<_, ApiError>(IngestResponse {
            books: books.into_iter().collect(),
            chunks: chunks.len(),
            summary,
        })
    })
    .await
}

async fn consolidate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunResponse<ConsolidationSummary>>, ApiError> {
    tracked(&state, Operation::Consolidate, async {
        let consolidator = DescriptionConsolidator::new(
            state.llm.clone(),
            state.store.clone(),
            state.config.consolidation_config(),
        );
        Ok::<_, ApiError>(consolidator.run().await?)
    })
    .await
}

async fn detect_communities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunResponse<CommunityDetection>>, ApiError> {
    tracked(&state, Operation::Communities, async {
        Ok::<_, ApiError>(CommunityDetector::new(state.store.clone()).run().await?)
    })
    .await
}

async fn generate_reports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunResponse<ReportSummary>>, ApiError> {
    tracked(&state, Operation::Reports, async {
        let reporter = CommunityReporter::new(
            state.llm.clone(),
            state.store.clone(),
            state.config.report_config(),
        );
        let summary = reporter.run().await?;
        state.metrics.record_reports(summary.parsed + summary.fallback);
        Ok::<_, ApiError>(summary)
    })
    .await
}

fn validate_question(req: &QueryRequest) -> Result<(), ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }
    Ok(())
}

async fn query_global(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RunResponse<GlobalSearchResult>>, ApiError> {
    tracked(&state, Operation::GlobalQuery, async {
        validate_question(&req)?;
        let search = GlobalSearch::new(
            state.llm.clone(),
            state.store.clone(),
            state.config.global_search_config(req.response_type.clone()),
        );
        Ok::<_, ApiError>(search.search(req.question.trim()).await?)
    })
    .await
}

async fn query_local(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RunResponse<LocalSearchResult>>, ApiError> {
    tracked(&state, Operation::LocalQuery, async {
        validate_question(&req)?;
        let mut search = LocalSearch::new(
            state.llm.clone(),
            state.store.clone(),
            state.config.local_search_config(req.response_type.clone()),
        );
        if let Some(embedder) = &state.embedder {
            search = search.with_embedder(embedder.clone());
        }
        Ok::<_, ApiError>(search.search(req.question.trim()).await?)
    })
    .await
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<GraphStats>, ApiError> {
    Ok(Json(state.store.stats().await?))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        metrics: state.metrics.snapshot(),
        cache: state.cache.stats(),
    })
}

/// `{}` clears the whole graph, schema included; `{"labels": [...]}` only
/// those labels.
async fn admin_clear(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClearRequest>,
) -> Result<Json<RunResponse<ClearResponse>>, ApiError> {
    tracked(&state, Operation::Admin, async {
        let response = match req.labels {
            Some(labels) if !labels.is_empty() => {
                ClearResponse::Labels(state.store.clear_labels(&labels).await?)
            }
            _ => ClearResponse::All(state.store.clear_all().await?),
        };
        state.cache.clear();
        Ok::<_, ApiError>(response)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use extract::testing::ScriptedModel;
    use index::MemoryGraphStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state_with(store: Arc<MemoryGraphStore>, llm: ScriptedModel) -> Arc<AppState> {
        Arc::new(AppState {
            config: AppConfig::default(),
            store,
            llm: Arc::new(llm),
            embedder: None,
            cache: Arc::new(Cache::new(100)),
            metrics: Arc::new(Metrics::new()),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_unavailable_store() {
        let store = Arc::new(MemoryGraphStore::new());
        let state = state_with(store.clone(), ScriptedModel::new());

        let (status, _) = send(router(state.clone()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        store.set_available(false);
        let (status, body) = send(router(state), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn pipeline_endpoints_chain() {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_relationship("APPLE", "STEVE JOBS", "Jobs founded Apple");
        let llm = ScriptedModel::new()
            .on("---Analyst Reports---", "Jobs founded Apple [Data: Reports (0)].")
            .on("-----Reports-----", r#"{"points": [{"description": "Jobs founded Apple", "score": 80}]}"#)
            .with_default(r#"{"title": "Apple", "summary": "Apple and its founder", "rating": 7}"#);
        let state = state_with(store, llm);

        let (status, body) = send(router(state.clone()), "POST", "/communities", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["community_count"], 1);
        assert!(body["run_id"].as_str().is_some());

        let (status, body) = send(router(state.clone()), "POST", "/reports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parsed"], 1);

        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/query/global",
            Some(json!({"question": "Who founded Apple?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Jobs founded Apple [Data: Reports (0)].");

        let (_, body) = send(router(state), "GET", "/metrics", None).await;
        assert_eq!(body["metrics"]["total_requests"], 3);
        assert_eq!(body["metrics"]["reports_generated"], 1);
    }

    #[tokio::test]
    async fn store_outage_mid_run_is_service_unavailable() {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_relationship("APPLE", "STEVE JOBS", "Jobs founded Apple");
        let state = state_with(store.clone(), ScriptedModel::new());

        store.set_available(false);
        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/query/global",
            Some(json!({"question": "Who founded Apple?"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().is_some());

        let (status, _) = send(router(state), "POST", "/consolidate", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn empty_question_is_bad_request() {
        let state = state_with(Arc::new(MemoryGraphStore::new()), ScriptedModel::new());
        let (status, _) = send(router(state), "POST", "/query/global", Some(json!({"question": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_ingest_path_is_bad_request() {
        let state = state_with(Arc::new(MemoryGraphStore::new()), ScriptedModel::new());
        let (status, _) = send(
            router(state),
            "POST",
            "/ingest",
            Some(json!({"path": "/definitely/not/here.txt"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn clear_by_label_validates_labels() {
        let store = Arc::new(MemoryGraphStore::new());
        store.add_entity("APPLE", "ORGANIZATION", "A company");
        let state = state_with(store, ScriptedModel::new());

        let (status, _) = send(
            router(state.clone()),
            "POST",
            "/admin/clear",
            Some(json!({"labels": ["Entity) DETACH DELETE n //"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            router(state.clone()),
            "POST",
            "/admin/clear",
            Some(json!({"labels": ["Entity"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nodes_deleted"], 1);

        let (_, stats) = send(router(state), "GET", "/stats", None).await;
        assert_eq!(stats["entities"], 0);
    }
}
