// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! - `GET  /health`
//! - `POST /api/search`
//! - `POST /api/workflow/run`
//! - `GET  /api/playbooks/{namespace}`

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use playbook_cortex::application::{LoopMode, LoopOutcome, SearchError, SearchQuery, SearchResult, TaskRecord};
use playbook_cortex::domain::{Playbook, PlaybookRepository, RepositoryError};
use playbook_cortex::infrastructure::playbook_store::validate_namespace;

use crate::bootstrap::Cortex;

#[derive(Clone)]
pub struct AppState {
    pub cortex: Arc<Cortex>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(cortex: Cortex) -> Self {
        Self {
            cortex: Arc::new(cortex),
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub namespace: String,
    pub query: String,
    pub top_k: Option<usize>,
    pub sections: Option<Vec<String>>,
    pub min_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub namespace: String,
    pub query: String,
    pub ground_truth: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: LoopMode,
}

fn default_mode() -> LoopMode {
    LoopMode::Full
}

pub enum ApiError {
    BadRequest(String),
    Internal(String),
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidNamespace(_) => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/search", post(search_handler))
        .route("/api/workflow/run", post(run_handler))
        .route("/api/playbooks/{namespace}", get(playbook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve the API until Ctrl+C or SIGTERM.
pub async fn serve(cortex: Cortex, addr: SocketAddr) -> Result<()> {
    if let Some(metrics) = cortex.config.spec.observability.as_ref().and_then(|o| o.metrics.as_ref()) {
        if metrics.enabled {
            let metrics_addr = SocketAddr::new(addr.ip(), metrics.port);
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .with_http_listener(metrics_addr)
                .install()
                .context("Failed to install Prometheus exporter")?;
            info!("Metrics exporter listening on {}", metrics_addr);
        }
    }

    let app = router(AppState::new(cortex));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Playbook API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Playbook API shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResult>>, ApiError> {
    validate_namespace(&request.namespace)?;
    let defaults = &state.cortex.config.spec.search;

    let mut query = SearchQuery::new(request.query)
        .with_top_k(request.top_k.unwrap_or(defaults.top_k))
        .with_min_confidence(request.min_confidence.unwrap_or(defaults.min_confidence));
    if let Some(sections) = request.sections {
        query = query.with_sections(sections);
    }

    let playbook = state.cortex.repository.load(&request.namespace).await?;
    let results = state.cortex.search.search(&query, &playbook).await?;
    Ok(Json(results))
}

async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<LoopOutcome>, ApiError> {
    validate_namespace(&request.namespace)?;
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let task = TaskRecord::new(request.query, request.ground_truth.as_deref());
    let outcome = state
        .cortex
        .feedback_loop
        .run(&task, &request.namespace, request.mode)
        .await;
    Ok(Json(outcome))
}

async fn playbook_handler(
    State(state): State<Arc<AppState>>,
    Path(namespace): Path<String>,
) -> Result<Json<Playbook>, ApiError> {
    validate_namespace(&namespace)?;
    let playbook = state.cortex.repository.load(&namespace).await?;
    Ok(Json(playbook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Engines;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use playbook_cortex::domain::config::CortexConfigManifest;
    use playbook_cortex::domain::{
        AnswerGenerator, Bullet, DeltaOperation, FeedbackTag, GeneratedAnswer, Insight, InsightRequest,
        JudgmentEngine, JudgmentError, SectionDefinition, StaticSectionCatalog, Trajectory, UsageFeedback,
    };
    use playbook_cortex::infrastructure::{HashingEmbeddingClient, InMemoryPlaybookRepository};

    struct EchoAnswer;

    #[async_trait]
    impl AnswerGenerator for EchoAnswer {
        async fn generate(
            &self,
            _query: &str,
            _context: &[Bullet],
            _namespace: &str,
        ) -> Result<GeneratedAnswer, JudgmentError> {
            Ok(GeneratedAnswer {
                answer: "Paris".to_string(),
                reasoning_steps: vec![],
            })
        }
    }

    struct OneLesson;

    #[async_trait]
    impl JudgmentEngine for OneLesson {
        async fn extract_insights(&self, _request: &InsightRequest<'_>) -> Result<Vec<Insight>, JudgmentError> {
            Ok(vec![Insight::new("Name the capital directly")])
        }

        async fn propose_deltas(
            &self,
            insights: &[Insight],
            _bullets: &[Bullet],
            _sections: &[SectionDefinition],
            _namespace: &str,
        ) -> Result<Vec<DeltaOperation>, JudgmentError> {
            Ok(insights
                .iter()
                .map(|i| DeltaOperation::add("strategies", i.key_insight.clone()))
                .collect())
        }

        async fn evaluate_bullet_usage(
            &self,
            _trajectory: &Trajectory,
            _ground_truth: Option<&str>,
            bullet: &Bullet,
        ) -> Result<UsageFeedback, JudgmentError> {
            Ok(UsageFeedback::new(bullet.id.clone(), FeedbackTag::Helpful, "fine"))
        }
    }

    async fn test_app() -> (Router, Arc<InMemoryPlaybookRepository>) {
        let repository = Arc::new(InMemoryPlaybookRepository::new());
        let mut playbook = Playbook::new();
        playbook.push(Bullet::new("strategies", "Capitals of European countries are well known"));
        playbook.push(Bullet::new("pitfalls", "Do not confuse rivers with cities"));
        repository.seed("geo", playbook).await;

        let judge = Arc::new(OneLesson);
        let engines = Engines {
            repository: repository.clone(),
            embedder: Arc::new(HashingEmbeddingClient::new(64)),
            judgment: judge,
            answerer: Arc::new(EchoAnswer),
            sections: Arc::new(StaticSectionCatalog::default()),
        };
        let cortex = Cortex::assemble(CortexConfigManifest::default(), engines).unwrap();
        (router(AppState::new(cortex)), repository)
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_search_with_section_filter() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(post_json(
                "/api/search",
                serde_json::json!({"namespace": "geo", "query": "capital city", "sections": ["pitfalls"]}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        let results = body.as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["bullet"]["section"], "pitfalls");
    }

    #[tokio::test]
    async fn test_search_rejects_invalid_namespace() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(post_json(
                "/api/search",
                serde_json::json!({"namespace": "../etc", "query": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].as_str().unwrap().contains("../etc"));
    }

    #[tokio::test]
    async fn test_workflow_run_full_adds_bullet() {
        let (app, repository) = test_app().await;
        let resp = app
            .oneshot(post_json(
                "/api/workflow/run",
                serde_json::json!({"namespace": "geo", "query": "Capital of France?", "ground_truth": "Paris"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["infer"]["is_correct"], true);
        assert_eq!(body["curation"]["summary"]["added"], 1);

        let playbook = repository.load("geo").await.unwrap();
        assert_eq!(playbook.len(), 3);
        assert!(playbook.bullets.iter().any(|b| b.content == "Name the capital directly"));
    }

    #[tokio::test]
    async fn test_workflow_run_infer_mode_leaves_playbook() {
        let (app, repository) = test_app().await;
        let resp = app
            .oneshot(post_json(
                "/api/workflow/run",
                serde_json::json!({"namespace": "geo", "query": "Capital of Spain?", "ground_truth": "Madrid", "mode": "infer"}),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["infer"]["is_correct"], false);
        assert!(body.get("curation").is_none());
        assert_eq!(repository.load("geo").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_playbook() {
        let (app, _) = test_app().await;
        let resp = app
            .oneshot(Request::builder().uri("/api/playbooks/geo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["bullets"].as_array().unwrap().len(), 2);
    }
}
