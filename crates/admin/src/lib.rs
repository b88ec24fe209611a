//! Admin API for the backup retention service.
//!
//! Provides endpoints for:
//! - Health and Prometheus metrics
//! - Reading the default retention policy
//! - Triggering a retention run (or a dry run)

use axum::{
    body::Bytes,
    extract::{MatchedPath, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use retention_core::{
    types::{
        DeletionCandidate, DeletionError, PolicyField, PolicyOverride, RetentionPlan,
        RetentionPolicy, RetentionResult,
    },
    Error, Result,
};
use retention_engine::{deadline_token, render, render_plan, RetentionEngine, RunScheduler};
use retention_governance::{track_request, RbacConnector};

/// Admin API state.
pub struct AdminState {
    pub engine: Arc<RetentionEngine>,
    pub scheduler: Arc<RunScheduler>,
    /// Single-flight lane key for the engine's target.
    pub lane: String,
    pub default_policy: RetentionPolicy,
    pub rbac: Arc<dyn RbacConnector>,
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
    pub run_timeout: Option<Duration>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for the run endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    pub dry_run: Option<bool>,
}

/// Response for the run endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub run_id: String,
    pub dry_run: bool,
    pub kept_count: usize,
    pub deleted_count: usize,
    pub space_saved_bytes: u64,
    pub total_size_before_bytes: u64,
    pub total_size_after_bytes: u64,
    pub errors: Vec<DeletionError>,
    pub deleted_keys: Vec<String>,
    pub skipped_keys: Vec<String>,
    /// Deletion candidates with reasons, for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<DeletionCandidate>>,
    pub policy: RetentionPolicy,
    pub report: String,
}

impl RunResponse {
    fn from_result(run_id: String, policy: RetentionPolicy, result: RetentionResult) -> Self {
        let report = render(&result);
        Self {
            run_id,
            dry_run: false,
            kept_count: result.kept.len(),
            deleted_count: result.deleted.len(),
            space_saved_bytes: result.space_saved_bytes(),
            total_size_before_bytes: result.total_size_before,
            total_size_after_bytes: result.total_size_after,
            errors: result.errors,
            deleted_keys: result.deleted,
            skipped_keys: result.skipped,
            candidates: None,
            policy,
            report,
        }
    }

    /// Sizes describe the projected outcome; nothing is deleted.
    fn from_plan(run_id: String, policy: RetentionPolicy, plan: RetentionPlan) -> Self {
        let report = render_plan(&plan);
        Self {
            run_id,
            dry_run: true,
            kept_count: plan.kept.len(),
            deleted_count: 0,
            space_saved_bytes: plan.space_to_reclaim(),
            total_size_before_bytes: plan.total_size_before,
            total_size_after_bytes: plan.total_size_after,
            errors: Vec::new(),
            deleted_keys: Vec::new(),
            skipped_keys: Vec::new(),
            candidates: Some(plan.to_delete),
            policy,
            report,
        }
    }
}

/// Response for the policy endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    pub policy: RetentionPolicy,
    pub fields: Vec<PolicyField>,
    pub prefix: String,
    pub catalog: String,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

/// Maps engine errors onto HTTP responses.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidPolicy(_) | Error::Serialization(_) => StatusCode::BAD_REQUEST,
            Error::RunInProgress(_) => StatusCode::CONFLICT,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Listing(_) => StatusCode::BAD_GATEWAY,
            Error::Configuration(_)
            | Error::Deletion { .. }
            | Error::Internal(_)
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Authentication middleware.
async fn auth_middleware(
    State(state): State<Arc<AdminState>>,
    req: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match auth_header {
        Some(token) => match state.rbac.validate(token).await {
            Ok(roles) if roles.is_admin => Ok(next.run(req).await),
            Ok(_) => Err(StatusCode::FORBIDDEN),
            Err(_) => Err(StatusCode::UNAUTHORIZED),
        },
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Record request count and latency.
async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let started = Instant::now();

    let response = next.run(req).await;
    track_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint (public).
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics (public).
async fn get_metrics(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Describe the default policy. Performs no storage calls.
async fn get_policy(State(state): State<Arc<AdminState>>) -> Json<PolicyResponse> {
    Json(PolicyResponse {
        policy: state.default_policy,
        fields: state.default_policy.describe(),
        prefix: state.engine.prefix().to_string(),
        catalog: state.engine.catalog_name().to_string(),
    })
}

/// Run retention with optional policy overrides in the JSON body.
async fn run_retention(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<RunQuery>,
    body: Bytes,
) -> std::result::Result<Json<RunResponse>, ApiError> {
    let run_id = Uuid::new_v4().to_string();
    let overrides = PolicyOverride::from_json_slice(&body)?;
    let policy = state.default_policy.merged(&overrides);
    policy.validate()?;
    let dry_run = query.dry_run.unwrap_or(false);

    tracing::info!(
        run_id = %run_id,
        lane = %state.lane,
        dry_run,
        overridden = !overrides.is_empty(),
        "Retention run requested"
    );

    if dry_run {
        let plan = state
            .scheduler
            .try_run(&state.lane, || state.engine.plan(&policy))
            .await?;
        return Ok(Json(RunResponse::from_plan(run_id, policy, plan)));
    }

    let result = execute_run(&state, &policy).await?;
    if result.has_errors() {
        tracing::warn!(run_id = %run_id, failed = result.errors.len(), "Retention run completed with failures");
    }
    Ok(Json(RunResponse::from_result(run_id, policy, result)))
}

async fn execute_run(state: &AdminState, policy: &RetentionPolicy) -> Result<RetentionResult> {
    let (cancel, timer) = deadline_token(state.run_timeout);
    let result = state
        .scheduler
        .try_run(&state.lane, || state.engine.run(policy, &cancel))
        .await;
    if let Some(timer) = timer {
        timer.abort();
    }
    result
}

/// Create the admin router.
pub fn admin_router(state: Arc<AdminState>) -> Router {
    let protected = Router::new()
        .route("/v1/retention/policy", get(get_policy))
        .route("/v1/retention/run", post(run_retention))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .merge(protected)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router until Ctrl-C or SIGTERM.
pub async fn serve(host: &str, port: u16, state: Arc<AdminState>) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::configuration(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "Retention admin server starting");

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

    tracing::info!("Retention admin server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
