//! # EP-Simulator HTTP API
//!
//! JSON REST API over the assessment registry, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health`, `GET /status`, `GET /metrics`, `GET /export`
//! - `POST /users`, `GET /users`, `GET /users/{id}`, `PUT /users/{id}/status`
//! - `GET /users/{id}/notifications`, `POST /notifications/{id}/read`
//! - `POST /assessments`, `GET /assessments`, `GET /assessments/{id}`
//! - `POST /assessments/{id}/assign`
//! - `POST /assessments/{id}/questions`
//! - `POST /assessments/{id}/questions/{index}/answer`
//! - `POST /assessments/{id}/questions/{index}/score`
//! - `POST /assessments/{id}/recordings`
//! - `POST /assessments/{id}/recordings/{index}/analyze`
//! - `PUT /assessments/{id}/scores`, `PUT /assessments/{id}/feedback`,
//!   `PUT /assessments/{id}/progress`
//! - `POST /assessments/{id}/calculate` (overall from question scores)
//! - `POST /assessments/{id}/{start,submit,complete,archive,cancel}`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `EPSIM_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all (default: localhost only)
//! - `EPSIM_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `EPSIM_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use handlers::error_status;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ActorRequest, AddQuestionRequest, AddRecordingRequest, AnalyzeRequest, AnswerRequest,
    AssessmentJson, AssessmentListResponse, AssessmentQuery, AssessmentResponse, AssignRequest,
    CreateAssessmentRequest, CreateUserRequest, ErrorBody, ExportResponse, FeedbackRequest,
    HealthResponse, NotificationJson, NotificationListResponse, NotificationQuery,
    NotificationResponse, ProgressRequest, QuestionJson, RecordingJson, ScoreQuestionRequest,
    ScoresJson, ScoresRequest, StatusResponse, UserJson, UserListResponse, UserResponse,
    UserStatusRequest,
};

use crate::pipeline::Pipeline;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use epsim_core::{EpsimError, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request bodies above this size are rejected.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<Registry>>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Registry, pipeline: Pipeline) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            pipeline: Arc::new(pipeline),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// CORS from `EPSIM_CORS_ORIGINS`; localhost only when unset.
fn build_cors_layer() -> CorsLayer {
    match std::env::var("EPSIM_CORS_ORIGINS").ok().as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (EPSIM_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => Some(hv),
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: No valid origins in EPSIM_CORS_ORIGINS, using localhost");
                cors_for(localhost_origins())
            } else {
                cors_for(allowed)
            }
        }
        None => cors_for(localhost_origins()),
    }
}

fn localhost_origins() -> Vec<HeaderValue> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect()
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit,
/// rate limiting, authentication.
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED. Set EPSIM_API_KEY to require a bearer token."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/export", get(handlers::export_handler))
        .route(
            "/users",
            post(handlers::create_user_handler).get(handlers::list_users_handler),
        )
        .route("/users/{id}", get(handlers::get_user_handler))
        .route("/users/{id}/status", put(handlers::set_user_status_handler))
        .route(
            "/users/{id}/notifications",
            get(handlers::user_notifications_handler),
        )
        .route("/notifications/{id}/read", post(handlers::mark_read_handler))
        .route(
            "/assessments",
            post(handlers::create_assessment_handler).get(handlers::list_assessments_handler),
        )
        .route("/assessments/{id}", get(handlers::get_assessment_handler))
        .route("/assessments/{id}/assign", post(handlers::assign_handler))
        .route(
            "/assessments/{id}/questions",
            post(handlers::add_question_handler),
        )
        .route(
            "/assessments/{id}/questions/{index}/answer",
            post(handlers::answer_question_handler),
        )
        .route(
            "/assessments/{id}/questions/{index}/score",
            post(handlers::score_question_handler),
        )
        .route(
            "/assessments/{id}/recordings",
            post(handlers::add_recording_handler),
        )
        .route(
            "/assessments/{id}/recordings/{index}/analyze",
            post(handlers::analyze_recording_handler),
        )
        .route("/assessments/{id}/scores", put(handlers::set_scores_handler))
        .route(
            "/assessments/{id}/calculate",
            post(handlers::calculate_scores_handler),
        )
        .route(
            "/assessments/{id}/feedback",
            put(handlers::set_feedback_handler),
        )
        .route(
            "/assessments/{id}/progress",
            put(handlers::set_progress_handler),
        )
        .route("/assessments/{id}/start", post(handlers::start_handler))
        .route("/assessments/{id}/submit", post(handlers::submit_handler))
        .route("/assessments/{id}/complete", post(handlers::complete_handler))
        .route("/assessments/{id}/archive", post(handlers::archive_handler))
        .route("/assessments/{id}/cancel", post(handlers::cancel_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve until Ctrl+C.
///
/// With `snapshot_path` set (file backend), the in-memory registry is
/// written there after shutdown.
pub async fn run_server(
    addr: &str,
    state: AppState,
    snapshot_path: Option<PathBuf>,
) -> Result<(), EpsimError> {
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EpsimError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("EP-Simulator HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EpsimError::IoError(format!("Server error: {}", e)))?;

    if let Some(path) = snapshot_path {
        let registry = state.registry.read().await;
        crate::cli::save_registry(&registry, &path)?;
        tracing::info!("Saved registry snapshot to {}", path.display());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
