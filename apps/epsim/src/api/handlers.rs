//! # API Endpoint Handlers
//!
//! Every handler maps `EpsimError` onto a status code with
//! `error_status` and answers `{ "success": false, "error": ... }`.

use super::{
    AppState,
    types::{
        ActorRequest, AddQuestionRequest, AddRecordingRequest, AnalyzeRequest, AnswerRequest,
        AssessmentListResponse, AssessmentQuery, AssessmentResponse, AssignRequest,
        CreateAssessmentRequest, CreateUserRequest, ErrorBody, ExportResponse, FeedbackRequest,
        HealthResponse, NotificationListResponse, NotificationQuery, NotificationResponse,
        ProgressRequest, ScoreQuestionRequest, ScoresRequest, StatusResponse, UserListResponse,
        UserResponse, UserStatusRequest,
    },
};
use crate::clock;
use crate::pipeline::AnalysisJob;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use epsim_core::{
    AssessmentFilter, AssessmentId, EpsimError, LifecycleAction, NotificationId, Score, UserId,
    snapshot_digest, snapshot_to_bytes,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for a core error.
pub fn error_status(error: &EpsimError) -> StatusCode {
    match error {
        EpsimError::UserNotFound(_)
        | EpsimError::AssessmentNotFound(_)
        | EpsimError::NotificationNotFound(_)
        | EpsimError::QuestionNotFound { .. }
        | EpsimError::RecordingNotFound { .. } => StatusCode::NOT_FOUND,
        EpsimError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EpsimError::DuplicateEmail(_) => StatusCode::CONFLICT,
        EpsimError::PermissionDenied { .. } | EpsimError::NotParticipant { .. } => {
            StatusCode::FORBIDDEN
        }
        EpsimError::ScoreOutOfRange(_) | EpsimError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EpsimError::SerializationError(_)
        | EpsimError::DeserializationError(_)
        | EpsimError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond<R: ErrorBody>(ok: StatusCode, result: Result<R, EpsimError>) -> (StatusCode, Json<R>) {
    match result {
        Ok(body) => (ok, Json(body)),
        Err(e) => {
            let status = error_status(&e);
            if status.is_server_error() {
                tracing::error!(event = "request_failed", "{}", e);
            } else {
                tracing::debug!(event = "request_rejected", status = status.as_u16(), "{}", e);
            }
            (status, Json(R::error(e.to_string())))
        }
    }
}

// =============================================================================
// HEALTH / STATUS / METRICS
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Record counts per kind and per status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.read().await;
    let persistent = registry.is_persistent();
    respond(
        StatusCode::OK,
        registry
            .stats()
            .map(|stats| StatusResponse::from_stats(&stats, persistent)),
    )
}

/// Prometheus text exposition of the registry counts.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = match state.registry.read().await.stats() {
        Ok(stats) => stats,
        Err(e) => return respond::<StatusResponse>(StatusCode::OK, Err(e)).into_response(),
    };

    let mut body = String::new();
    for (name, help, value) in [
        ("epsim_users", "Registered users", stats.users),
        ("epsim_assessments", "Stored assessments", stats.assessments),
        ("epsim_notifications", "Stored notifications", stats.notifications),
        (
            "epsim_unread_notifications",
            "Notifications not yet read",
            stats.unread_notifications,
        ),
    ] {
        body.push_str(&format!(
            "# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n"
        ));
    }
    body.push_str("# HELP epsim_assessments_by_status Assessments per status\n");
    body.push_str("# TYPE epsim_assessments_by_status gauge\n");
    for (status, count) in &stats.by_status {
        body.push_str(&format!(
            "epsim_assessments_by_status{{status=\"{}\"}} {}\n",
            status.as_str(),
            count
        ));
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// Export every record as a base64 snapshot with its digest.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let result = state
        .registry
        .read()
        .await
        .snapshot()
        .and_then(|s| snapshot_to_bytes(&s))
        .map(|bytes| ExportResponse::success(&bytes, snapshot_digest(&bytes)));
    respond(StatusCode::OK, result)
}

// =============================================================================
// USERS
// =============================================================================

pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .create_user(request.to_new_user(), clock::now())
        .map(|u| {
            tracing::info!(event = "user_created", user = %u.id, role = %u.role);
            UserResponse::success(&u)
        });
    respond(StatusCode::CREATED, result)
}

pub async fn list_users_handler(State(state): State<AppState>) -> impl IntoResponse {
    let result = state
        .registry
        .read()
        .await
        .users()
        .map(|users| UserListResponse::success(&users));
    respond(StatusCode::OK, result)
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let result = state
        .registry
        .read()
        .await
        .user(UserId(id))
        .map(|u| UserResponse::success(&u));
    respond(StatusCode::OK, result)
}

pub async fn set_user_status_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<UserStatusRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .set_user_status(
            UserId(request.actor_id),
            UserId(id),
            request.status,
            clock::now(),
        )
        .map(|u| UserResponse::success(&u));
    respond(StatusCode::OK, result)
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

pub async fn user_notifications_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<NotificationQuery>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    let user = UserId(id);
    let result = registry
        .notifications_for(user, query.limit, query.unread_only)
        .and_then(|list| {
            let unread = registry.unread_count(user)?;
            Ok(NotificationListResponse::success(&list, unread))
        });
    respond(StatusCode::OK, result)
}

pub async fn mark_read_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .mark_read(UserId(request.actor_id), NotificationId(id), clock::now())
        .map(|n| NotificationResponse::success(&n));
    respond(StatusCode::OK, result)
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

pub async fn create_assessment_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateAssessmentRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .create_assessment(
            UserId(request.actor_id),
            request.to_new_assessment(),
            clock::now(),
        )
        .map(|a| {
            tracing::info!(
                event = "assessment_created",
                assessment = %a.id,
                creator = %a.created_by
            );
            AssessmentResponse::success(&a)
        });
    respond(StatusCode::CREATED, result)
}

pub async fn list_assessments_handler(
    State(state): State<AppState>,
    Query(query): Query<AssessmentQuery>,
) -> impl IntoResponse {
    let filter = AssessmentFilter {
        status: query.status,
        created_by: query.created_by.map(UserId),
        assigned_to: query.assigned_to.map(UserId),
        test_type: query.test_type,
    };
    let result = state
        .registry
        .read()
        .await
        .assessments(&filter)
        .map(|list| AssessmentListResponse::success(&list));
    respond(StatusCode::OK, result)
}

pub async fn get_assessment_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    let result = state
        .registry
        .read()
        .await
        .assessment(AssessmentId(id))
        .map(|a| AssessmentResponse::success(&a));
    respond(StatusCode::OK, result)
}

pub async fn assign_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AssignRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .assign(
            UserId(request.actor_id),
            AssessmentId(id),
            UserId(request.assignee_id),
            clock::now(),
        )
        .map(|a| AssessmentResponse::success(&a));
    respond(StatusCode::OK, result)
}

pub async fn add_question_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AddQuestionRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .add_question(
            UserId(request.actor_id),
            AssessmentId(id),
            request.to_new_question(),
            clock::now(),
        )
        .map(|(a, index)| AssessmentResponse::with_index(&a, index));
    respond(StatusCode::CREATED, result)
}

pub async fn answer_question_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
    Json(request): Json<AnswerRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .answer_question(
            UserId(request.actor_id),
            AssessmentId(id),
            index,
            request.answer,
            clock::now(),
        )
        .map(|a| AssessmentResponse::success(&a));
    respond(StatusCode::OK, result)
}

pub async fn score_question_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
    Json(request): Json<ScoreQuestionRequest>,
) -> impl IntoResponse {
    let result = match Score::from_tenths(request.score_tenths) {
        Ok(score) => state.registry.write().await.score_question(
            UserId(request.actor_id),
            AssessmentId(id),
            index,
            score,
            request.feedback,
            clock::now(),
        ),
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result.map(|a| AssessmentResponse::success(&a)))
}

pub async fn add_recording_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<AddRecordingRequest>,
) -> impl IntoResponse {
    let result = match request.to_new_recording() {
        Ok(recording) => state.registry.write().await.add_recording(
            UserId(request.actor_id),
            AssessmentId(id),
            recording,
            clock::now(),
        ),
        Err(e) => Err(e),
    };
    respond(
        StatusCode::CREATED,
        result.map(|(a, index)| AssessmentResponse::with_index(&a, index)),
    )
}

pub async fn set_scores_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ScoresRequest>,
) -> impl IntoResponse {
    let result = match request.to_sheet() {
        Ok(sheet) => state.registry.write().await.set_scores(
            UserId(request.actor_id),
            AssessmentId(id),
            &sheet,
            clock::now(),
        ),
        Err(e) => Err(e),
    };
    respond(StatusCode::OK, result.map(|a| AssessmentResponse::success(&a)))
}

/// Replace overall score and level with the mean of the scored questions.
pub async fn calculate_scores_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    let result = state.registry.write().await.calculate_question_scores(
        UserId(request.actor_id),
        AssessmentId(id),
        clock::now(),
    );
    respond(StatusCode::OK, result.map(|a| AssessmentResponse::success(&a)))
}

pub async fn set_feedback_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<FeedbackRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .set_feedback(
            UserId(request.actor_id),
            AssessmentId(id),
            request.notes,
            clock::now(),
        )
        .map(|a| AssessmentResponse::success(&a));
    respond(StatusCode::OK, result)
}

pub async fn set_progress_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ProgressRequest>,
) -> impl IntoResponse {
    let mut registry = state.registry.write().await;
    let result = registry
        .set_progress(
            UserId(request.actor_id),
            AssessmentId(id),
            request.progress,
            clock::now(),
        )
        .map(|a| AssessmentResponse::success(&a));
    respond(StatusCode::OK, result)
}

// =============================================================================
// LIFECYCLE
// =============================================================================

async fn apply_lifecycle(
    state: AppState,
    id: u64,
    request: ActorRequest,
    action: LifecycleAction,
) -> (StatusCode, Json<AssessmentResponse>) {
    let mut registry = state.registry.write().await;
    let result = registry
        .transition(UserId(request.actor_id), AssessmentId(id), action, clock::now())
        .map(|a| {
            tracing::info!(
                event = "lifecycle",
                assessment = %a.id,
                action = %action,
                status = %a.status,
                "Assessment status changed"
            );
            AssessmentResponse::success(&a)
        });
    respond(StatusCode::OK, result)
}

pub async fn start_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    apply_lifecycle(state, id, request, LifecycleAction::Start).await
}

pub async fn submit_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    apply_lifecycle(state, id, request, LifecycleAction::SubmitForReview).await
}

pub async fn complete_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    apply_lifecycle(state, id, request, LifecycleAction::Complete).await
}

pub async fn archive_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    apply_lifecycle(state, id, request, LifecycleAction::Archive).await
}

pub async fn cancel_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ActorRequest>,
) -> impl IntoResponse {
    apply_lifecycle(state, id, request, LifecycleAction::Cancel).await
}

// =============================================================================
// AUDIO ANALYSIS
// =============================================================================

/// Run the audio pipeline on one recording.
///
/// The registry lock is released while the file is read and the
/// transcription backend is called.
pub async fn analyze_recording_handler(
    State(state): State<AppState>,
    Path((id, index)): Path<(u64, usize)>,
    Json(request): Json<AnalyzeRequest>,
) -> (StatusCode, Json<AssessmentResponse>) {
    let actor = UserId(request.actor_id);
    let assessment_id = AssessmentId(id);

    let prepared = {
        let registry = state.registry.read().await;
        AnalysisJob::prepare(
            &registry,
            actor,
            assessment_id,
            index,
            request.expected_text,
            request.apply_pronunciation,
        )
    };
    let job = match prepared {
        Ok(job) => job,
        Err(e) => return respond(StatusCode::OK, Err(e)),
    };

    let analysis = match state.pipeline.run(&job).await {
        Ok(analysis) => analysis,
        Err(e) => return respond(StatusCode::OK, Err(e)),
    };
    if let Some(error) = &analysis.error {
        tracing::warn!(
            event = "analysis_incomplete",
            assessment = %assessment_id,
            index,
            "{}",
            error
        );
    }

    let result = state.registry.write().await.record_analysis(
        actor,
        assessment_id,
        index,
        analysis,
        request.apply_pronunciation,
        clock::now(),
    );
    respond(
        StatusCode::OK,
        result.map(|a| AssessmentResponse::with_index(&a, index)),
    )
}
