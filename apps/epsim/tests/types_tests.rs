//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use epsim::api::{
    AddRecordingRequest, AssessmentJson, AssessmentQuery, CreateAssessmentRequest,
    CreateUserRequest, ErrorBody, ExportResponse, FeedbackRequest, HealthResponse,
    ScoresRequest, StatusResponse, UserResponse,
};
use epsim_core::{
    Assessment, AssessmentId, AssessmentStatus, Criterion, EpsimError, NewAssessment, Role,
    Score, ScoreSheet, TestType, Timestamp, UserId,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// USER REQUESTS
// =============================================================================

#[test]
fn test_create_user_defaults_to_candidate() {
    let json = r#"{"email":"pilot@ep.sim","name":"Pilot"}"#;
    let request: CreateUserRequest = serde_json::from_str(json).unwrap();

    let user = request.to_new_user();
    assert_eq!(user.role, Role::Candidate);
    assert_eq!(user.organization, None);
}

#[test]
fn test_create_user_role_is_snake_case() {
    let json = r#"{"email":"exam@ep.sim","name":"Examiner","role":"examiner","organization":"ATC"}"#;
    let request: CreateUserRequest = serde_json::from_str(json).unwrap();

    let user = request.to_new_user();
    assert_eq!(user.role, Role::Examiner);
    assert_eq!(user.organization.as_deref(), Some("ATC"));
}

#[test]
fn test_unknown_role_rejected() {
    let json = r#"{"email":"x@ep.sim","name":"X","role":"trainee"}"#;
    assert!(serde_json::from_str::<CreateUserRequest>(json).is_err());
}

// =============================================================================
// ASSESSMENT REQUESTS
// =============================================================================

#[test]
fn test_create_assessment_request_mapping() {
    let json = r#"{
        "actor_id": 1,
        "title": "Level check",
        "test_type": "lpe",
        "time_limit_minutes": 25,
        "scheduled_start_time": 1700000000,
        "is_practice": true
    }"#;
    let request: CreateAssessmentRequest = serde_json::from_str(json).unwrap();

    let input = request.to_new_assessment();
    assert_eq!(input.test_type, TestType::Lpe);
    assert_eq!(input.time_limit_minutes, Some(25));
    assert_eq!(
        input.scheduled_start_time,
        Some(Timestamp::from_secs(1_700_000_000))
    );
    assert!(input.is_practice);
    assert!(!input.is_retake);
}

#[test]
fn test_create_assessment_defaults_to_opi() {
    let json = r#"{"actor_id":1,"title":"Default"}"#;
    let request: CreateAssessmentRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.to_new_assessment().test_type, TestType::Opi);
}

#[test]
fn test_assessment_query_parses_status() {
    let query: AssessmentQuery =
        serde_json::from_str(r#"{"status":"under_review","assigned_to":4}"#).unwrap();
    assert_eq!(query.status, Some(AssessmentStatus::UnderReview));
    assert_eq!(query.assigned_to, Some(4));
    assert_eq!(query.test_type, None);
}

#[test]
fn test_feedback_request_flattens_notes() {
    let json = r#"{"actor_id":2,"strengths":"Clear readback","recommendations":"Retake in 3 years"}"#;
    let request: FeedbackRequest = serde_json::from_str(json).unwrap();

    assert_eq!(request.actor_id, 2);
    assert_eq!(request.notes.strengths.as_deref(), Some("Clear readback"));
    assert_eq!(
        request.notes.recommendations.as_deref(),
        Some("Retake in 3 years")
    );
    assert_eq!(request.notes.feedback, None);
}

// =============================================================================
// RECORDING REQUESTS
// =============================================================================

#[test]
fn test_recording_request_derives_name_and_type() {
    let request: AddRecordingRequest =
        serde_json::from_str(r#"{"actor_id":1,"file_path":"session/part2.mp3","duration_ms":5000}"#)
            .unwrap();

    let recording = request.to_new_recording().unwrap();
    assert_eq!(recording.file_name, "part2.mp3");
    assert_eq!(recording.file_type.as_deref(), Some("audio/mpeg"));
    assert_eq!(recording.duration_ms, 5_000);
}

#[test]
fn test_recording_request_rejects_unknown_extension() {
    let request: AddRecordingRequest =
        serde_json::from_str(r#"{"actor_id":1,"file_path":"notes.docx"}"#).unwrap();

    assert!(matches!(
        request.to_new_recording(),
        Err(EpsimError::InvalidInput(_))
    ));
}

// =============================================================================
// SCORES REQUEST
// =============================================================================

#[test]
fn test_scores_request_explicit_values() {
    let request = ScoresRequest {
        actor_id: 1,
        fluency_tenths: Some(45),
        interaction_tenths: Some(30),
        ..ScoresRequest::default()
    };

    let sheet = request.to_sheet().unwrap();
    assert_eq!(sheet.get(Criterion::Fluency).map(|s| s.tenths()), Some(45));
    assert_eq!(sheet.get(Criterion::Interaction).map(|s| s.tenths()), Some(30));
    assert_eq!(sheet.get(Criterion::Vocabulary), None);
}

#[test]
fn test_scores_request_out_of_range() {
    let request = ScoresRequest {
        actor_id: 1,
        vocabulary_tenths: Some(70),
        ..ScoresRequest::default()
    };

    assert!(matches!(
        request.to_sheet(),
        Err(EpsimError::ScoreOutOfRange(70))
    ));
}

#[test]
fn test_scores_request_rater_text_overridden_by_fields() {
    let request = ScoresRequest {
        actor_id: 1,
        rater_text: Some("Pronunciation: 3\nVocabulary: 4.5\nnot a score line".to_string()),
        pronunciation_tenths: Some(40),
        ..ScoresRequest::default()
    };

    let sheet = request.to_sheet().unwrap();
    assert_eq!(
        sheet.get(Criterion::Pronunciation).map(|s| s.tenths()),
        Some(40)
    );
    assert_eq!(sheet.get(Criterion::Vocabulary).map(|s| s.tenths()), Some(45));
    assert_eq!(sheet.get(Criterion::Fluency), None);
}

// =============================================================================
// JSON VIEWS
// =============================================================================

fn scored_assessment() -> Assessment {
    let mut a = Assessment::new(
        AssessmentId(7),
        UserId(3),
        NewAssessment {
            title: "View".to_string(),
            ..NewAssessment::default()
        },
        Timestamp::from_secs(100),
    )
    .unwrap();
    a.start(Timestamp::from_secs(200)).unwrap();

    let mut sheet = ScoreSheet::new();
    for criterion in Criterion::ALL {
        sheet.set(criterion, Some(Score::from_band(6).unwrap()));
    }
    a.set_scores(&sheet, Timestamp::from_secs(300)).unwrap();
    a
}

#[test]
fn test_assessment_json_carries_level() {
    let json = AssessmentJson::from(&scored_assessment());

    assert_eq!(json.id, 7);
    assert_eq!(json.created_by, 3);
    assert_eq!(json.status, AssessmentStatus::InProgress);
    assert_eq!(json.started_at, Some(200));
    assert_eq!(json.overall_score_tenths, Some(60));
    assert_eq!(json.icao_level, Some(6));
    assert_eq!(json.icao_level_name.as_deref(), Some("Expert"));
    assert_eq!(json.scores.comprehension_tenths, Some(60));
}

#[test]
fn test_assessment_json_derived_views() {
    let json = AssessmentJson::at(&scored_assessment(), Timestamp::from_secs(400));

    assert!(json.is_scored);
    assert_eq!(json.is_operational, Some(true));
    assert!(!json.is_expired);
    assert_eq!(json.duration_minutes, None);
    assert_eq!(json.scheduled_start_time, Some(200));
    assert_eq!(json.assessment_date, 100);
}

#[test]
fn test_assessment_json_expiry_uses_given_time() {
    let mut a = Assessment::new(
        AssessmentId(8),
        UserId(3),
        NewAssessment {
            title: "Timed".to_string(),
            time_limit_minutes: Some(10),
            ..NewAssessment::default()
        },
        Timestamp::from_secs(100),
    )
    .unwrap();
    a.start(Timestamp::from_secs(200)).unwrap();

    assert!(!AssessmentJson::at(&a, Timestamp::from_secs(800)).is_expired);
    assert!(AssessmentJson::at(&a, Timestamp::from_secs(801)).is_expired);
    assert!(!AssessmentJson::at(&a, Timestamp::from_secs(801)).is_scored);
    assert_eq!(AssessmentJson::at(&a, Timestamp::from_secs(801)).is_operational, None);
}

#[test]
fn test_assessment_json_status_is_snake_case() {
    let value = serde_json::to_value(AssessmentJson::from(&scored_assessment())).unwrap();
    assert_eq!(value["status"], "in_progress");
    assert_eq!(value["test_type"], "opi");
}

// =============================================================================
// RESPONSES
// =============================================================================

#[test]
fn test_error_body_shape() {
    let response = UserResponse::error("User 9 not found");
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "User 9 not found");
    assert!(value["user"].is_null());
}

#[test]
fn test_status_error_body_shape() {
    let value = serde_json::to_value(StatusResponse::error("storage offline")).unwrap();

    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "storage offline");
    assert_eq!(value["users"], 0);
}

#[test]
fn test_export_response_is_base64() {
    let response = ExportResponse::success(b"EPSM", "abc".to_string());
    assert_eq!(response.data.as_deref(), Some("RVBTTQ=="));
    assert_eq!(response.digest.as_deref(), Some("abc"));
    assert!(response.error.is_none());
}
