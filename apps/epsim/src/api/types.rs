//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Scores travel as tenths
//! (`*_tenths`, `45` is 4.5) and timestamps as unix seconds.

use epsim_core::{
    Assessment, AssessmentStatus, AudioFormat, AudioMetrics, AudioRecording, Criterion,
    EpsimError, ExaminerNotes, NewAssessment, NewQuestion, NewRecording, NewUser, Notification,
    NotificationKind, Question, QuestionType, RegistryStats, Role, Score, ScoreSheet, TestType,
    Timestamp, User, UserStatus, parse_rater_scores,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Response bodies that can carry an error message.
pub trait ErrorBody {
    fn error(msg: impl Into<String>) -> Self;
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Record counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub users: usize,
    pub assessments: usize,
    pub notifications: usize,
    pub unread_notifications: usize,
    pub by_status: BTreeMap<String, usize>,
    pub persistent: bool,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn from_stats(stats: &RegistryStats, persistent: bool) -> Self {
        Self {
            success: true,
            users: stats.users,
            assessments: stats.assessments,
            notifications: stats.notifications,
            unread_notifications: stats.unread_notifications,
            by_status: stats
                .by_status
                .iter()
                .map(|(s, n)| (s.as_str().to_string(), *n))
                .collect(),
            persistent,
            error: None,
        }
    }
}

impl ErrorBody for StatusResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            users: 0,
            assessments: 0,
            notifications: 0,
            unread_notifications: 0,
            by_status: BTreeMap::new(),
            persistent: false,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// JSON VIEWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJson {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub is_active: bool,
    pub completed_assessments: Vec<u64>,
    pub created_at: u64,
}

impl From<&User> for UserJson {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.0,
            email: u.email.clone(),
            name: u.name.clone(),
            full_name: u.full_name(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            organization: u.organization.clone(),
            role: u.role,
            status: u.status,
            is_active: u.is_active,
            completed_assessments: u.completed_assessments.iter().map(|a| a.0).collect(),
            created_at: u.created_at.secs(),
        }
    }
}

/// The six ICAO sub-scores in tenths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoresJson {
    pub pronunciation_tenths: Option<u8>,
    pub structure_tenths: Option<u8>,
    pub vocabulary_tenths: Option<u8>,
    pub fluency_tenths: Option<u8>,
    pub comprehension_tenths: Option<u8>,
    pub interaction_tenths: Option<u8>,
}

impl From<&ScoreSheet> for ScoresJson {
    fn from(sheet: &ScoreSheet) -> Self {
        let t = |c| sheet.get(c).map(|s: Score| s.tenths());
        Self {
            pronunciation_tenths: t(Criterion::Pronunciation),
            structure_tenths: t(Criterion::Structure),
            vocabulary_tenths: t(Criterion::Vocabulary),
            fluency_tenths: t(Criterion::Fluency),
            comprehension_tenths: t(Criterion::Comprehension),
            interaction_tenths: t(Criterion::Interaction),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionJson {
    pub index: usize,
    pub question_type: QuestionType,
    pub text: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub answer: Option<String>,
    pub score_tenths: Option<u8>,
    pub feedback: Option<String>,
    pub audio_recording: Option<usize>,
}

impl QuestionJson {
    fn new(index: usize, q: &Question) -> Self {
        Self {
            index,
            question_type: q.question_type,
            text: q.text.clone(),
            description: q.description.clone(),
            options: q.options.clone(),
            answer: q.answer.clone(),
            score_tenths: q.score.map(|s| s.tenths()),
            feedback: q.feedback.clone(),
            audio_recording: q.audio_recording,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingJson {
    pub index: usize,
    pub file_path: String,
    pub file_name: String,
    pub file_type: Option<String>,
    pub duration_ms: u32,
    pub sample_rate: Option<u32>,
    pub channels: u16,
    pub question: Option<usize>,
    pub transcript: Option<String>,
    pub confidence_permille: Option<u16>,
    pub language: String,
    pub is_processed: bool,
    pub processing_error: Option<String>,
    pub metrics: Option<AudioMetrics>,
}

impl RecordingJson {
    fn new(index: usize, r: &AudioRecording) -> Self {
        Self {
            index,
            file_path: r.file_path.clone(),
            file_name: r.file_name.clone(),
            file_type: r.file_type.clone(),
            duration_ms: r.duration_ms,
            sample_rate: r.sample_rate,
            channels: r.channels,
            question: r.question,
            transcript: r.transcript.clone(),
            confidence_permille: r.confidence_permille,
            language: r.language.clone(),
            is_processed: r.is_processed,
            processing_error: r.processing_error.clone(),
            metrics: r.metrics.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentJson {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub test_type: TestType,
    pub status: AssessmentStatus,
    pub progress: u8,
    pub created_by: u64,
    pub assigned_to: Option<u64>,
    pub assigned_by: Option<u64>,
    pub scheduled_start_time: Option<u64>,
    pub scheduled_end_time: Option<u64>,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub expires_at: Option<u64>,
    pub time_limit_minutes: Option<u32>,
    /// Whole minutes from start to completion.
    pub duration_minutes: Option<u64>,
    pub is_expired: bool,
    pub introduction: Option<String>,
    pub picture_description: Option<String>,
    pub scenario: Option<String>,
    pub scores: ScoresJson,
    pub overall_score_tenths: Option<u8>,
    pub icao_level: Option<u8>,
    pub icao_level_name: Option<String>,
    /// Level 4 or above.
    pub is_operational: Option<bool>,
    pub is_scored: bool,
    pub notes: ExaminerNotes,
    pub questions: Vec<QuestionJson>,
    pub recordings: Vec<RecordingJson>,
    pub is_practice: bool,
    pub is_retake: bool,
    pub assessment_date: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&Assessment> for AssessmentJson {
    fn from(a: &Assessment) -> Self {
        Self::at(a, crate::clock::now())
    }
}

impl AssessmentJson {
    /// View of `a` with expiry judged at `now`.
    pub fn at(a: &Assessment, now: Timestamp) -> Self {
        Self {
            id: a.id.0,
            title: a.title.clone(),
            description: a.description.clone(),
            test_type: a.test_type,
            status: a.status,
            progress: a.progress,
            created_by: a.created_by.0,
            assigned_to: a.assigned_to.map(|u| u.0),
            assigned_by: a.assigned_by.map(|u| u.0),
            scheduled_start_time: a.scheduled_start_time.map(|t| t.secs()),
            scheduled_end_time: a.scheduled_end_time.map(|t| t.secs()),
            started_at: a.started_at.map(|t| t.secs()),
            completed_at: a.completed_at.map(|t| t.secs()),
            expires_at: a.expires_at.map(|t| t.secs()),
            time_limit_minutes: a.time_limit_minutes,
            duration_minutes: a.duration_minutes(),
            is_expired: a.is_expired(now),
            introduction: a.introduction.clone(),
            picture_description: a.picture_description.clone(),
            scenario: a.scenario.clone(),
            scores: ScoresJson::from(&a.scores),
            overall_score_tenths: a.overall_score.map(|s| s.tenths()),
            icao_level: a.icao_level.map(|l| l.number()),
            icao_level_name: a.icao_level.map(|l| l.name().to_string()),
            is_operational: a.icao_level.map(|l| l.is_operational()),
            is_scored: a.is_scored(),
            notes: a.notes.clone(),
            questions: a
                .questions
                .iter()
                .enumerate()
                .map(|(i, q)| QuestionJson::new(i, q))
                .collect(),
            recordings: a
                .recordings
                .iter()
                .enumerate()
                .map(|(i, r)| RecordingJson::new(i, r))
                .collect(),
            is_practice: a.is_practice,
            is_retake: a.is_retake,
            assessment_date: a.assessment_date.secs(),
            created_at: a.created_at.secs(),
            updated_at: a.updated_at.secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationJson {
    pub id: u64,
    pub recipient: u64,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: u8,
    pub is_read: bool,
    pub assessment: Option<u64>,
    pub created_at: u64,
    pub read_at: Option<u64>,
}

impl From<&Notification> for NotificationJson {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.0,
            recipient: n.recipient.0,
            title: n.title.clone(),
            message: n.message.clone(),
            kind: n.kind,
            priority: n.priority,
            is_read: n.is_read,
            assessment: n.assessment.map(|a| a.0),
            created_at: n.created_at.secs(),
            read_at: n.read_at.map(|t| t.secs()),
        }
    }
}

// =============================================================================
// USER REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl CreateUserRequest {
    pub fn to_new_user(&self) -> NewUser {
        let mut user = NewUser::new(&self.email, &self.name, self.role.unwrap_or_default());
        user.first_name = self.first_name.clone();
        user.last_name = self.last_name.clone();
        user.organization = self.organization.clone();
        user
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatusRequest {
    pub actor_id: u64,
    pub status: UserStatus,
}

// =============================================================================
// ASSESSMENT REQUESTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAssessmentRequest {
    pub actor_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub test_type: Option<TestType>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub scheduled_start_time: Option<u64>,
    #[serde(default)]
    pub scheduled_end_time: Option<u64>,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub picture_description: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub is_practice: bool,
    #[serde(default)]
    pub is_retake: bool,
}

impl CreateAssessmentRequest {
    pub fn to_new_assessment(&self) -> NewAssessment {
        NewAssessment {
            title: self.title.clone(),
            description: self.description.clone(),
            test_type: self.test_type.unwrap_or_default(),
            time_limit_minutes: self.time_limit_minutes,
            scheduled_start_time: self.scheduled_start_time.map(Timestamp::from_secs),
            scheduled_end_time: self.scheduled_end_time.map(Timestamp::from_secs),
            introduction: self.introduction.clone(),
            picture_description: self.picture_description.clone(),
            scenario: self.scenario.clone(),
            is_practice: self.is_practice,
            is_retake: self.is_retake,
        }
    }
}

/// Body for actions that only need to know who acts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRequest {
    pub actor_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub actor_id: u64,
    pub assignee_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddQuestionRequest {
    pub actor_id: u64,
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl AddQuestionRequest {
    pub fn to_new_question(&self) -> NewQuestion {
        let mut q = NewQuestion::new(self.question_type, &self.text);
        q.description = self.description.clone();
        q.options = self.options.clone();
        q.correct_answer = self.correct_answer.clone();
        q
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub actor_id: u64,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreQuestionRequest {
    pub actor_id: u64,
    pub score_tenths: u32,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRecordingRequest {
    pub actor_id: u64,
    /// Path relative to the audio directory.
    pub file_path: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub duration_ms: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub question_index: Option<usize>,
}

impl AddRecordingRequest {
    /// Build the recording; the extension must name an accepted format.
    pub fn to_new_recording(&self) -> Result<NewRecording, EpsimError> {
        let path = Path::new(&self.file_path);
        let format = AudioFormat::from_path(path).ok_or_else(|| {
            EpsimError::InvalidInput(format!(
                "Unsupported audio file '{}'. Use: wav, mp3, ogg",
                self.file_path
            ))
        })?;
        let file_name = match &self.file_name {
            Some(name) => name.clone(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.file_path.clone()),
        };

        let mut rec = NewRecording::new(&self.file_path, file_name, self.duration_ms);
        rec.file_size = self.file_size;
        rec.file_type = Some(format.mime_type().to_string());
        rec.sample_rate = self.sample_rate;
        rec.channels = self.channels;
        rec.language = self.language.clone();
        rec.question = self.question_index;
        Ok(rec)
    }
}

/// Partial sub-score update; absent fields are left unchanged.
///
/// `rater_text` is free-form rater output ("Fluency: 4 ..."); explicit
/// `*_tenths` fields win over values parsed from it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoresRequest {
    pub actor_id: u64,
    #[serde(default)]
    pub rater_text: Option<String>,
    #[serde(default)]
    pub pronunciation_tenths: Option<u32>,
    #[serde(default)]
    pub structure_tenths: Option<u32>,
    #[serde(default)]
    pub vocabulary_tenths: Option<u32>,
    #[serde(default)]
    pub fluency_tenths: Option<u32>,
    #[serde(default)]
    pub comprehension_tenths: Option<u32>,
    #[serde(default)]
    pub interaction_tenths: Option<u32>,
}

impl ScoresRequest {
    pub fn to_sheet(&self) -> Result<ScoreSheet, EpsimError> {
        let mut sheet = self
            .rater_text
            .as_deref()
            .map(|text| parse_rater_scores(text).sheet)
            .unwrap_or_default();
        for (criterion, value) in [
            (Criterion::Pronunciation, self.pronunciation_tenths),
            (Criterion::Structure, self.structure_tenths),
            (Criterion::Vocabulary, self.vocabulary_tenths),
            (Criterion::Fluency, self.fluency_tenths),
            (Criterion::Comprehension, self.comprehension_tenths),
            (Criterion::Interaction, self.interaction_tenths),
        ] {
            if let Some(tenths) = value {
                sheet.set(criterion, Some(Score::from_tenths(tenths)?));
            }
        }
        Ok(sheet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub actor_id: u64,
    #[serde(flatten)]
    pub notes: ExaminerNotes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRequest {
    pub actor_id: u64,
    pub progress: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub actor_id: u64,
    /// Reference text; defaults to the linked question's text.
    #[serde(default)]
    pub expected_text: Option<String>,
    #[serde(default)]
    pub apply_pronunciation: bool,
}

/// `GET /assessments` filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentQuery {
    pub status: Option<AssessmentStatus>,
    pub created_by: Option<u64>,
    pub assigned_to: Option<u64>,
    pub test_type: Option<TestType>,
}

/// `GET /users/{id}/notifications` options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

// =============================================================================
// RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: Option<UserJson>,
    pub error: Option<String>,
}

impl UserResponse {
    pub fn success(user: &User) -> Self {
        Self {
            success: true,
            user: Some(UserJson::from(user)),
            error: None,
        }
    }
}

impl ErrorBody for UserResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListResponse {
    pub success: bool,
    pub users: Vec<UserJson>,
    pub error: Option<String>,
}

impl UserListResponse {
    pub fn success(users: &[User]) -> Self {
        Self {
            success: true,
            users: users.iter().map(UserJson::from).collect(),
            error: None,
        }
    }
}

impl ErrorBody for UserListResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            users: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub success: bool,
    pub assessment: Option<AssessmentJson>,
    /// Index of the question or recording just added.
    #[serde(default)]
    pub index: Option<usize>,
    pub error: Option<String>,
}

impl AssessmentResponse {
    pub fn success(assessment: &Assessment) -> Self {
        Self {
            success: true,
            assessment: Some(AssessmentJson::from(assessment)),
            index: None,
            error: None,
        }
    }

    pub fn with_index(assessment: &Assessment, index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::success(assessment)
        }
    }
}

impl ErrorBody for AssessmentResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            assessment: None,
            index: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentListResponse {
    pub success: bool,
    pub assessments: Vec<AssessmentJson>,
    pub error: Option<String>,
}

impl AssessmentListResponse {
    pub fn success(assessments: &[Assessment]) -> Self {
        Self {
            success: true,
            assessments: assessments.iter().map(AssessmentJson::from).collect(),
            error: None,
        }
    }
}

impl ErrorBody for AssessmentListResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            assessments: Vec::new(),
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub success: bool,
    pub notification: Option<NotificationJson>,
    pub error: Option<String>,
}

impl NotificationResponse {
    pub fn success(notification: &Notification) -> Self {
        Self {
            success: true,
            notification: Some(NotificationJson::from(notification)),
            error: None,
        }
    }
}

impl ErrorBody for NotificationResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            notification: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub success: bool,
    pub notifications: Vec<NotificationJson>,
    pub unread: usize,
    pub error: Option<String>,
}

impl NotificationListResponse {
    pub fn success(notifications: &[Notification], unread: usize) -> Self {
        Self {
            success: true,
            notifications: notifications.iter().map(NotificationJson::from).collect(),
            unread,
            error: None,
        }
    }
}

impl ErrorBody for NotificationListResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            notifications: Vec::new(),
            unread: 0,
            error: Some(msg.into()),
        }
    }
}

/// Snapshot export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    /// Base64-encoded snapshot bytes.
    pub data: Option<String>,
    /// BLAKE3 hex digest of the snapshot bytes.
    pub digest: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], digest: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            digest: Some(digest),
            error: None,
        }
    }
}

impl ErrorBody for ExportResponse {
    fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            digest: None,
            error: Some(msg.into()),
        }
    }
}
