//! # Assessment Records
//!
//! The assessment document and its embedded questions and recordings.
//!
//! An assessment holds everything an examiner needs to rate a candidate:
//! the test content, the candidate's recorded answers, six ICAO sub-scores
//! and the examiner's written comments. Status changes live in the
//! [`lifecycle`](crate::lifecycle) module; this module covers content and
//! scoring mutations, each guarded by the current status.

use crate::audio::{AudioMetrics, RecordingAnalysis};
use crate::lifecycle::LifecycleAction;
use crate::primitives::{
    MAX_OPTIONS, MAX_QUESTIONS, MAX_RECORDINGS, MAX_TEXT_LENGTH, MAX_TIME_LIMIT_MINUTES,
    MAX_TITLE_LENGTH,
};
use crate::score::{IcaoLevel, Score, ScoreSheet, mean_score};
use crate::{AssessmentId, EpsimError, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// ENUMS
// =============================================================================

/// Status of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStatus {
    Draft,
    InProgress,
    UnderReview,
    Completed,
    Archived,
    Cancelled,
}

impl AssessmentStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [AssessmentStatus; 6] = [
        Self::Draft,
        Self::InProgress,
        Self::UnderReview,
        Self::Completed,
        Self::Archived,
        Self::Cancelled,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::UnderReview => "under_review",
            Self::Completed => "completed",
            Self::Archived => "archived",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentStatus {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| EpsimError::InvalidInput(format!("Unknown status '{}'", s)))
    }
}

/// Kind of test being administered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// Oral proficiency interview.
    #[default]
    Opi,
    /// English for aviation purposes.
    Eap,
    /// Language proficiency evaluation.
    Lpe,
}

impl TestType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opi => "opi",
            Self::Eap => "eap",
            Self::Lpe => "lpe",
        }
    }
}

impl FromStr for TestType {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opi" => Ok(Self::Opi),
            "eap" => Ok(Self::Eap),
            "lpe" => Ok(Self::Lpe),
            _ => Err(EpsimError::InvalidInput(format!("Unknown test type '{}'", s))),
        }
    }
}

/// Kind of question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    LongAnswer,
    OralResponse,
    PictureDescription,
    Scenario,
}

impl QuestionType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::ShortAnswer => "short_answer",
            Self::LongAnswer => "long_answer",
            Self::OralResponse => "oral_response",
            Self::PictureDescription => "picture_description",
            Self::Scenario => "scenario",
        }
    }
}

impl FromStr for QuestionType {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "short_answer" => Ok(Self::ShortAnswer),
            "long_answer" => Ok(Self::LongAnswer),
            "oral_response" => Ok(Self::OralResponse),
            "picture_description" => Ok(Self::PictureDescription),
            "scenario" => Ok(Self::Scenario),
            _ => Err(EpsimError::InvalidInput(format!(
                "Unknown question type '{}'",
                s
            ))),
        }
    }
}

// =============================================================================
// QUESTION
// =============================================================================

/// A question embedded in an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_type: QuestionType,
    pub text: String,
    pub description: Option<String>,
    /// Choices for multiple-choice questions.
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
    pub answer: Option<String>,
    pub score: Option<Score>,
    pub feedback: Option<String>,
    /// Index of the recording holding the oral answer.
    pub audio_recording: Option<usize>,
    pub audio_duration_ms: Option<u32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for [`Assessment::add_question`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub question_type: QuestionType,
    pub text: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub correct_answer: Option<String>,
}

impl NewQuestion {
    /// A question with only a type and text.
    #[must_use]
    pub fn new(question_type: QuestionType, text: impl Into<String>) -> Self {
        Self {
            question_type,
            text: text.into(),
            description: None,
            options: Vec::new(),
            correct_answer: None,
        }
    }

    fn validate(&self) -> Result<(), EpsimError> {
        require_text("question text", &self.text, MAX_TEXT_LENGTH)?;
        optional_text("question description", self.description.as_deref())?;
        if self.options.len() > MAX_OPTIONS {
            return Err(EpsimError::InvalidInput(format!(
                "A question may have at most {} options",
                MAX_OPTIONS
            )));
        }
        if self.question_type == QuestionType::MultipleChoice && self.options.len() < 2 {
            return Err(EpsimError::InvalidInput(
                "Multiple-choice questions need at least two options".to_string(),
            ));
        }
        if let Some(answer) = &self.correct_answer {
            if !self.options.is_empty() && !self.options.contains(answer) {
                return Err(EpsimError::InvalidInput(
                    "Correct answer must be one of the options".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// AUDIO RECORDING
// =============================================================================

/// An audio answer attached to an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecording {
    pub file_path: String,
    pub file_name: String,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub duration_ms: u32,
    pub sample_rate: Option<u32>,
    pub channels: u16,
    /// Question this recording answers, if any.
    pub question: Option<usize>,
    pub transcript: Option<String>,
    /// Transcript confidence, 0..=1000.
    pub confidence_permille: Option<u16>,
    pub language: String,
    pub is_processed: bool,
    pub processing_error: Option<String>,
    pub metrics: Option<AudioMetrics>,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

/// Input for [`Assessment::add_recording`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecording {
    pub file_path: String,
    pub file_name: String,
    pub duration_ms: u32,
    pub file_size: Option<u64>,
    pub file_type: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub language: Option<String>,
    pub question: Option<usize>,
}

impl NewRecording {
    /// A recording with the required fields only.
    #[must_use]
    pub fn new(
        file_path: impl Into<String>,
        file_name: impl Into<String>,
        duration_ms: u32,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            file_name: file_name.into(),
            duration_ms,
            file_size: None,
            file_type: None,
            sample_rate: None,
            channels: None,
            language: None,
            question: None,
        }
    }
}

// =============================================================================
// EXAMINER NOTES
// =============================================================================

/// Free-text comments written by the examiner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExaminerNotes {
    pub strengths: Option<String>,
    pub areas_for_improvement: Option<String>,
    pub recommendations: Option<String>,
    pub examiner_notes: Option<String>,
    pub feedback: Option<String>,
}

impl ExaminerNotes {
    fn validate(&self) -> Result<(), EpsimError> {
        optional_text("strengths", self.strengths.as_deref())?;
        optional_text("areas for improvement", self.areas_for_improvement.as_deref())?;
        optional_text("recommendations", self.recommendations.as_deref())?;
        optional_text("examiner notes", self.examiner_notes.as_deref())?;
        optional_text("feedback", self.feedback.as_deref())
    }

    /// Overlay the fields present in `other`.
    pub fn merge(&mut self, other: ExaminerNotes) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.strengths, other.strengths);
        take(&mut self.areas_for_improvement, other.areas_for_improvement);
        take(&mut self.recommendations, other.recommendations);
        take(&mut self.examiner_notes, other.examiner_notes);
        take(&mut self.feedback, other.feedback);
    }
}

// =============================================================================
// ASSESSMENT
// =============================================================================

/// Input for creating an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewAssessment {
    pub title: String,
    pub description: Option<String>,
    pub test_type: TestType,
    pub time_limit_minutes: Option<u32>,
    pub scheduled_start_time: Option<Timestamp>,
    pub scheduled_end_time: Option<Timestamp>,
    pub introduction: Option<String>,
    pub picture_description: Option<String>,
    pub scenario: Option<String>,
    pub is_practice: bool,
    pub is_retake: bool,
}

impl NewAssessment {
    /// An OPI assessment with just a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// An ICAO English-proficiency assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub title: String,
    pub description: Option<String>,
    pub test_type: TestType,
    pub status: AssessmentStatus,
    /// Completion percentage, 0..=100.
    pub progress: u8,

    pub created_by: UserId,
    pub assigned_to: Option<UserId>,
    pub assigned_by: Option<UserId>,

    pub scheduled_start_time: Option<Timestamp>,
    pub scheduled_end_time: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub time_limit_minutes: Option<u32>,
    pub expires_at: Option<Timestamp>,

    pub introduction: Option<String>,
    pub picture_description: Option<String>,
    pub scenario: Option<String>,

    pub questions: Vec<Question>,
    pub recordings: Vec<AudioRecording>,

    pub scores: ScoreSheet,
    /// Derived: never set directly.
    pub overall_score: Option<Score>,
    /// Derived from `overall_score`.
    pub icao_level: Option<IcaoLevel>,

    pub notes: ExaminerNotes,

    pub is_practice: bool,
    pub is_retake: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub assessment_date: Timestamp,
}

impl Assessment {
    /// Create a draft assessment.
    pub fn new(
        id: AssessmentId,
        created_by: UserId,
        input: NewAssessment,
        now: Timestamp,
    ) -> Result<Self, EpsimError> {
        require_text("title", &input.title, MAX_TITLE_LENGTH)?;
        optional_text("description", input.description.as_deref())?;
        optional_text("introduction", input.introduction.as_deref())?;
        optional_text("picture description", input.picture_description.as_deref())?;
        optional_text("scenario", input.scenario.as_deref())?;

        if let Some(limit) = input.time_limit_minutes {
            if limit == 0 || limit > MAX_TIME_LIMIT_MINUTES {
                return Err(EpsimError::InvalidInput(format!(
                    "Time limit must be 1..={} minutes",
                    MAX_TIME_LIMIT_MINUTES
                )));
            }
        }
        if let (Some(start), Some(end)) = (input.scheduled_start_time, input.scheduled_end_time) {
            if end < start {
                return Err(EpsimError::InvalidInput(
                    "Scheduled end must not precede scheduled start".to_string(),
                ));
            }
        }

        Ok(Self {
            id,
            title: input.title.trim().to_string(),
            description: input.description,
            test_type: input.test_type,
            status: AssessmentStatus::Draft,
            progress: 0,
            created_by,
            assigned_to: None,
            assigned_by: None,
            scheduled_start_time: input.scheduled_start_time,
            scheduled_end_time: input.scheduled_end_time,
            started_at: None,
            completed_at: None,
            time_limit_minutes: input.time_limit_minutes,
            expires_at: None,
            introduction: input.introduction,
            picture_description: input.picture_description,
            scenario: input.scenario,
            questions: Vec::new(),
            recordings: Vec::new(),
            scores: ScoreSheet::new(),
            overall_score: None,
            icao_level: None,
            notes: ExaminerNotes::default(),
            is_practice: input.is_practice,
            is_retake: input.is_retake,
            created_at: now,
            updated_at: now,
            assessment_date: now,
        })
    }

    // =========================================================================
    // CONTENT
    // =========================================================================

    /// Append a question and return its index.
    pub fn add_question(
        &mut self,
        input: NewQuestion,
        now: Timestamp,
    ) -> Result<usize, EpsimError> {
        self.require(self.status.accepts_content(), LifecycleAction::Edit)?;
        input.validate()?;
        if self.questions.len() >= MAX_QUESTIONS {
            return Err(EpsimError::InvalidInput(format!(
                "An assessment may have at most {} questions",
                MAX_QUESTIONS
            )));
        }

        self.questions.push(Question {
            question_type: input.question_type,
            text: input.text,
            description: input.description,
            options: input.options,
            correct_answer: input.correct_answer,
            answer: None,
            score: None,
            feedback: None,
            audio_recording: None,
            audio_duration_ms: None,
            created_at: now,
            updated_at: now,
        });
        self.touch(now);
        Ok(self.questions.len() - 1)
    }

    /// Hand the assessment to an examiner.
    pub fn assign(
        &mut self,
        assignee: UserId,
        by: UserId,
        now: Timestamp,
    ) -> Result<(), EpsimError> {
        self.require(self.status.allows(LifecycleAction::Assign), LifecycleAction::Assign)?;
        self.assigned_to = Some(assignee);
        self.assigned_by = Some(by);
        self.touch(now);
        Ok(())
    }

    /// Record a candidate's written answer.
    pub fn answer_question(
        &mut self,
        index: usize,
        answer: String,
        now: Timestamp,
    ) -> Result<(), EpsimError> {
        self.require(
            self.status == AssessmentStatus::InProgress,
            LifecycleAction::Answer,
        )?;
        require_text("answer", &answer, MAX_TEXT_LENGTH)?;
        let id = self.id;
        let question = self
            .questions
            .get_mut(index)
            .ok_or(EpsimError::QuestionNotFound {
                assessment: id,
                index,
            })?;
        question.answer = Some(answer);
        question.updated_at = now;
        self.touch(now);
        Ok(())
    }

    /// Append a recording and return its index.
    ///
    /// If the recording names a question, the question is linked to it.
    pub fn add_recording(
        &mut self,
        input: NewRecording,
        now: Timestamp,
    ) -> Result<usize, EpsimError> {
        self.require(self.status.accepts_content(), LifecycleAction::Edit)?;
        require_text("file path", &input.file_path, MAX_TEXT_LENGTH)?;
        require_text("file name", &input.file_name, MAX_TITLE_LENGTH)?;
        if self.recordings.len() >= MAX_RECORDINGS {
            return Err(EpsimError::InvalidInput(format!(
                "An assessment may have at most {} recordings",
                MAX_RECORDINGS
            )));
        }
        if let Some(q) = input.question {
            if q >= self.questions.len() {
                return Err(EpsimError::QuestionNotFound {
                    assessment: self.id,
                    index: q,
                });
            }
        }

        let index = self.recordings.len();
        self.recordings.push(AudioRecording {
            file_path: input.file_path,
            file_name: input.file_name,
            file_size: input.file_size,
            file_type: input.file_type,
            duration_ms: input.duration_ms,
            sample_rate: input.sample_rate,
            channels: input.channels.unwrap_or(1).max(1),
            question: input.question,
            transcript: None,
            confidence_permille: None,
            language: input.language.unwrap_or_else(|| "en".to_string()),
            is_processed: false,
            processing_error: None,
            metrics: None,
            created_at: now,
            processed_at: None,
        });

        if let Some(q) = input.question {
            let question = &mut self.questions[q];
            question.audio_recording = Some(index);
            question.audio_duration_ms = Some(input.duration_ms);
            question.updated_at = now;
        }
        self.touch(now);
        Ok(index)
    }

    /// Store the outcome of the audio pipeline on a recording.
    ///
    /// When `apply_pronunciation` is set and the analysis produced a score,
    /// it becomes the pronunciation sub-score.
    pub fn record_analysis(
        &mut self,
        index: usize,
        analysis: RecordingAnalysis,
        apply_pronunciation: bool,
        now: Timestamp,
    ) -> Result<(), EpsimError> {
        self.require(!self.status.is_closed(), LifecycleAction::Analyze)?;
        if apply_pronunciation && analysis.pronunciation.is_some() {
            self.require(self.status.accepts_scores(), LifecycleAction::Score)?;
        }
        let id = self.id;
        let recording = self
            .recordings
            .get_mut(index)
            .ok_or(EpsimError::RecordingNotFound {
                assessment: id,
                index,
            })?;

        if let Some(metrics) = &analysis.metrics {
            recording.duration_ms = metrics.duration_ms;
            recording.sample_rate = Some(metrics.sample_rate);
            recording.channels = metrics.channels;
        }
        recording.transcript = analysis.transcript;
        recording.confidence_permille = analysis.confidence_permille;
        recording.language = analysis.language;
        recording.metrics = analysis.metrics;
        recording.processing_error = analysis.error;
        recording.is_processed = true;
        recording.processed_at = Some(now);

        if apply_pronunciation {
            if let Some(score) = analysis.pronunciation {
                self.scores.pronunciation = Some(score);
                self.recalculate_overall();
            }
        }
        self.touch(now);
        Ok(())
    }

    // =========================================================================
    // SCORING
    // =========================================================================

    /// Score a single question.
    pub fn score_question(
        &mut self,
        index: usize,
        score: Score,
        feedback: Option<String>,
        now: Timestamp,
    ) -> Result<(), EpsimError> {
        self.require(self.status.accepts_scores(), LifecycleAction::Score)?;
        optional_text("feedback", feedback.as_deref())?;
        let id = self.id;
        let question = self
            .questions
            .get_mut(index)
            .ok_or(EpsimError::QuestionNotFound {
                assessment: id,
                index,
            })?;
        question.score = Some(score);
        if feedback.is_some() {
            question.feedback = feedback;
        }
        question.updated_at = now;
        self.recalculate_overall();
        self.touch(now);
        Ok(())
    }

    /// Merge sub-scores into the sheet and re-derive overall and level.
    pub fn set_scores(&mut self, sheet: &ScoreSheet, now: Timestamp) -> Result<(), EpsimError> {
        self.require(self.status.accepts_scores(), LifecycleAction::Score)?;
        self.scores.merge(sheet);
        self.recalculate_overall();
        self.touch(now);
        Ok(())
    }

    /// Merge examiner comments.
    pub fn set_notes(&mut self, notes: ExaminerNotes, now: Timestamp) -> Result<(), EpsimError> {
        self.require(self.status.accepts_scores(), LifecycleAction::Score)?;
        notes.validate()?;
        self.notes.merge(notes);
        self.touch(now);
        Ok(())
    }

    /// Update the completion percentage.
    pub fn set_progress(&mut self, progress: u8, now: Timestamp) -> Result<(), EpsimError> {
        self.require(
            self.status == AssessmentStatus::InProgress,
            LifecycleAction::UpdateProgress,
        )?;
        if progress > 100 {
            return Err(EpsimError::InvalidInput(format!(
                "Progress must be 0..=100, got {}",
                progress
            )));
        }
        self.progress = progress;
        self.touch(now);
        Ok(())
    }

    /// Mean of the scored questions, if any are scored.
    #[must_use]
    pub fn question_average(&self) -> Option<Score> {
        let scored: Vec<Score> = self.questions.iter().filter_map(|q| q.score).collect();
        mean_score(&scored)
    }

    /// Set overall score and level to the mean of the scored questions.
    ///
    /// Leaves both untouched when no question is scored. Returns the
    /// resulting overall score.
    pub fn calculate_question_scores(&mut self, now: Timestamp) -> Option<Score> {
        if let Some(average) = self.question_average() {
            self.overall_score = Some(average);
            self.icao_level = Some(IcaoLevel::from_score(average));
            self.touch(now);
        }
        self.overall_score
    }

    /// Re-derive overall score and level: the full sheet if complete,
    /// else the mean of scored questions, else nothing.
    pub(crate) fn recalculate_overall(&mut self) {
        self.overall_score = self.scores.overall().or_else(|| self.question_average());
        self.icao_level = self.overall_score.map(IcaoLevel::from_score);
    }

    // =========================================================================
    // DERIVED VIEWS
    // =========================================================================

    /// Whole minutes between start and completion.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end.seconds_since(start) / 60),
            _ => None,
        }
    }

    /// True once `now` is past the expiry set at start.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }

    /// True when all six sub-scores and the overall score are present.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.scores.is_complete() && self.overall_score.is_some()
    }

    /// True if `user` created or is assigned to this assessment.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.created_by == user || self.assigned_to == Some(user)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    pub(crate) fn require(&self, allowed: bool, action: LifecycleAction) -> Result<(), EpsimError> {
        if allowed {
            Ok(())
        } else {
            Err(EpsimError::InvalidTransition {
                from: self.status,
                action,
            })
        }
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

impl std::fmt::Display for Assessment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.title, self.status)
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn require_text(field: &str, value: &str, max: usize) -> Result<(), EpsimError> {
    if value.trim().is_empty() {
        return Err(EpsimError::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.len() > max {
        return Err(EpsimError::InvalidInput(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            value.len(),
            max
        )));
    }
    Ok(())
}

fn optional_text(field: &str, value: Option<&str>) -> Result<(), EpsimError> {
    match value {
        Some(v) if v.len() > MAX_TEXT_LENGTH => Err(EpsimError::InvalidInput(format!(
            "{} length {} exceeds maximum {} bytes",
            field,
            v.len(),
            MAX_TEXT_LENGTH
        ))),
        _ => Ok(()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Criterion;

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn draft() -> Assessment {
        Assessment::new(
            AssessmentId(1),
            UserId(10),
            NewAssessment::titled("Radiotelephony interview"),
            at(100),
        )
        .expect("create")
    }

    fn in_progress() -> Assessment {
        let mut a = draft();
        a.start(at(200)).expect("start");
        a
    }

    fn score(tenths: u32) -> Score {
        Score::from_tenths(tenths).expect("score")
    }

    #[test]
    fn new_assessment_is_draft() {
        let a = draft();
        assert_eq!(a.status, AssessmentStatus::Draft);
        assert_eq!(a.progress, 0);
        assert_eq!(a.overall_score, None);
        assert_eq!(a.created_at, at(100));
        assert!(!a.is_scored());
    }

    #[test]
    fn title_is_required_and_bounded() {
        let empty = Assessment::new(
            AssessmentId(1),
            UserId(1),
            NewAssessment::titled("  "),
            at(0),
        );
        assert!(matches!(empty, Err(EpsimError::InvalidInput(_))));

        let long = "x".repeat(MAX_TITLE_LENGTH + 1);
        let too_long = Assessment::new(
            AssessmentId(1),
            UserId(1),
            NewAssessment::titled(long),
            at(0),
        );
        assert!(matches!(too_long, Err(EpsimError::InvalidInput(_))));
    }

    #[test]
    fn zero_time_limit_rejected() {
        let input = NewAssessment {
            time_limit_minutes: Some(0),
            ..NewAssessment::titled("t")
        };
        assert!(Assessment::new(AssessmentId(1), UserId(1), input, at(0)).is_err());
    }

    #[test]
    fn add_question_returns_index() {
        let mut a = draft();
        let first = a
            .add_question(
                NewQuestion::new(QuestionType::OralResponse, "Describe your last flight"),
                at(150),
            )
            .expect("add");
        let second = a
            .add_question(
                NewQuestion::new(QuestionType::Scenario, "Engine failure on climb-out"),
                at(160),
            )
            .expect("add");
        assert_eq!((first, second), (0, 1));
        assert_eq!(a.updated_at, at(160));
    }

    #[test]
    fn multiple_choice_needs_options() {
        let mut a = draft();
        let result = a.add_question(
            NewQuestion::new(QuestionType::MultipleChoice, "Pick one"),
            at(150),
        );
        assert!(matches!(result, Err(EpsimError::InvalidInput(_))));

        let mut q = NewQuestion::new(QuestionType::MultipleChoice, "Pick one");
        q.options = vec!["wilco".into(), "roger".into()];
        q.correct_answer = Some("affirm".into());
        assert!(a.add_question(q, at(150)).is_err());
    }

    #[test]
    fn recording_links_question() {
        let mut a = draft();
        let q = a
            .add_question(
                NewQuestion::new(QuestionType::OralResponse, "Read back the clearance"),
                at(150),
            )
            .expect("add");
        let mut rec = NewRecording::new("uploads/a1.wav", "a1.wav", 12_000);
        rec.question = Some(q);
        let r = a.add_recording(rec, at(160)).expect("add recording");

        assert_eq!(a.questions[q].audio_recording, Some(r));
        assert_eq!(a.questions[q].audio_duration_ms, Some(12_000));
        assert_eq!(a.recordings[r].language, "en");
        assert_eq!(a.recordings[r].channels, 1);
    }

    #[test]
    fn recording_for_missing_question_rejected() {
        let mut a = draft();
        let mut rec = NewRecording::new("uploads/a1.wav", "a1.wav", 1_000);
        rec.question = Some(3);
        assert!(matches!(
            a.add_recording(rec, at(150)),
            Err(EpsimError::QuestionNotFound { index: 3, .. })
        ));
    }

    #[test]
    fn scores_rejected_in_draft() {
        let mut a = draft();
        let result = a.set_scores(&ScoreSheet::new(), at(150));
        assert!(matches!(
            result,
            Err(EpsimError::InvalidTransition {
                from: AssessmentStatus::Draft,
                action: LifecycleAction::Score
            })
        ));
    }

    #[test]
    fn full_sheet_derives_overall_and_level() {
        let mut a = in_progress();
        let mut sheet = ScoreSheet::new();
        for c in Criterion::ALL {
            sheet.set(c, Some(score(40)));
        }
        sheet.set(Criterion::Fluency, Some(score(50)));
        a.set_scores(&sheet, at(300)).expect("scores");

        // (4*5 + 5) / 6 = 4.1666 -> 4.2
        assert_eq!(a.overall_score, Some(score(42)));
        assert_eq!(a.icao_level, Some(IcaoLevel::Operational));
        assert!(a.is_scored());
    }

    #[test]
    fn question_scores_used_until_sheet_complete() {
        let mut a = draft();
        a.add_question(NewQuestion::new(QuestionType::ShortAnswer, "Q1"), at(110)).expect("q1");
        a.add_question(NewQuestion::new(QuestionType::ShortAnswer, "Q2"), at(110)).expect("q2");
        a.start(at(200)).expect("start");

        a.score_question(0, score(30), Some("hesitant".into()), at(210)).expect("score");
        a.score_question(1, score(40), None, at(220)).expect("score");
        assert_eq!(a.overall_score, Some(score(35)));
        assert_eq!(a.icao_level, Some(IcaoLevel::Operational));
        assert_eq!(a.questions[0].feedback.as_deref(), Some("hesitant"));
        assert!(!a.is_scored());

        let mut sheet = ScoreSheet::new();
        for c in Criterion::ALL {
            sheet.set(c, Some(score(20)));
        }
        a.set_scores(&sheet, at(230)).expect("scores");
        assert_eq!(a.overall_score, Some(score(20)));
        assert_eq!(a.icao_level, Some(IcaoLevel::Elementary));
    }

    #[test]
    fn question_mean_replaces_sheet_on_calculation() {
        let mut a = draft();
        a.add_question(NewQuestion::new(QuestionType::ShortAnswer, "Q1"), at(110)).expect("q1");
        a.start(at(200)).expect("start");

        let mut sheet = ScoreSheet::new();
        for c in Criterion::ALL {
            sheet.set(c, Some(score(20)));
        }
        a.set_scores(&sheet, at(210)).expect("scores");
        a.score_question(0, score(50), None, at(220)).expect("score");
        assert_eq!(a.overall_score, Some(score(20)));

        assert_eq!(a.calculate_question_scores(at(230)), Some(score(50)));
        assert_eq!(a.icao_level, Some(IcaoLevel::Extended));
        assert_eq!(a.updated_at, at(230));
    }

    #[test]
    fn calculation_without_scored_questions_keeps_overall() {
        let mut a = in_progress();
        let mut sheet = ScoreSheet::new();
        for c in Criterion::ALL {
            sheet.set(c, Some(score(30)));
        }
        a.set_scores(&sheet, at(210)).expect("scores");

        assert_eq!(a.calculate_question_scores(at(220)), Some(score(30)));
        assert_eq!(a.icao_level, Some(IcaoLevel::PreOperational));
        assert_eq!(a.updated_at, at(210));
    }

    #[test]
    fn score_missing_question() {
        let mut a = in_progress();
        assert!(matches!(
            a.score_question(0, score(30), None, at(210)),
            Err(EpsimError::QuestionNotFound { index: 0, .. })
        ));
    }

    #[test]
    fn progress_only_in_progress() {
        let mut a = draft();
        assert!(a.set_progress(50, at(150)).is_err());

        let mut a = in_progress();
        a.set_progress(50, at(250)).expect("progress");
        assert_eq!(a.progress, 50);
        assert!(a.set_progress(101, at(260)).is_err());
    }

    #[test]
    fn notes_merge_keeps_existing_fields() {
        let mut a = in_progress();
        a.set_notes(
            ExaminerNotes {
                strengths: Some("clear phraseology".into()),
                ..ExaminerNotes::default()
            },
            at(300),
        )
        .expect("notes");
        a.set_notes(
            ExaminerNotes {
                feedback: Some("work on fluency".into()),
                ..ExaminerNotes::default()
            },
            at(310),
        )
        .expect("notes");
        assert_eq!(a.notes.strengths.as_deref(), Some("clear phraseology"));
        assert_eq!(a.notes.feedback.as_deref(), Some("work on fluency"));
    }

    #[test]
    fn answers_only_while_in_progress() {
        let mut a = draft();
        a.add_question(NewQuestion::new(QuestionType::ShortAnswer, "Q1"), at(110)).expect("q1");
        assert!(a.answer_question(0, "cleared to land".into(), at(120)).is_err());
        a.start(at(200)).expect("start");
        a.answer_question(0, "cleared to land".into(), at(210)).expect("answer");
        assert_eq!(a.questions[0].answer.as_deref(), Some("cleared to land"));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in AssessmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AssessmentStatus>().expect("parse"), status);
        }
        assert!("finished".parse::<AssessmentStatus>().is_err());
    }
}
