//! # Core Type Definitions
//!
//! This module contains the shared building blocks of the assessment engine:
//! - Record identifiers (`UserId`, `AssessmentId`, `NotificationId`)
//! - The caller-supplied clock value (`Timestamp`)
//! - Error types (`EpsimError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for time offsets to prevent overflow

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

/// Identifier of a registered user (candidate, examiner or administrator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Identifier of an assessment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssessmentId(pub u64);

/// Identifier of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl std::fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assessment#{}", self.0)
    }
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification#{}", self.0)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Seconds since the Unix epoch, supplied by the caller.
///
/// The CORE never reads the system clock. The app layer passes `now` into
/// every operation that records a time, which keeps lifecycle transitions
/// reproducible in tests.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from unix seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Raw unix seconds.
    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0
    }

    /// Add whole minutes, saturating at `u64::MAX`.
    #[must_use]
    pub const fn plus_minutes(self, minutes: u32) -> Self {
        Self(self.0.saturating_add((minutes as u64).saturating_mul(60)))
    }

    /// Seconds elapsed from `earlier` to `self` (zero if `earlier` is later).
    #[must_use]
    pub const fn seconds_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the assessment engine.
///
/// - No silent failures
/// - Use `Result<T, EpsimError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum EpsimError {
    /// The requested user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The requested assessment does not exist.
    #[error("Assessment not found: {0}")]
    AssessmentNotFound(AssessmentId),

    /// The requested notification does not exist.
    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// A question index is outside the assessment's question list.
    #[error("Question {index} not found in {assessment}")]
    QuestionNotFound {
        assessment: AssessmentId,
        index: usize,
    },

    /// A recording index is outside the assessment's recording list.
    #[error("Recording {index} not found in {assessment}")]
    RecordingNotFound {
        assessment: AssessmentId,
        index: usize,
    },

    /// A lifecycle action is not allowed from the current status.
    #[error("Cannot {action} an assessment that is {from}")]
    InvalidTransition {
        from: crate::AssessmentStatus,
        action: crate::LifecycleAction,
    },

    /// A score outside 0.0..=6.0 (expressed in tenths).
    #[error("Score out of range: {0} tenths (expected 0..=60)")]
    ScoreOutOfRange(u32),

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The acting user lacks the permission for this operation.
    #[error("Permission denied: {user} lacks '{permission}'")]
    PermissionDenied {
        user: UserId,
        permission: crate::Permission,
    },

    /// The acting user neither created nor is assigned to the assessment.
    #[error("{user} is not a participant of {assessment}")]
    NotParticipant {
        user: UserId,
        assessment: AssessmentId,
    },

    /// Another user already registered this email address.
    #[error("Email already in use: {0}")]
    DuplicateEmail(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_plus_minutes() {
        let start = Timestamp::from_secs(1_000);
        assert_eq!(start.plus_minutes(30).secs(), 1_000 + 30 * 60);
    }

    #[test]
    fn timestamp_plus_minutes_saturates() {
        let late = Timestamp::from_secs(u64::MAX - 10);
        assert_eq!(late.plus_minutes(5).secs(), u64::MAX);
    }

    #[test]
    fn seconds_since_never_underflows() {
        let early = Timestamp::from_secs(10);
        let late = Timestamp::from_secs(70);
        assert_eq!(late.seconds_since(early), 60);
        assert_eq!(early.seconds_since(late), 0);
    }

    #[test]
    fn ids_display_with_kind() {
        assert_eq!(UserId(3).to_string(), "user#3");
        assert_eq!(AssessmentId(9).to_string(), "assessment#9");
        assert_eq!(NotificationId(1).to_string(), "notification#1");
    }
}
