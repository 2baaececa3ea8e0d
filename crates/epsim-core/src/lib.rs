//! # epsim-core
//!
//! The assessment engine for EP-Simulator - THE LOGIC.
//!
//! This crate records and scores ICAO English-proficiency oral assessments:
//! assessment records and their lifecycle, fixed-point score aggregation,
//! audio metrics and the pronunciation heuristic, users and roles,
//! notifications, storage backends and the snapshot format.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never reads the clock; callers pass `now`
//! - Uses integer arithmetic only (scores are tenths)
//! - Reports every refusal as an `EpsimError`

// =============================================================================
// MODULES
// =============================================================================

pub mod assessment;
pub mod audio;
pub mod formats;
pub mod lifecycle;
pub mod notification;
pub mod primitives;
pub mod rating;
pub mod registry;
pub mod score;
pub mod storage;
pub mod types;
pub mod user;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{AssessmentId, EpsimError, NotificationId, Timestamp, UserId};

// =============================================================================
// RE-EXPORTS: Domain
// =============================================================================

pub use assessment::{
    Assessment, AssessmentStatus, AudioRecording, ExaminerNotes, NewAssessment, NewQuestion,
    NewRecording, Question, QuestionType, TestType,
};
pub use audio::{AudioFormat, AudioMetrics, RecordingAnalysis, pronunciation_score, word_overlap};
pub use lifecycle::{LifecycleAction, transition};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use rating::{RaterScores, parse_rater_scores};
pub use registry::{AssessmentFilter, Registry, RegistryStats, StorageBackend};
pub use score::{Criterion, IcaoLevel, Score, ScoreSheet, mean_score};
pub use storage::{Counters, MemoryStore, RecordStore, RedbStore, WriteBatch};
pub use user::{NewUser, Permission, Role, User, UserStatus};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{Snapshot, snapshot_from_bytes, snapshot_to_bytes};

#[cfg(feature = "crypto-hash")]
pub use formats::snapshot_digest;
