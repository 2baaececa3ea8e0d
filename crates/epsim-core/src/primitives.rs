//! # Engine Primitives
//!
//! Hardcoded runtime constants for the EP-Simulator CORE.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Input limits exist so that every record has a bounded size before it
//! reaches a storage backend.

/// Magic bytes for the snapshot binary format header.
///
/// - File Header = Magic Bytes ("EPSM") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"EPSM";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// SCORING
// =============================================================================

/// Highest ICAO sub-score, in tenths (6.0).
pub const MAX_SCORE_TENTHS: u8 = 60;

/// Number of ICAO rating criteria.
pub const CRITERIA_COUNT: usize = 6;

// =============================================================================
// AUDIO ANALYSIS
// =============================================================================

/// Frame length used for silence detection, in milliseconds.
pub const ANALYSIS_FRAME_MS: u32 = 25;

/// A frame is silent when its RMS is below this fraction of the loudest
/// frame's, scaled by 10_000: 30 dB down, 10^(-30/20) = 0.0316.
pub const SILENCE_RATIO_PER_TEN_THOUSAND: u64 = 316;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for assessment and notification titles.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for a user's display name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length for an email address.
pub const MAX_EMAIL_LENGTH: usize = 255;

/// Maximum length for free-text fields (descriptions, answers, notes).
///
/// Longer values (64KB) are rejected to prevent memory exhaustion.
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum number of questions in one assessment.
pub const MAX_QUESTIONS: usize = 200;

/// Maximum number of recordings in one assessment.
pub const MAX_RECORDINGS: usize = 200;

/// Maximum number of multiple-choice options per question.
pub const MAX_OPTIONS: usize = 10;

/// Longest allowed time limit for an assessment (one day).
pub const MAX_TIME_LIMIT_MINUTES: u32 = 24 * 60;

/// Default number of notifications returned by a "recent" query.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Upper bound for a "recent" notification query.
pub const MAX_RECENT_LIMIT: usize = 100;
