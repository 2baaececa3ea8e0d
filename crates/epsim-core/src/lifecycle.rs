//! # Assessment Lifecycle
//!
//! The status state machine.
//!
//! ```text
//! Draft --start--> InProgress --submit--> UnderReview
//!                      |                       |
//!                      +-------complete--------+--> Completed
//!
//! archive: any status except Archived  --> Archived
//! cancel:  Draft, InProgress, UnderReview --> Cancelled
//! ```
//!
//! A refused move is an error, never a silent no-op.

use crate::assessment::{Assessment, AssessmentStatus};
use crate::{EpsimError, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// ACTIONS
// =============================================================================

/// A guarded mutation of an assessment.
///
/// The first five variants change status; the rest are content or scoring
/// writes that the status gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Start,
    SubmitForReview,
    Complete,
    Archive,
    Cancel,
    Edit,
    Assign,
    Answer,
    Score,
    UpdateProgress,
    Analyze,
}

impl LifecycleAction {
    /// Status reached by a transition, `None` for non-transition actions.
    #[must_use]
    pub fn target(&self) -> Option<AssessmentStatus> {
        match self {
            Self::Start => Some(AssessmentStatus::InProgress),
            Self::SubmitForReview => Some(AssessmentStatus::UnderReview),
            Self::Complete => Some(AssessmentStatus::Completed),
            Self::Archive => Some(AssessmentStatus::Archived),
            Self::Cancel => Some(AssessmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Self::Start => "start",
            Self::SubmitForReview => "submit for review",
            Self::Complete => "complete",
            Self::Archive => "archive",
            Self::Cancel => "cancel",
            Self::Edit => "edit",
            Self::Assign => "assign",
            Self::Answer => "answer",
            Self::Score => "score",
            Self::UpdateProgress => "update progress of",
            Self::Analyze => "analyze recordings of",
        };
        f.write_str(verb)
    }
}

// =============================================================================
// STATUS RULES
// =============================================================================

impl AssessmentStatus {
    /// Whether `action` may be applied in this status.
    #[must_use]
    pub fn allows(&self, action: LifecycleAction) -> bool {
        use AssessmentStatus as S;
        use LifecycleAction as A;
        match action {
            A::Start => *self == S::Draft,
            A::SubmitForReview | A::Answer | A::UpdateProgress => *self == S::InProgress,
            A::Complete | A::Score => self.accepts_scores(),
            A::Archive => *self != S::Archived,
            A::Cancel => matches!(self, S::Draft | S::InProgress | S::UnderReview),
            A::Edit => self.accepts_content(),
            A::Assign => matches!(self, S::Draft | S::InProgress | S::UnderReview),
            A::Analyze => !self.is_closed(),
        }
    }

    /// Questions and recordings can be added.
    #[must_use]
    pub fn accepts_content(&self) -> bool {
        matches!(self, Self::Draft | Self::InProgress)
    }

    /// Sub-scores and examiner text can be written.
    #[must_use]
    pub fn accepts_scores(&self) -> bool {
        matches!(self, Self::InProgress | Self::UnderReview)
    }

    /// Archived or cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Archived | Self::Cancelled)
    }
}

/// Resolve a status transition.
pub fn transition(
    from: AssessmentStatus,
    action: LifecycleAction,
) -> Result<AssessmentStatus, EpsimError> {
    match action.target() {
        Some(to) if from.allows(action) => Ok(to),
        _ => Err(EpsimError::InvalidTransition { from, action }),
    }
}

// =============================================================================
// TRANSITIONS
// =============================================================================

impl Assessment {
    /// Draft -> InProgress.
    ///
    /// Stamps `started_at`, defaults the scheduled start to `now` and sets
    /// the expiry when a time limit is configured.
    pub fn start(&mut self, now: Timestamp) -> Result<(), EpsimError> {
        self.status = transition(self.status, LifecycleAction::Start)?;
        self.started_at = Some(now);
        if self.scheduled_start_time.is_none() {
            self.scheduled_start_time = Some(now);
        }
        self.expires_at = self.time_limit_minutes.map(|limit| now.plus_minutes(limit));
        self.touch(now);
        Ok(())
    }

    /// InProgress -> UnderReview.
    pub fn submit_for_review(&mut self, now: Timestamp) -> Result<(), EpsimError> {
        self.status = transition(self.status, LifecycleAction::SubmitForReview)?;
        self.touch(now);
        Ok(())
    }

    /// InProgress | UnderReview -> Completed.
    pub fn complete(&mut self, now: Timestamp) -> Result<(), EpsimError> {
        self.status = transition(self.status, LifecycleAction::Complete)?;
        self.completed_at = Some(now);
        self.progress = 100;
        if self.overall_score.is_none() {
            self.recalculate_overall();
        }
        self.touch(now);
        Ok(())
    }

    /// Anything but Archived -> Archived.
    pub fn archive(&mut self, now: Timestamp) -> Result<(), EpsimError> {
        self.status = transition(self.status, LifecycleAction::Archive)?;
        self.touch(now);
        Ok(())
    }

    /// Draft | InProgress | UnderReview -> Cancelled.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), EpsimError> {
        self.status = transition(self.status, LifecycleAction::Cancel)?;
        self.touch(now);
        Ok(())
    }

    /// Apply a status-changing action by value.
    pub fn apply(&mut self, action: LifecycleAction, now: Timestamp) -> Result<(), EpsimError> {
        match action {
            LifecycleAction::Start => self.start(now),
            LifecycleAction::SubmitForReview => self.submit_for_review(now),
            LifecycleAction::Complete => self.complete(now),
            LifecycleAction::Archive => self.archive(now),
            LifecycleAction::Cancel => self.cancel(now),
            other => Err(EpsimError::InvalidInput(format!(
                "'{}' is not a status transition",
                other
            ))),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::assessment::NewAssessment;
    use crate::score::{Criterion, IcaoLevel, Score, ScoreSheet};
    use crate::{AssessmentId, UserId};

    fn at(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn draft_with_limit(limit: Option<u32>) -> Assessment {
        let input = NewAssessment {
            time_limit_minutes: limit,
            ..NewAssessment::titled("Level check")
        };
        Assessment::new(AssessmentId(7), UserId(1), input, at(1_000)).expect("create")
    }

    const TRANSITIONS: [LifecycleAction; 5] = [
        LifecycleAction::Start,
        LifecycleAction::SubmitForReview,
        LifecycleAction::Complete,
        LifecycleAction::Archive,
        LifecycleAction::Cancel,
    ];

    #[test]
    fn transition_table() {
        use AssessmentStatus as S;
        use LifecycleAction as A;
        let allowed = [
            (S::Draft, A::Start, S::InProgress),
            (S::InProgress, A::SubmitForReview, S::UnderReview),
            (S::InProgress, A::Complete, S::Completed),
            (S::UnderReview, A::Complete, S::Completed),
            (S::Draft, A::Archive, S::Archived),
            (S::InProgress, A::Archive, S::Archived),
            (S::UnderReview, A::Archive, S::Archived),
            (S::Completed, A::Archive, S::Archived),
            (S::Cancelled, A::Archive, S::Archived),
            (S::Draft, A::Cancel, S::Cancelled),
            (S::InProgress, A::Cancel, S::Cancelled),
            (S::UnderReview, A::Cancel, S::Cancelled),
        ];

        for from in AssessmentStatus::ALL {
            for action in TRANSITIONS {
                let expected = allowed
                    .iter()
                    .find(|(f, a, _)| *f == from && *a == action)
                    .map(|(_, _, to)| *to);
                match (transition(from, action), expected) {
                    (Ok(to), Some(want)) => assert_eq!(to, want, "{from} {action}"),
                    (Err(EpsimError::InvalidTransition { .. }), None) => {}
                    (got, want) => panic!("{from} {action}: got {got:?}, want {want:?}"),
                }
            }
        }
    }

    #[test]
    fn non_transition_action_has_no_target() {
        assert!(transition(AssessmentStatus::InProgress, LifecycleAction::Score).is_err());
    }

    #[test]
    fn start_sets_times_and_expiry() {
        let mut a = draft_with_limit(Some(30));
        a.start(at(2_000)).expect("start");
        assert_eq!(a.status, AssessmentStatus::InProgress);
        assert_eq!(a.started_at, Some(at(2_000)));
        assert_eq!(a.scheduled_start_time, Some(at(2_000)));
        assert_eq!(a.expires_at, Some(at(2_000 + 30 * 60)));
        assert!(!a.is_expired(at(2_000 + 30 * 60)));
        assert!(a.is_expired(at(2_001 + 30 * 60)));
    }

    #[test]
    fn start_without_limit_never_expires() {
        let mut a = draft_with_limit(None);
        a.start(at(2_000)).expect("start");
        assert_eq!(a.expires_at, None);
        assert!(!a.is_expired(at(u64::MAX)));
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut a = draft_with_limit(None);
        a.start(at(2_000)).expect("start");
        let err = a.start(at(2_100)).expect_err("second start");
        assert_eq!(
            err.to_string(),
            "Cannot start an assessment that is in_progress"
        );
        assert_eq!(a.started_at, Some(at(2_000)));
    }

    #[test]
    fn complete_sets_progress_and_duration() {
        let mut a = draft_with_limit(None);
        a.start(at(2_000)).expect("start");
        a.set_progress(40, at(2_100)).expect("progress");
        a.submit_for_review(at(2_500)).expect("submit");
        a.complete(at(2_000 + 25 * 60 + 59)).expect("complete");
        assert_eq!(a.status, AssessmentStatus::Completed);
        assert_eq!(a.progress, 100);
        assert_eq!(a.duration_minutes(), Some(25));
    }

    #[test]
    fn complete_derives_overall_from_sheet() {
        let mut a = draft_with_limit(None);
        a.start(at(2_000)).expect("start");
        let mut sheet = ScoreSheet::new();
        for c in Criterion::ALL {
            sheet.set(c, Some(Score::from_tenths(50).expect("score")));
        }
        a.set_scores(&sheet, at(2_100)).expect("scores");
        a.complete(at(2_200)).expect("complete");
        assert_eq!(a.overall_score.map(Score::tenths), Some(50));
        assert_eq!(a.icao_level, Some(IcaoLevel::Extended));
        assert!(a.is_scored());
    }

    #[test]
    fn closed_assessment_rejects_writes() {
        let mut a = draft_with_limit(None);
        a.cancel(at(1_100)).expect("cancel");
        assert!(a.start(at(1_200)).is_err());
        assert!(a.set_scores(&ScoreSheet::new(), at(1_200)).is_err());
        a.archive(at(1_300)).expect("archive");
        assert!(matches!(
            a.archive(at(1_400)),
            Err(EpsimError::InvalidTransition {
                from: AssessmentStatus::Archived,
                action: LifecycleAction::Archive
            })
        ));
    }

    #[test]
    fn apply_dispatches_and_rejects_non_transitions() {
        let mut a = draft_with_limit(None);
        a.apply(LifecycleAction::Start, at(1_100)).expect("start");
        assert_eq!(a.status, AssessmentStatus::InProgress);
        assert!(matches!(
            a.apply(LifecycleAction::Edit, at(1_200)),
            Err(EpsimError::InvalidInput(_))
        ));
    }
}
