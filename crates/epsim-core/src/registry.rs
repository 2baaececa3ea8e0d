//! # Registry
//!
//! The domain service over a record store.
//!
//! Every mutating operation follows the same shape: load the records it
//! touches, check the actor, apply the change in memory, then commit all
//! changed records in one [`WriteBatch`]. A failed check leaves the store
//! untouched.
//!
//! ## Storage Backends
//!
//! - `InMemory`: [`MemoryStore`] (fast, volatile unless exported)
//! - `Persistent`: [`RedbStore`] (disk-backed, ACID)

use crate::assessment::{
    Assessment, AssessmentStatus, ExaminerNotes, NewAssessment, NewQuestion, NewRecording,
    TestType,
};
use crate::audio::RecordingAnalysis;
use crate::formats::Snapshot;
use crate::lifecycle::LifecycleAction;
use crate::notification::{NewNotification, Notification, sort_recent};
use crate::primitives::{DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use crate::score::{Score, ScoreSheet};
use crate::storage::{MemoryStore, RecordStore, RedbStore, WriteBatch};
use crate::user::{NewUser, Permission, User, UserStatus, normalize_email};
use crate::{AssessmentId, EpsimError, NotificationId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// BACKEND
// =============================================================================

/// Storage backend for a registry.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory maps (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl StorageBackend {
    fn store(&self) -> &dyn RecordStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn RecordStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Criteria for listing assessments. Unset fields match everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssessmentFilter {
    pub status: Option<AssessmentStatus>,
    pub created_by: Option<UserId>,
    pub assigned_to: Option<UserId>,
    pub test_type: Option<TestType>,
}

impl AssessmentFilter {
    #[must_use]
    pub fn matches(&self, a: &Assessment) -> bool {
        self.status.is_none_or(|s| a.status == s)
            && self.created_by.is_none_or(|u| a.created_by == u)
            && self.assigned_to.is_none_or(|u| a.assigned_to == Some(u))
            && self.test_type.is_none_or(|t| a.test_type == t)
    }
}

/// Record totals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub users: usize,
    pub assessments: usize,
    pub notifications: usize,
    pub unread_notifications: usize,
    /// Assessments per status; every status is present.
    pub by_status: BTreeMap<AssessmentStatus, usize>,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug)]
pub struct Registry {
    backend: StorageBackend,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty in-memory registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_memory(MemoryStore::new())
    }

    #[must_use]
    pub fn with_memory(store: MemoryStore) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
        }
    }

    /// Open (or create) a redb-backed registry.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, EpsimError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbStore::open(path)?),
        })
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    fn store(&self) -> &dyn RecordStore {
        self.backend.store()
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), EpsimError> {
        self.backend.store_mut().commit(batch)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Register a user. Emails are unique, compared case-insensitively.
    pub fn create_user(&mut self, input: NewUser, now: Timestamp) -> Result<User, EpsimError> {
        let email = normalize_email(&input.email)?;
        if self.store().user_by_email(&email)?.is_some() {
            return Err(EpsimError::DuplicateEmail(email));
        }

        let mut counters = self.store().counters()?;
        let user = User::new(counters.allocate_user(), input, now)?;

        let mut batch = WriteBatch::new();
        batch.put_user(user.clone()).set_counters(counters);
        self.commit(batch)?;
        Ok(user)
    }

    pub fn user(&self, id: UserId) -> Result<User, EpsimError> {
        self.store()
            .user(id)?
            .ok_or(EpsimError::UserNotFound(id))
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, EpsimError> {
        self.store().user_by_email(&normalize_email(email)?)
    }

    pub fn users(&self) -> Result<Vec<User>, EpsimError> {
        self.store().users()
    }

    /// Suspend, reactivate or park an account. Admin only.
    pub fn set_user_status(
        &mut self,
        actor: UserId,
        id: UserId,
        status: UserStatus,
        now: Timestamp,
    ) -> Result<User, EpsimError> {
        self.user(actor)?.require(Permission::Admin)?;
        let mut user = self.user(id)?;
        user.set_status(status, now);

        let mut batch = WriteBatch::new();
        batch.put_user(user.clone());
        self.commit(batch)?;
        Ok(user)
    }

    /// Load an actor that is allowed to act at all.
    fn actor(&self, id: UserId) -> Result<User, EpsimError> {
        let user = self.user(id)?;
        if !user.is_active || user.status != UserStatus::Active {
            return Err(EpsimError::PermissionDenied {
                user: id,
                permission: Permission::Basic,
            });
        }
        Ok(user)
    }

    fn actor_with(&self, id: UserId, permission: Permission) -> Result<User, EpsimError> {
        let user = self.actor(id)?;
        user.require(permission)?;
        Ok(user)
    }

    fn require_participant(actor: &User, assessment: &Assessment) -> Result<(), EpsimError> {
        if actor.is_admin() || assessment.involves(actor.id) {
            Ok(())
        } else {
            Err(EpsimError::NotParticipant {
                user: actor.id,
                assessment: assessment.id,
            })
        }
    }

    // =========================================================================
    // ASSESSMENTS
    // =========================================================================

    /// Create a draft owned by `actor`.
    pub fn create_assessment(
        &mut self,
        actor: UserId,
        input: NewAssessment,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        let creator = self.actor(actor)?;
        let mut counters = self.store().counters()?;
        let assessment = Assessment::new(counters.allocate_assessment(), creator.id, input, now)?;

        let mut batch = WriteBatch::new();
        batch
            .put_assessment(assessment.clone())
            .set_counters(counters);
        self.commit(batch)?;
        Ok(assessment)
    }

    pub fn assessment(&self, id: AssessmentId) -> Result<Assessment, EpsimError> {
        self.store()
            .assessment(id)?
            .ok_or(EpsimError::AssessmentNotFound(id))
    }

    /// Assessments matching `filter`, ascending id.
    pub fn assessments(&self, filter: &AssessmentFilter) -> Result<Vec<Assessment>, EpsimError> {
        Ok(self
            .store()
            .assessments()?
            .into_iter()
            .filter(|a| filter.matches(a))
            .collect())
    }

    /// Load, check participation, mutate, commit.
    fn update_as_participant<F>(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        apply: F,
    ) -> Result<Assessment, EpsimError>
    where
        F: FnOnce(&mut Assessment) -> Result<(), EpsimError>,
    {
        let actor = self.actor(actor)?;
        let mut assessment = self.assessment(id)?;
        Self::require_participant(&actor, &assessment)?;
        apply(&mut assessment)?;
        self.save(assessment)
    }

    /// Load, check permission, mutate, commit.
    fn update_with_permission<F>(
        &mut self,
        actor: UserId,
        permission: Permission,
        id: AssessmentId,
        apply: F,
    ) -> Result<Assessment, EpsimError>
    where
        F: FnOnce(&mut Assessment) -> Result<(), EpsimError>,
    {
        self.actor_with(actor, permission)?;
        let mut assessment = self.assessment(id)?;
        apply(&mut assessment)?;
        self.save(assessment)
    }

    fn save(&mut self, assessment: Assessment) -> Result<Assessment, EpsimError> {
        let mut batch = WriteBatch::new();
        batch.put_assessment(assessment.clone());
        self.commit(batch)?;
        Ok(assessment)
    }

    /// Assign an examiner. Needs `conduct_tests`.
    pub fn assign(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        assignee: UserId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        let assignee = self.actor(assignee)?;
        self.update_with_permission(actor, Permission::ConductTests, id, |a| {
            a.assign(assignee.id, actor, now)
        })
    }

    pub fn add_question(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        question: NewQuestion,
        now: Timestamp,
    ) -> Result<(Assessment, usize), EpsimError> {
        let mut index = 0;
        let assessment = self.update_as_participant(actor, id, |a| {
            index = a.add_question(question, now)?;
            Ok(())
        })?;
        Ok((assessment, index))
    }

    pub fn answer_question(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        index: usize,
        answer: String,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_as_participant(actor, id, |a| a.answer_question(index, answer, now))
    }

    pub fn add_recording(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        recording: NewRecording,
        now: Timestamp,
    ) -> Result<(Assessment, usize), EpsimError> {
        let mut index = 0;
        let assessment = self.update_as_participant(actor, id, |a| {
            index = a.add_recording(recording, now)?;
            Ok(())
        })?;
        Ok((assessment, index))
    }

    /// Score one question. Needs `score_assessments`.
    pub fn score_question(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        index: usize,
        score: Score,
        feedback: Option<String>,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_with_permission(actor, Permission::ScoreAssessments, id, |a| {
            a.score_question(index, score, feedback, now)
        })
    }

    /// Merge ICAO sub-scores. Needs `score_assessments`.
    pub fn set_scores(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        sheet: &ScoreSheet,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_with_permission(actor, Permission::ScoreAssessments, id, |a| {
            a.set_scores(sheet, now)
        })
    }

    /// Merge examiner comments. Needs `score_assessments`.
    pub fn set_feedback(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        notes: ExaminerNotes,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_with_permission(actor, Permission::ScoreAssessments, id, |a| {
            a.set_notes(notes, now)
        })
    }

    pub fn set_progress(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        progress: u8,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_as_participant(actor, id, |a| a.set_progress(progress, now))
    }

    /// Set overall score and level to the mean of the scored questions.
    /// Needs `score_assessments`.
    pub fn calculate_question_scores(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.update_with_permission(actor, Permission::ScoreAssessments, id, |a| {
            a.require(a.status.accepts_scores(), LifecycleAction::Score)?;
            a.calculate_question_scores(now);
            Ok(())
        })
    }

    /// Check that `actor` may analyze recordings of `id` and return the
    /// assessment.
    ///
    /// Applying the pronunciation score follows the scoring rule
    /// (`score_assessments`, no participation needed). Plain analysis
    /// needs a participant or an admin.
    pub fn authorize_analysis(
        &self,
        actor: UserId,
        id: AssessmentId,
        apply_pronunciation: bool,
    ) -> Result<Assessment, EpsimError> {
        if apply_pronunciation {
            self.actor_with(actor, Permission::ScoreAssessments)?;
            return self.assessment(id);
        }
        let actor = self.actor(actor)?;
        let assessment = self.assessment(id)?;
        Self::require_participant(&actor, &assessment)?;
        Ok(assessment)
    }

    /// Store an audio pipeline result on a recording.
    pub fn record_analysis(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        index: usize,
        analysis: RecordingAnalysis,
        apply_pronunciation: bool,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        let mut assessment = self.authorize_analysis(actor, id, apply_pronunciation)?;
        assessment.record_analysis(index, analysis, apply_pronunciation, now)?;
        self.save(assessment)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub fn start(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.transition(actor, id, LifecycleAction::Start, now)
    }

    pub fn submit_for_review(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.transition(actor, id, LifecycleAction::SubmitForReview, now)
    }

    /// Complete an assessment.
    ///
    /// In the same batch: the creator's history gains the assessment, and
    /// an assignee other than the creator is notified.
    pub fn complete(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.transition(actor, id, LifecycleAction::Complete, now)
    }

    pub fn archive(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.transition(actor, id, LifecycleAction::Archive, now)
    }

    pub fn cancel(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        self.transition(actor, id, LifecycleAction::Cancel, now)
    }

    /// Apply a status transition as `actor`.
    pub fn transition(
        &mut self,
        actor: UserId,
        id: AssessmentId,
        action: LifecycleAction,
        now: Timestamp,
    ) -> Result<Assessment, EpsimError> {
        let actor = self.actor(actor)?;
        let mut assessment = self.assessment(id)?;
        Self::require_participant(&actor, &assessment)?;
        assessment.apply(action, now)?;

        let mut batch = WriteBatch::new();
        if action == LifecycleAction::Complete {
            let mut creator = self.user(assessment.created_by)?;
            creator.record_completion(assessment.id, now);
            batch.put_user(creator);

            if let Some(assignee) = assessment.assigned_to {
                if assignee != assessment.created_by {
                    let mut counters = self.store().counters()?;
                    let notice = Notification::new(
                        counters.allocate_notification(),
                        NewNotification::assessment_completed(
                            assignee,
                            assessment.id,
                            &assessment.title,
                        ),
                        now,
                    )?;
                    batch.put_notification(notice).set_counters(counters);
                }
            }
        }
        batch.put_assessment(assessment.clone());
        self.commit(batch)?;
        Ok(assessment)
    }

    // =========================================================================
    // NOTIFICATIONS
    // =========================================================================

    /// Send a notification to an existing user.
    pub fn notify(
        &mut self,
        input: NewNotification,
        now: Timestamp,
    ) -> Result<Notification, EpsimError> {
        self.user(input.recipient)?;
        let mut counters = self.store().counters()?;
        let notification = Notification::new(counters.allocate_notification(), input, now)?;

        let mut batch = WriteBatch::new();
        batch
            .put_notification(notification.clone())
            .set_counters(counters);
        self.commit(batch)?;
        Ok(notification)
    }

    /// Newest notifications for `user`.
    ///
    /// `limit` defaults to `DEFAULT_RECENT_LIMIT` and is capped at
    /// `MAX_RECENT_LIMIT`.
    pub fn notifications_for(
        &self,
        user: UserId,
        limit: Option<usize>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, EpsimError> {
        self.user(user)?;
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).min(MAX_RECENT_LIMIT);
        let mut list: Vec<Notification> = self
            .store()
            .notifications_for(user)?
            .into_iter()
            .filter(|n| !unread_only || !n.is_read)
            .collect();
        sort_recent(&mut list);
        list.truncate(limit);
        Ok(list)
    }

    pub fn unread_count(&self, user: UserId) -> Result<usize, EpsimError> {
        self.user(user)?;
        Ok(self
            .store()
            .notifications_for(user)?
            .iter()
            .filter(|n| !n.is_read)
            .count())
    }

    /// Mark a notification read. Only its recipient or an admin may.
    pub fn mark_read(
        &mut self,
        actor: UserId,
        id: NotificationId,
        now: Timestamp,
    ) -> Result<Notification, EpsimError> {
        let actor = self.actor(actor)?;
        let mut notification = self
            .store()
            .notification(id)?
            .ok_or(EpsimError::NotificationNotFound(id))?;
        if notification.recipient != actor.id && !actor.is_admin() {
            return Err(EpsimError::PermissionDenied {
                user: actor.id,
                permission: Permission::Admin,
            });
        }
        notification.mark_read(now);

        let mut batch = WriteBatch::new();
        batch.put_notification(notification.clone());
        self.commit(batch)?;
        Ok(notification)
    }

    // =========================================================================
    // REPORTING
    // =========================================================================

    /// Assessments per status, zero-filled.
    pub fn status_counts(&self) -> Result<BTreeMap<AssessmentStatus, usize>, EpsimError> {
        let mut counts: BTreeMap<AssessmentStatus, usize> =
            AssessmentStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for a in self.store().assessments()? {
            *counts.entry(a.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn stats(&self) -> Result<RegistryStats, EpsimError> {
        let notifications = self.store().notifications()?;
        Ok(RegistryStats {
            users: self.store().users()?.len(),
            assessments: self.store().assessments()?.len(),
            unread_notifications: notifications.iter().filter(|n| !n.is_read).count(),
            notifications: notifications.len(),
            by_status: self.status_counts()?,
        })
    }

    // =========================================================================
    // BACKUP
    // =========================================================================

    /// Copy every record.
    pub fn snapshot(&self) -> Result<Snapshot, EpsimError> {
        let store = self.store();
        Ok(Snapshot {
            counters: store.counters()?,
            users: store.users()?,
            assessments: store.assessments()?,
            notifications: store.notifications()?,
        })
    }

    /// Replace every record with the snapshot's, atomically.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), EpsimError> {
        snapshot.validate()?;
        let mut batch = WriteBatch::new();
        batch.replace_all = true;
        batch.set_counters(snapshot.counters);
        for user in snapshot.users {
            batch.put_user(user);
        }
        for assessment in snapshot.assessments {
            batch.put_assessment(assessment);
        }
        for notification in snapshot.notifications {
            batch.put_notification(notification);
        }
        self.commit(batch)
    }
}

// =============================================================================
// TESTS
// =============================================================================
