//! # Record Storage
//!
//! Storage backends for users, assessments and notifications.
//!
//! Reads go through the [`RecordStore`] trait. Writes are collected in a
//! [`WriteBatch`] and applied with a single [`RecordStore::commit`], so a
//! registry operation that touches several records (an assessment, its
//! creator and a notification) either lands completely or not at all.
//!
//! - [`MemoryStore`]: `BTreeMap`-backed, cloneable, volatile unless exported.
//! - [`RedbStore`]: disk-backed via redb, one write transaction per batch.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::assessment::Assessment;
use crate::notification::Notification;
use crate::user::User;
use crate::{AssessmentId, EpsimError, NotificationId, UserId};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID COUNTERS
// =============================================================================

/// Next free identifier per record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_user: u64,
    pub next_assessment: u64,
    pub next_notification: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            next_user: 1,
            next_assessment: 1,
            next_notification: 1,
        }
    }
}

impl Counters {
    pub fn allocate_user(&mut self) -> UserId {
        let id = UserId(self.next_user);
        self.next_user = self.next_user.saturating_add(1);
        id
    }

    pub fn allocate_assessment(&mut self) -> AssessmentId {
        let id = AssessmentId(self.next_assessment);
        self.next_assessment = self.next_assessment.saturating_add(1);
        id
    }

    pub fn allocate_notification(&mut self) -> NotificationId {
        let id = NotificationId(self.next_notification);
        self.next_notification = self.next_notification.saturating_add(1);
        id
    }
}

// =============================================================================
// WRITE BATCH
// =============================================================================

/// A single record write.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutUser(User),
    PutAssessment(Assessment),
    PutNotification(Notification),
}

/// Writes applied together by [`RecordStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    /// Drop every existing record before applying the writes.
    pub replace_all: bool,
    pub counters: Option<Counters>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user(&mut self, user: User) -> &mut Self {
        self.ops.push(WriteOp::PutUser(user));
        self
    }

    pub fn put_assessment(&mut self, assessment: Assessment) -> &mut Self {
        self.ops.push(WriteOp::PutAssessment(assessment));
        self
    }

    pub fn put_notification(&mut self, notification: Notification) -> &mut Self {
        self.ops.push(WriteOp::PutNotification(notification));
        self
    }

    pub fn set_counters(&mut self, counters: Counters) -> &mut Self {
        self.counters = Some(counters);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.counters.is_none() && !self.replace_all
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Read and batch-write access to stored records.
///
/// Scans return records in ascending id order.
pub trait RecordStore {
    fn user(&self, id: UserId) -> Result<Option<User>, EpsimError>;

    /// Look up by normalized (lowercase) email.
    fn user_by_email(&self, email: &str) -> Result<Option<User>, EpsimError>;

    fn users(&self) -> Result<Vec<User>, EpsimError>;

    fn assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, EpsimError>;

    fn assessments(&self) -> Result<Vec<Assessment>, EpsimError>;

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, EpsimError>;

    fn notifications(&self) -> Result<Vec<Notification>, EpsimError>;

    /// Notifications addressed to `user`, ascending id order.
    fn notifications_for(&self, user: UserId) -> Result<Vec<Notification>, EpsimError>;

    fn counters(&self) -> Result<Counters, EpsimError>;

    /// Apply every write in `batch` atomically.
    fn commit(&mut self, batch: WriteBatch) -> Result<(), EpsimError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_one() {
        let mut c = Counters::default();
        assert_eq!(c.allocate_user(), UserId(1));
        assert_eq!(c.allocate_user(), UserId(2));
        assert_eq!(c.allocate_assessment(), AssessmentId(1));
        assert_eq!(c.next_notification, 1);
    }

    #[test]
    fn empty_batch() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        batch.set_counters(Counters::default());
        assert!(!batch.is_empty());
    }
}
