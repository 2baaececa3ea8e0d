//! # In-Memory Record Store
//!
//! Ordered maps keyed by id. Used for tests, the `file` backend (loaded
//! from and saved to a snapshot) and as the staging area for imports.

use super::{Counters, RecordStore, WriteBatch, WriteOp};
use crate::assessment::Assessment;
use crate::formats::Snapshot;
use crate::notification::Notification;
use crate::user::User;
use crate::{AssessmentId, EpsimError, NotificationId, UserId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: BTreeMap<UserId, User>,
    emails: BTreeMap<String, UserId>,
    assessments: BTreeMap<AssessmentId, Assessment>,
    notifications: BTreeMap<NotificationId, Notification>,
    counters: Counters,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self {
            counters: snapshot.counters,
            ..Self::default()
        };
        for user in snapshot.users {
            store.insert_user(user);
        }
        for assessment in snapshot.assessments {
            store.assessments.insert(assessment.id, assessment);
        }
        for notification in snapshot.notifications {
            store.notifications.insert(notification.id, notification);
        }
        store
    }

    /// Copy every record into a snapshot.
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            counters: self.counters,
            users: self.users.values().cloned().collect(),
            assessments: self.assessments.values().cloned().collect(),
            notifications: self.notifications.values().cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.assessments.is_empty() && self.notifications.is_empty()
    }

    fn insert_user(&mut self, user: User) {
        self.emails.insert(user.email.clone(), user.id);
        self.users.insert(user.id, user);
    }
}

impl RecordStore for MemoryStore {
    fn user(&self, id: UserId) -> Result<Option<User>, EpsimError> {
        Ok(self.users.get(&id).cloned())
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, EpsimError> {
        Ok(self
            .emails
            .get(email)
            .and_then(|id| self.users.get(id))
            .cloned())
    }

    fn users(&self) -> Result<Vec<User>, EpsimError> {
        Ok(self.users.values().cloned().collect())
    }

    fn assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, EpsimError> {
        Ok(self.assessments.get(&id).cloned())
    }

    fn assessments(&self) -> Result<Vec<Assessment>, EpsimError> {
        Ok(self.assessments.values().cloned().collect())
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, EpsimError> {
        Ok(self.notifications.get(&id).cloned())
    }

    fn notifications(&self) -> Result<Vec<Notification>, EpsimError> {
        Ok(self.notifications.values().cloned().collect())
    }

    fn notifications_for(&self, user: UserId) -> Result<Vec<Notification>, EpsimError> {
        Ok(self
            .notifications
            .values()
            .filter(|n| n.recipient == user)
            .cloned()
            .collect())
    }

    fn counters(&self) -> Result<Counters, EpsimError> {
        Ok(self.counters)
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), EpsimError> {
        if batch.replace_all {
            self.users.clear();
            self.emails.clear();
            self.assessments.clear();
            self.notifications.clear();
        }
        if let Some(counters) = batch.counters {
            self.counters = counters;
        }
        for op in batch.ops {
            match op {
                WriteOp::PutUser(user) => self.insert_user(user),
                WriteOp::PutAssessment(a) => {
                    self.assessments.insert(a.id, a);
                }
                WriteOp::PutNotification(n) => {
                    self.notifications.insert(n.id, n);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NewNotification;
    use crate::user::{NewUser, Role};
    use crate::Timestamp;

    fn user(id: u64, email: &str) -> User {
        User::new(UserId(id), NewUser::new(email, "Name", Role::Candidate), Timestamp(0))
            .expect("user")
    }

    #[test]
    fn commit_and_read_back() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_user(user(2, "b@x.io")).put_user(user(1, "a@x.io"));
        store.commit(batch).expect("commit");

        let ids: Vec<UserId> = store.users().expect("users").iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UserId(1), UserId(2)]);
        assert_eq!(
            store.user_by_email("b@x.io").expect("lookup").map(|u| u.id),
            Some(UserId(2))
        );
        assert!(store.user_by_email("c@x.io").expect("lookup").is_none());
    }

    #[test]
    fn notifications_filtered_by_recipient() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for (id, to) in [(1, 1), (2, 2), (3, 1)] {
            let n = Notification::new(
                NotificationId(id),
                NewNotification::info(UserId(to), "t", "m"),
                Timestamp(id),
            )
            .expect("notification");
            batch.put_notification(n);
        }
        store.commit(batch).expect("commit");
        let mine: Vec<u64> = store
            .notifications_for(UserId(1))
            .expect("scan")
            .iter()
            .map(|n| n.id.0)
            .collect();
        assert_eq!(mine, vec![1, 3]);
    }

    #[test]
    fn replace_all_clears_previous_records() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put_user(user(1, "a@x.io"));
        store.commit(batch).expect("commit");

        let mut replace = WriteBatch::new();
        replace.replace_all = true;
        replace.put_user(user(5, "e@x.io"));
        store.commit(replace).expect("commit");

        assert!(store.user(UserId(1)).expect("read").is_none());
        assert!(store.user_by_email("a@x.io").expect("read").is_none());
        assert!(store.user(UserId(5)).expect("read").is_some());
    }

    #[test]
    fn snapshot_round_trip_keeps_email_index() {
        let mut store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        let mut counters = Counters::default();
        let id = counters.allocate_user();
        batch.put_user(user(id.0, "a@x.io")).set_counters(counters);
        store.commit(batch).expect("commit");

        let restored = MemoryStore::from_snapshot(store.to_snapshot());
        assert_eq!(restored.counters().expect("counters").next_user, 2);
        assert!(restored.user_by_email("a@x.io").expect("lookup").is_some());
    }
}
