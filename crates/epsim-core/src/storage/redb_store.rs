//! # redb-backed Record Store
//!
//! A disk-backed store using the redb embedded database.
//!
//! Records are postcard-encoded and keyed by id. Two index tables keep
//! lookups off the record tables: email -> user id, and
//! (recipient, notification id) for per-user inbox scans. Id counters live
//! in a metadata table. Every [`WriteBatch`] is one write transaction.

use super::{Counters, RecordStore, WriteBatch, WriteOp};
use crate::assessment::Assessment;
use crate::notification::Notification;
use crate::user::User;
use crate::{AssessmentId, EpsimError, NotificationId, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// UserId(u64) -> serialized User
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Lowercase email -> UserId(u64)
const EMAILS: TableDefinition<&str, u64> = TableDefinition::new("emails");

/// AssessmentId(u64) -> serialized Assessment
const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");

/// NotificationId(u64) -> serialized Notification
const NOTIFICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("notifications");

/// (recipient, notification id) -> ()
const INBOX: TableDefinition<(u64, u64), ()> = TableDefinition::new("inbox");

/// Counter name -> next id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_USER: &str = "next_user_id";
const NEXT_ASSESSMENT: &str = "next_assessment_id";
const NEXT_NOTIFICATION: &str = "next_notification_id";

fn io_err(e: impl std::fmt::Display) -> EpsimError {
    EpsimError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, EpsimError> {
    postcard::to_allocvec(value).map_err(|e| EpsimError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EpsimError> {
    postcard::from_bytes(bytes).map_err(|e| EpsimError::DeserializationError(e.to_string()))
}

/// A disk-backed record store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EpsimError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Create every table up front so read transactions never miss one.
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(USERS).map_err(io_err)?;
            let _ = write_txn.open_table(EMAILS).map_err(io_err)?;
            let _ = write_txn.open_table(ASSESSMENTS).map_err(io_err)?;
            let _ = write_txn.open_table(NOTIFICATIONS).map_err(io_err)?;
            let _ = write_txn.open_table(INBOX).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: TableDefinition<u64, &[u8]>,
        id: u64,
    ) -> Result<Option<T>, EpsimError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(table).map_err(io_err)?;
        match table.get(id).map_err(io_err)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(
        &self,
        table: TableDefinition<u64, &[u8]>,
    ) -> Result<Vec<T>, EpsimError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(table).map_err(io_err)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }
}

impl RecordStore for RedbStore {
    fn user(&self, id: UserId) -> Result<Option<User>, EpsimError> {
        self.get(USERS, id.0)
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, EpsimError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(EMAILS).map_err(io_err)?;
            table.get(email).map_err(io_err)?.map(|v| v.value())
        };
        match id {
            Some(id) => self.get(USERS, id),
            None => Ok(None),
        }
    }

    fn users(&self) -> Result<Vec<User>, EpsimError> {
        self.scan(USERS)
    }

    fn assessment(&self, id: AssessmentId) -> Result<Option<Assessment>, EpsimError> {
        self.get(ASSESSMENTS, id.0)
    }

    fn assessments(&self) -> Result<Vec<Assessment>, EpsimError> {
        self.scan(ASSESSMENTS)
    }

    fn notification(&self, id: NotificationId) -> Result<Option<Notification>, EpsimError> {
        self.get(NOTIFICATIONS, id.0)
    }

    fn notifications(&self) -> Result<Vec<Notification>, EpsimError> {
        self.scan(NOTIFICATIONS)
    }

    fn notifications_for(&self, user: UserId) -> Result<Vec<Notification>, EpsimError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let inbox = read_txn.open_table(INBOX).map_err(io_err)?;
        let records = read_txn.open_table(NOTIFICATIONS).map_err(io_err)?;

        let mut result = Vec::new();
        for entry in inbox
            .range((user.0, 0)..=(user.0, u64::MAX))
            .map_err(io_err)?
        {
            let (key, _) = entry.map_err(io_err)?;
            let (_, id) = key.value();
            if let Some(data) = records.get(id).map_err(io_err)? {
                result.push(decode(data.value())?);
            }
        }
        Ok(result)
    }

    fn counters(&self) -> Result<Counters, EpsimError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(METADATA).map_err(io_err)?;
        let defaults = Counters::default();
        let read = |key: &str, default: u64| -> Result<u64, EpsimError> {
            Ok(table.get(key).map_err(io_err)?.map_or(default, |v| v.value()))
        };
        Ok(Counters {
            next_user: read(NEXT_USER, defaults.next_user)?,
            next_assessment: read(NEXT_ASSESSMENT, defaults.next_assessment)?,
            next_notification: read(NEXT_NOTIFICATION, defaults.next_notification)?,
        })
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<(), EpsimError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut users = write_txn.open_table(USERS).map_err(io_err)?;
            let mut emails = write_txn.open_table(EMAILS).map_err(io_err)?;
            let mut assessments = write_txn.open_table(ASSESSMENTS).map_err(io_err)?;
            let mut notifications = write_txn.open_table(NOTIFICATIONS).map_err(io_err)?;
            let mut inbox = write_txn.open_table(INBOX).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            if batch.replace_all {
                users.retain(|_, _| false).map_err(io_err)?;
                emails.retain(|_, _| false).map_err(io_err)?;
                assessments.retain(|_, _| false).map_err(io_err)?;
                notifications.retain(|_, _| false).map_err(io_err)?;
                inbox.retain(|_, _| false).map_err(io_err)?;
            }

            for op in &batch.ops {
                match op {
                    WriteOp::PutUser(user) => {
                        let bytes = encode(user)?;
                        users.insert(user.id.0, bytes.as_slice()).map_err(io_err)?;
                        emails
                            .insert(user.email.as_str(), user.id.0)
                            .map_err(io_err)?;
                    }
                    WriteOp::PutAssessment(assessment) => {
                        let bytes = encode(assessment)?;
                        assessments
                            .insert(assessment.id.0, bytes.as_slice())
                            .map_err(io_err)?;
                    }
                    WriteOp::PutNotification(notification) => {
                        let bytes = encode(notification)?;
                        notifications
                            .insert(notification.id.0, bytes.as_slice())
                            .map_err(io_err)?;
                        inbox
                            .insert((notification.recipient.0, notification.id.0), ())
                            .map_err(io_err)?;
                    }
                }
            }

            if let Some(counters) = batch.counters {
                meta.insert(NEXT_USER, counters.next_user).map_err(io_err)?;
                meta.insert(NEXT_ASSESSMENT, counters.next_assessment)
                    .map_err(io_err)?;
                meta.insert(NEXT_NOTIFICATION, counters.next_notification)
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::assessment::NewAssessment;
    use crate::notification::NewNotification;
    use crate::user::{NewUser, Role};
    use crate::Timestamp;
    use tempfile::tempdir;

    fn user(id: u64, email: &str) -> User {
        User::new(UserId(id), NewUser::new(email, "Name", Role::Examiner), Timestamp(0)).unwrap()
    }

    #[test]
    fn fresh_database_has_default_counters() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("epsim.redb")).unwrap();
        assert_eq!(store.counters().unwrap(), Counters::default());
        assert!(store.users().unwrap().is_empty());
        assert!(store.assessments().unwrap().is_empty());
    }

    #[test]
    fn records_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epsim.redb");

        {
            let mut store = RedbStore::open(&path).unwrap();
            let mut counters = Counters::default();
            let uid = counters.allocate_user();
            let aid = counters.allocate_assessment();
            let assessment =
                Assessment::new(aid, uid, NewAssessment::titled("Persisted"), Timestamp(10))
                    .unwrap();

            let mut batch = WriteBatch::new();
            batch
                .put_user(user(uid.0, "keep@x.io"))
                .put_assessment(assessment)
                .set_counters(counters);
            store.commit(batch).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.counters().unwrap().next_user, 2);
        assert_eq!(store.counters().unwrap().next_assessment, 2);
        assert_eq!(
            store.user_by_email("keep@x.io").unwrap().map(|u| u.id),
            Some(UserId(1))
        );
        let a = store.assessment(AssessmentId(1)).unwrap().unwrap();
        assert_eq!(a.title, "Persisted");
        assert!(store.assessment(AssessmentId(2)).unwrap().is_none());
    }

    #[test]
    fn inbox_range_scan() {
        let dir = tempdir().unwrap();
        let mut store = RedbStore::open(dir.path().join("epsim.redb")).unwrap();
        let mut batch = WriteBatch::new();
        for (id, to) in [(1, 7), (2, 8), (3, 7), (4, 6)] {
            let n = Notification::new(
                NotificationId(id),
                NewNotification::info(UserId(to), "Title", "Body"),
                Timestamp(id),
            )
            .unwrap();
            batch.put_notification(n);
        }
        store.commit(batch).unwrap();

        let ids: Vec<u64> = store
            .notifications_for(UserId(7))
            .unwrap()
            .iter()
            .map(|n| n.id.0)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(store.notifications().unwrap().len(), 4);
    }

    #[test]
    fn updating_a_notification_keeps_one_inbox_entry() {
        let dir = tempdir().unwrap();
        let mut store = RedbStore::open(dir.path().join("epsim.redb")).unwrap();
        let mut n = Notification::new(
            NotificationId(1),
            NewNotification::info(UserId(3), "Title", "Body"),
            Timestamp(1),
        )
        .unwrap();
        let mut batch = WriteBatch::new();
        batch.put_notification(n.clone());
        store.commit(batch).unwrap();

        n.mark_read(Timestamp(2));
        let mut batch = WriteBatch::new();
        batch.put_notification(n);
        store.commit(batch).unwrap();

        let inbox = store.notifications_for(UserId(3)).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].is_read);
    }

    #[test]
    fn replace_all_is_atomic_with_new_records() {
        let dir = tempdir().unwrap();
        let mut store = RedbStore::open(dir.path().join("epsim.redb")).unwrap();
        let mut batch = WriteBatch::new();
        batch.put_user(user(1, "old@x.io"));
        store.commit(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.replace_all = true;
        batch.put_user(user(9, "new@x.io"));
        store.commit(batch).unwrap();

        assert!(store.user_by_email("old@x.io").unwrap().is_none());
        let ids: Vec<UserId> = store.users().unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UserId(9)]);
    }
}
