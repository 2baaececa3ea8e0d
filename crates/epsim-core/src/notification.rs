//! # Notifications
//!
//! In-app messages addressed to a single user.

use crate::primitives::{MAX_TEXT_LENGTH, MAX_TITLE_LENGTH};
use crate::{AssessmentId, EpsimError, NotificationId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lowest priority.
pub const PRIORITY_LOW: u8 = 1;
/// Default priority.
pub const PRIORITY_NORMAL: u8 = 2;
/// Highest priority.
pub const PRIORITY_HIGH: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    AssessmentCompleted,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::AssessmentCompleted => "assessment_completed",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "assessment_completed" => Ok(Self::AssessmentCompleted),
            _ => Err(EpsimError::InvalidInput(format!(
                "Unknown notification kind '{}'",
                s
            ))),
        }
    }
}

/// Input for creating a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: u8,
    pub assessment: Option<AssessmentId>,
}

impl NewNotification {
    /// An informational notification at normal priority.
    #[must_use]
    pub fn info(recipient: UserId, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient,
            title: title.into(),
            message: message.into(),
            kind: NotificationKind::Info,
            priority: PRIORITY_NORMAL,
            assessment: None,
        }
    }

    /// The notice sent to an assignee when an assessment is completed.
    #[must_use]
    pub fn assessment_completed(recipient: UserId, assessment: AssessmentId, title: &str) -> Self {
        Self {
            recipient,
            title: format!("Assessment Completed: {}", title),
            message: format!("The assessment '{}' has been completed.", title),
            kind: NotificationKind::AssessmentCompleted,
            priority: PRIORITY_NORMAL,
            assessment: Some(assessment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: u8,
    pub is_read: bool,
    pub assessment: Option<AssessmentId>,
    pub created_at: Timestamp,
    pub read_at: Option<Timestamp>,
}

impl Notification {
    pub fn new(
        id: NotificationId,
        input: NewNotification,
        now: Timestamp,
    ) -> Result<Self, EpsimError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(EpsimError::InvalidInput(
                "Notification title must not be empty".to_string(),
            ));
        }
        // Completion titles embed the assessment title and may run long.
        let title: String = title.chars().take(MAX_TITLE_LENGTH).collect();
        if input.message.len() > MAX_TEXT_LENGTH {
            return Err(EpsimError::InvalidInput(format!(
                "Notification message exceeds {} bytes",
                MAX_TEXT_LENGTH
            )));
        }
        if !(PRIORITY_LOW..=PRIORITY_HIGH).contains(&input.priority) {
            return Err(EpsimError::InvalidInput(format!(
                "Priority must be {}..={}, got {}",
                PRIORITY_LOW, PRIORITY_HIGH, input.priority
            )));
        }

        Ok(Self {
            id,
            recipient: input.recipient,
            title,
            message: input.message,
            kind: input.kind,
            priority: input.priority,
            is_read: false,
            assessment: input.assessment,
            created_at: now,
            read_at: None,
        })
    }

    /// Mark as read. The first read time is kept.
    pub fn mark_read(&mut self, now: Timestamp) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(now);
        }
    }
}

/// Newest first, ties broken by id descending.
pub fn sort_recent(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
