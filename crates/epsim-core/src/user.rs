//! # Users and Roles
//!
//! Every role carries a fixed permission set; there is no role table to
//! seed. An administrator implicitly holds every permission.

use crate::primitives::{MAX_EMAIL_LENGTH, MAX_NAME_LENGTH};
use crate::{AssessmentId, EpsimError, Timestamp, UserId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9.+_-]+@[a-zA-Z0-9._-]+\.[a-zA-Z]+$").ok());

// =============================================================================
// PERMISSIONS
// =============================================================================

/// A capability checked before a registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Admin,
    ConductTests,
    ViewReports,
    ScoreAssessments,
    TakeTests,
    Basic,
}

impl Permission {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::ConductTests => "conduct_tests",
            Self::ViewReports => "view_reports",
            Self::ScoreAssessments => "score_assessments",
            Self::TakeTests => "take_tests",
            Self::Basic => "basic",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Examiner,
    #[default]
    Candidate,
    User,
}

impl Role {
    /// Permissions granted by this role.
    #[must_use]
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::Admin => &[Permission::Admin],
            Self::Examiner => &[
                Permission::ConductTests,
                Permission::ViewReports,
                Permission::ScoreAssessments,
            ],
            Self::Candidate => &[Permission::TakeTests],
            Self::User => &[Permission::Basic],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Examiner => "examiner",
            Self::Candidate => "candidate",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "examiner" => Ok(Self::Examiner),
            "candidate" => Ok(Self::Candidate),
            "user" => Ok(Self::User),
            _ => Err(EpsimError::InvalidInput(format!("Unknown role '{}'", s))),
        }
    }
}

/// Account status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Pending,
    Suspended,
}

impl UserStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Suspended => "suspended",
        }
    }
}

impl FromStr for UserStatus {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "suspended" => Ok(Self::Suspended),
            _ => Err(EpsimError::InvalidInput(format!("Unknown user status '{}'", s))),
        }
    }
}

// =============================================================================
// USER
// =============================================================================

/// Input for registering a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization: Option<String>,
    pub role: Role,
}

impl NewUser {
    #[must_use]
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            role,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Lowercased; unique across users.
    pub email: String,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub organization: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub is_active: bool,
    /// Assessments this user created that have been completed.
    pub completed_assessments: Vec<AssessmentId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Build a user from validated input.
    pub fn new(id: UserId, input: NewUser, now: Timestamp) -> Result<Self, EpsimError> {
        let email = normalize_email(&input.email)?;
        let name = input.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(EpsimError::InvalidInput(format!(
                "Name must be 1..={} bytes",
                MAX_NAME_LENGTH
            )));
        }
        for (field, value) in [
            ("first name", &input.first_name),
            ("last name", &input.last_name),
            ("organization", &input.organization),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > MAX_NAME_LENGTH) {
                return Err(EpsimError::InvalidInput(format!(
                    "{} exceeds {} bytes",
                    field, MAX_NAME_LENGTH
                )));
            }
        }

        Ok(Self {
            id,
            email,
            name: name.to_string(),
            first_name: input.first_name,
            last_name: input.last_name,
            organization: input.organization,
            role: input.role,
            status: UserStatus::Active,
            is_active: true,
            completed_assessments: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the user currently holds `permission`.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        if !self.is_active || self.status != UserStatus::Active {
            return false;
        }
        let granted = self.role.permissions();
        granted.contains(&Permission::Admin) || granted.contains(&permission)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.can(Permission::Admin)
    }

    /// Error unless the user holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), EpsimError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(EpsimError::PermissionDenied {
                user: self.id,
                permission,
            })
        }
    }

    /// "First Last" when both parts exist, else the display name.
    #[must_use]
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            _ => self.name.clone(),
        }
    }

    /// Append to the completed history once.
    pub fn record_completion(&mut self, assessment: AssessmentId, now: Timestamp) {
        if !self.completed_assessments.contains(&assessment) {
            self.completed_assessments.push(assessment);
            self.updated_at = now;
        }
    }

    /// Change status; only `Active` keeps the account usable.
    pub fn set_status(&mut self, status: UserStatus, now: Timestamp) {
        self.status = status;
        self.is_active = status == UserStatus::Active;
        self.updated_at = now;
    }
}

/// Validate and lowercase an email address.
pub fn normalize_email(email: &str) -> Result<String, EpsimError> {
    let trimmed = email.trim();
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(EpsimError::InvalidInput(format!(
            "Email exceeds {} bytes",
            MAX_EMAIL_LENGTH
        )));
    }
    let pattern = EMAIL_PATTERN
        .as_ref()
        .ok_or_else(|| EpsimError::InvalidInput("Email pattern unavailable".to_string()))?;
    if !pattern.is_match(trimmed) {
        return Err(EpsimError::InvalidInput(format!("Invalid email '{}'", trimmed)));
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::new(
            UserId(1),
            NewUser::new("Pilot@Example.com", "Alex Doe", role),
            Timestamp::from_secs(0),
        )
        .expect("user")
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(user(Role::Candidate).email, "pilot@example.com");
    }

    #[test]
    fn email_validation() {
        for bad in ["", "no-at-sign", "a@b", "a b@c.de", "x@y.z1"] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
        assert!(normalize_email(" first.last+tag@mail.example.org ").is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let result = User::new(
            UserId(1),
            NewUser::new("a@b.co", "  ", Role::User),
            Timestamp::from_secs(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn role_permissions() {
        let examiner = user(Role::Examiner);
        assert!(examiner.can(Permission::ScoreAssessments));
        assert!(examiner.can(Permission::ConductTests));
        assert!(!examiner.can(Permission::TakeTests));

        let candidate = user(Role::Candidate);
        assert!(candidate.can(Permission::TakeTests));
        assert!(!candidate.can(Permission::ScoreAssessments));

        let plain = user(Role::User);
        assert!(plain.can(Permission::Basic));
        assert!(!plain.can(Permission::ViewReports));
    }

    #[test]
    fn admin_can_everything() {
        let admin = user(Role::Admin);
        for p in [
            Permission::ConductTests,
            Permission::ViewReports,
            Permission::ScoreAssessments,
            Permission::TakeTests,
            Permission::Basic,
        ] {
            assert!(admin.can(p));
        }
    }

    #[test]
    fn suspended_user_has_no_permissions() {
        let mut admin = user(Role::Admin);
        admin.set_status(UserStatus::Suspended, Timestamp::from_secs(5));
        assert!(!admin.is_active);
        assert!(!admin.can(Permission::Basic));
        assert!(matches!(
            admin.require(Permission::Admin),
            Err(EpsimError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn completion_history_has_no_duplicates() {
        let mut u = user(Role::Candidate);
        u.record_completion(AssessmentId(4), Timestamp::from_secs(1));
        u.record_completion(AssessmentId(4), Timestamp::from_secs(2));
        assert_eq!(u.completed_assessments, vec![AssessmentId(4)]);
        assert_eq!(u.updated_at, Timestamp::from_secs(1));
    }

    #[test]
    fn full_name_prefers_parts() {
        let mut u = user(Role::Candidate);
        assert_eq!(u.full_name(), "Alex Doe");
        u.first_name = Some("Alex".into());
        u.last_name = Some("Smith".into());
        assert_eq!(u.full_name(), "Alex Smith");
    }
}
