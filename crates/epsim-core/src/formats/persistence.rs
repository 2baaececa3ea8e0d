//! # Snapshot Format
//!
//! Binary dump of every record, used by `export`/`import` and by the
//! file-backed storage mode.
//!
//! Format: Header (5 bytes) + postcard-serialized [`Snapshot`].
//! - 4 bytes: Magic ("EPSM")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is decoded. File I/O is
//! left to the app layer.

use crate::assessment::Assessment;
use crate::notification::Notification;
use crate::storage::Counters;
use crate::user::User;
use crate::{EpsimError, primitives};
use serde::{Deserialize, Serialize};

/// Largest accepted snapshot (256 MB).
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// HEADER
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), EpsimError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(EpsimError::DeserializationError(
                "Not an EP-Simulator snapshot (bad magic bytes)".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(EpsimError::DeserializationError(format!(
                "Unsupported snapshot version {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EpsimError> {
        if bytes.len() < HEADER_LEN {
            return Err(EpsimError::DeserializationError(
                "Snapshot header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Every stored record plus the id counters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub counters: Counters,
    pub users: Vec<User>,
    pub assessments: Vec<Assessment>,
    pub notifications: Vec<Notification>,
}

impl Snapshot {
    /// Check that every reference points at a record in the snapshot and
    /// that counters are ahead of every id.
    pub fn validate(&self) -> Result<(), EpsimError> {
        use std::collections::BTreeSet;

        let users: BTreeSet<u64> = self.users.iter().map(|u| u.id.0).collect();
        if users.len() != self.users.len() {
            return Err(EpsimError::InvalidInput("Duplicate user id in snapshot".to_string()));
        }
        let emails: BTreeSet<&str> = self.users.iter().map(|u| u.email.as_str()).collect();
        if emails.len() != self.users.len() {
            return Err(EpsimError::InvalidInput(
                "Duplicate email in snapshot".to_string(),
            ));
        }
        let assessments: BTreeSet<u64> = self.assessments.iter().map(|a| a.id.0).collect();
        if assessments.len() != self.assessments.len() {
            return Err(EpsimError::InvalidInput(
                "Duplicate assessment id in snapshot".to_string(),
            ));
        }

        for a in &self.assessments {
            let referenced = [Some(a.created_by), a.assigned_to, a.assigned_by];
            if let Some(missing) = referenced
                .into_iter()
                .flatten()
                .find(|u| !users.contains(&u.0))
            {
                return Err(EpsimError::InvalidInput(format!(
                    "{} references missing {}",
                    a.id, missing
                )));
            }
        }
        for n in &self.notifications {
            if !users.contains(&n.recipient.0) {
                return Err(EpsimError::InvalidInput(format!(
                    "{} references missing {}",
                    n.id, n.recipient
                )));
            }
        }

        let max_user = users.last().copied().unwrap_or(0);
        let max_assessment = assessments.last().copied().unwrap_or(0);
        let max_notification = self.notifications.iter().map(|n| n.id.0).max().unwrap_or(0);
        if self.counters.next_user <= max_user
            || self.counters.next_assessment <= max_assessment
            || self.counters.next_notification <= max_notification
        {
            return Err(EpsimError::InvalidInput(
                "Snapshot counters are behind stored ids".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode a snapshot (header + payload).
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, EpsimError> {
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| EpsimError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode and validate a snapshot.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, EpsimError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(EpsimError::DeserializationError(format!(
            "Snapshot size {} bytes exceeds maximum {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let snapshot: Snapshot = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        EpsimError::DeserializationError(format!("Failed to decode snapshot: {}", e))
    })?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// BLAKE3 digest of encoded snapshot bytes, as lowercase hex.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn snapshot_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
