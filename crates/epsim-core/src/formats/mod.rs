//! # Formats
//!
//! Serialized representations of the record set.

pub mod persistence;

pub use persistence::{
    MAX_SNAPSHOT_SIZE, Snapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use persistence::snapshot_digest;
