//! Wall-clock access. The core never reads the clock; the app does it here.

use chrono::{DateTime, Utc};
use epsim_core::Timestamp;

/// Current time as unix seconds.
pub fn now() -> Timestamp {
    Timestamp::from_secs(Utc::now().timestamp().max(0) as u64)
}

/// RFC 3339 rendering for human-readable output.
pub fn format_timestamp(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp(ts.secs() as i64, 0)
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| ts.secs().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch() {
        assert_eq!(
            format_timestamp(Timestamp::from_secs(0)),
            "1970-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now().secs() > 1_577_836_800);
    }
}
