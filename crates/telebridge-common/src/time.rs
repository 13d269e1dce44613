//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Shared primitives and utilities for the bridge runtime."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use chrono::{DateTime, TimeZone, Utc};

/// Convert integer milliseconds since the Unix epoch into a UTC timestamp.
///
/// Returns `None` when the value lies outside chrono's representable range.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Milliseconds since the Unix epoch, truncated (not rounded) from the full-precision instant.
pub fn to_epoch_millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

/// Current wall-clock time truncated to whole milliseconds, as publishers stamp envelopes.
pub fn now_millis() -> i64 {
    to_epoch_millis(Utc::now())
}
