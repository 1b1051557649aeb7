//! Apple Core Data timestamp conversion.
//!
//! # Responsibility
//! - Convert Core Data epoch seconds (since 2001-01-01 UTC) to calendar time.
//! - Provide the fixed human-readable format used by both output modes.
//!
//! # Invariants
//! - A missing or zero timestamp converts to `None`, never to the epoch.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Output timestamp format shared by Markdown metadata and LLM blocks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Converts Core Data epoch seconds to UTC calendar time.
///
/// Returns `None` for absent, zero, or out-of-range values; the source
/// application writes zero for "never set".
pub fn from_core_data(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    let seconds = seconds?;
    if seconds == 0.0 || !seconds.is_finite() {
        return None;
    }
    let epoch = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).single()?;
    let millis = (seconds * 1000.0) as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Formats a Core Data timestamp, or `None` when it is unset.
pub fn format_core_data(seconds: Option<f64>) -> Option<String> {
    from_core_data(seconds).map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
}
