//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for run start/end times.
pub type Timestamp = DateTime<Utc>;

/// Format used inside run logs and experiment announcements.
pub const LOG_STAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S%.3f";

/// Format used when a timestamp becomes part of a file name.
pub const FILE_STAMP_FORMAT: &str = "%d_%m_%Y_%H_%M_%S_%3f";

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render `ts` as `DD-MM-YYYY HH:MM:SS.mmm`.
#[must_use]
pub fn log_stamp(ts: Timestamp) -> String {
    ts.format(LOG_STAMP_FORMAT).to_string()
}

/// Render `ts` as `DD_MM_YYYY_HH_MM_SS_mmm`.
#[must_use]
pub fn file_stamp(ts: Timestamp) -> String {
    ts.format(FILE_STAMP_FORMAT).to_string()
}
