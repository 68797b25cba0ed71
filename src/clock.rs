//! Local-time timestamps used in console output and message suffixes

use chrono::Local;

/// Default timestamp layout, e.g. `2024-01-01 12:00:00`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time formatted with [`TIMESTAMP_FORMAT`]
pub fn timestamp() -> String {
    timestamp_with(TIMESTAMP_FORMAT)
}

/// Current local time formatted with a caller-supplied `strftime` layout
pub fn timestamp_with(format: &str) -> String {
    Local::now().format(format).to_string()
}

/// Append a timestamp suffix to an outbound message: `"{message} ({time})"`
pub fn stamp_message(message: &str, time: &str) -> String {
    format!("{message} ({time})")
}
