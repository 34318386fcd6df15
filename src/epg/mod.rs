//! EPG (Electronic Program Guide) module
//!
//! Contains the XMLTV schedule parser, the per-channel program index and
//! related types.

mod parser;

// Re-export public types
pub use parser::{parse_xmltv_time, ProgramSlot, Schedule};

/// What to do with the timezone offset suffix of XMLTV timestamps
/// (`"20240115120000 +0100"`). Some providers publish offsets that do
/// not match the schedule contents, so both behaviors are selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetPolicy {
    /// Subtract the offset so stored timestamps are true UTC.
    #[default]
    Apply,
    /// Disregard the suffix and read the digits as UTC verbatim.
    Ignore,
}

/// Format a Unix timestamp as local time HH:MM
pub fn format_time(ts: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Format a Unix timestamp as local datetime YYYY-MM-DD HH:MM
pub fn format_datetime(ts: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => format!("@{}", ts),
    }
}
