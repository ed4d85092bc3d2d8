//! Violeta: backend for a Spanish-speaking personal assistant.
//!
//! A model reply may carry sentinel directives (`TAREA_CMD:`,
//! `CALENDAR_CMD:`, `MEMORIA_CMD:`, `EMAIL_CMD:`). The session pipeline
//! extracts and executes them, folds the results back into the displayed
//! reply and persists everything to SQLite.

pub mod calendar;
pub mod db;
pub mod directive;
pub mod dispatch;
pub mod email;
pub mod gemini;
pub mod logging;
pub mod memory;
pub mod prompts;
pub mod session;
pub mod tasks;
pub mod tts;

use chrono::{DateTime, FixedOffset, Utc};

pub use db::Store;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use session::{AssistantSession, TurnInput, TurnResult};

/// Lima wall clock. Peru has no DST, so a fixed UTC-5 offset is exact.
pub fn lima_now() -> DateTime<FixedOffset> {
    let offset = FixedOffset::west_opt(5 * 3600).expect("static offset");
    Utc::now().with_timezone(&offset)
}

/// Timestamp for persisted rows, `YYYY-MM-DD HH:MM:SS`.
pub fn lima_timestamp() -> String {
    lima_now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Human-readable local time for the system context.
pub fn lima_display_time() -> String {
    lima_now().format("%A %d de %B del %Y, %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lima_is_five_hours_behind_utc() {
        let utc = Utc::now();
        let lima = lima_now();
        assert_eq!(lima.timestamp(), utc.timestamp());
        assert_eq!(lima.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn timestamp_format_is_sortable() {
        let ts = lima_timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
