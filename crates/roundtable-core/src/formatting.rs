//! Formatting utilities for session and event display
//!
//! Shared by every frontend so lists, progress logs and exported reports
//! read the same everywhere.

use chrono::{DateTime, Local, Utc};

use crate::event::SessionEvent;
use crate::types::{Report, SessionId, SessionStatus};

/// Truncate a string to max characters, adding "..." if truncated
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Short badge text for a session status
pub fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "Pending",
        SessionStatus::Running => "Running",
        SessionStatus::AwaitingFeedback => "Feedback",
        SessionStatus::Completed => "Done",
        SessionStatus::Failed => "Failed",
    }
}

/// Month and day, e.g. `Mar 5`; empty when the timestamp is unknown
pub fn short_date(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.with_timezone(&Local).format("%b %-d").to_string(),
        None => String::new(),
    }
}

/// Local wall-clock time an event was observed, `HH:MM:SS`
pub fn event_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// One progress-log line: time, kind and summary
pub fn event_line(event: &SessionEvent) -> String {
    format!(
        "{}  {:<18} {}",
        event_time(event.observed_at),
        event.kind.as_str(),
        event.summary()
    )
}

/// Default file name for an exported report
pub fn report_file_name(id: &SessionId) -> String {
    format!("report-{}.md", id)
}

/// Markdown body written when a report is exported
pub fn report_markdown(report: &Report) -> String {
    let mut text = report.final_report.clone();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
