//! Report materialization.
//!
//! - `TabularSink` → where rows end up (CSV file, Google Sheet, memory)
//! - `ReportExporter` → renders matched users and writes them in one bulk call
//! - `csv_sink`    → local CSV files
//! - `sheets`      → Google Sheets spreadsheets

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::audit::MatchedUser;
use crate::errors::AuditResult;
use crate::logging::{log_audit_event, AuditEvent};

pub mod csv_sink;
pub mod sheets;

pub use csv_sink::CsvSink;
pub use sheets::SheetsSink;

/// Fixed header row of every report.
pub const REPORT_HEADER: [&str; 5] = ["Name", "Email", "LastLoginTime", "CreationTime", "Suspended"];

/// Rendered in the LastLoginTime column for accounts that never logged in.
pub const NEVER_LOGGED_IN: &str = "Never";

/// A created report artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetHandle {
    /// Sink-specific identifier (file path, spreadsheet id)
    pub id: String,
    /// Where a human can find the artifact
    pub locator: String,
}

/// Destination for tabular reports.
#[async_trait]
pub trait TabularSink: Send + Sync {
    async fn create(&self, title: &str) -> AuditResult<SheetHandle>;

    async fn append_header(&self, handle: &SheetHandle, columns: &[&str]) -> AuditResult<()>;

    /// Append all rows in one call.
    async fn write_rows(&self, handle: &SheetHandle, rows: &[Vec<String>]) -> AuditResult<()>;

    fn locator_of(&self, handle: &SheetHandle) -> String;
}

/// Result of the export step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// Nothing matched; no artifact was created
    NoMatches,
    /// Report written
    Created { locator: String, rows: usize },
    /// The artifact could not be created or written
    Failed { reason: String },
}

impl ExportOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ExportOutcome::Failed { .. })
    }

    pub fn locator(&self) -> Option<&str> {
        match self {
            ExportOutcome::Created { locator, .. } => Some(locator),
            _ => None,
        }
    }
}

/// RFC 3339 in UTC with millisecond precision, the directory's own format.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// One report row, in `REPORT_HEADER` order.
pub fn render_row(matched: &MatchedUser) -> Vec<String> {
    let user = &matched.user;
    vec![
        user.full_name.clone(),
        user.email.clone(),
        user.last_login_time
            .map(format_timestamp)
            .unwrap_or_else(|| NEVER_LOGGED_IN.to_string()),
        format_timestamp(user.creation_time),
        user.suspended.to_string(),
    ]
}

/// Report title for a run started at `run_started`.
pub fn report_title(prefix: &str, run_started: DateTime<Utc>) -> String {
    format!("{} {}", prefix.trim(), run_started.format("%Y-%m-%d %H:%M:%S"))
}

/// Writes matched users to a sink.
pub struct ReportExporter {
    sink: Arc<dyn TabularSink>,
    title_prefix: String,
}

impl ReportExporter {
    pub fn new(sink: Arc<dyn TabularSink>, title_prefix: impl Into<String>) -> Self {
        Self {
            sink,
            title_prefix: title_prefix.into(),
        }
    }

    /// Export the matches.
    ///
    /// An empty match list never touches the sink. Sink failures are
    /// reported in the outcome, not raised.
    pub async fn export(&self, matches: &[MatchedUser], run_started: DateTime<Utc>) -> ExportOutcome {
        if matches.is_empty() {
            log_audit_event(AuditEvent::ReportSkipped, "report", Some("no matching users"));
            return ExportOutcome::NoMatches;
        }

        let title = report_title(&self.title_prefix, run_started);
        let rows: Vec<Vec<String>> = matches.iter().map(render_row).collect();

        match self.write(&title, &rows).await {
            Ok(locator) => {
                log_audit_event(AuditEvent::ReportCreated, &locator, Some(&format!("{} rows", rows.len())));
                ExportOutcome::Created {
                    locator,
                    rows: rows.len(),
                }
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Report export failed");
                log_audit_event(AuditEvent::ExportFailed, &title, Some(&e.to_string()));
                ExportOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn write(&self, title: &str, rows: &[Vec<String>]) -> AuditResult<String> {
        let handle = self.sink.create(title).await?;
        self.sink.append_header(&handle, &REPORT_HEADER).await?;
        self.sink.write_rows(&handle, rows).await?;
        Ok(self.sink.locator_of(&handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::CandidateUser;
    use chrono::TimeZone;

    fn matched(last_login: Option<DateTime<Utc>>) -> MatchedUser {
        MatchedUser::from(CandidateUser {
            email: "a@x.com".to_string(),
            full_name: "A".to_string(),
            last_login_time: last_login,
            creation_time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            suspended: false,
        })
    }

    #[test]
    fn renders_row_in_header_order() {
        let row = render_row(&matched(Some(
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
        )));
        assert_eq!(
            row,
            vec![
                "A",
                "a@x.com",
                "2022-01-01T00:00:00.000Z",
                "2020-01-01T00:00:00.000Z",
                "false"
            ]
        );
    }

    #[test]
    fn never_logged_in_renders_marker() {
        let row = render_row(&matched(None));
        assert_eq!(row[2], NEVER_LOGGED_IN);
    }

    #[test]
    fn title_uses_run_start() {
        let started = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(
            report_title("Inactive licensed users ", started),
            "Inactive licensed users 2024-05-06 07:08:09"
        );
    }

    #[test]
    fn outcome_helpers() {
        let created = ExportOutcome::Created {
            locator: "/tmp/r.csv".into(),
            rows: 2,
        };
        assert_eq!(created.locator(), Some("/tmp/r.csv"));
        assert!(!created.is_failed());
        assert!(ExportOutcome::Failed { reason: "x".into() }.is_failed());
        assert_eq!(ExportOutcome::NoMatches.locator(), None);
    }
}
