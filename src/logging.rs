//! Structured logging for audit runs.
//!
//! This module provides:
//! - Subscriber setup driven by `[logging]` configuration
//! - A unique run ID per audit, carried on the run span
//! - Structured audit events (matches, failed probes, report results)
//!
//! Logs go to stderr so the summary on stdout stays machine readable.

use std::str::FromStr;
use tracing::{debug, info, info_span, warn, Level, Span};
use uuid::Uuid;

use crate::config::LoggingConfig;
use crate::errors::{AuditError, AuditResult};

/// Audit event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    /// Run started with a resolved policy
    RunStarted,
    /// A directory page could not be fetched; candidates were truncated
    PaginationError,
    /// Candidate holds the audited license
    CandidateMatched,
    /// Candidate confirmed to not hold the license
    ConfirmedAbsent,
    /// License lookup failed; candidate excluded
    ProbeInconclusive,
    /// Report artifact written
    ReportCreated,
    /// No matches, no artifact
    ReportSkipped,
    /// Report artifact could not be written
    ExportFailed,
    /// Run finished
    RunCompleted,
}

impl AuditEvent {
    /// Events that indicate an incomplete result.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::PaginationError | AuditEvent::ProbeInconclusive | AuditEvent::ExportFailed
        )
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditEvent::RunStarted => "run_started",
            AuditEvent::PaginationError => "pagination_error",
            AuditEvent::CandidateMatched => "candidate_matched",
            AuditEvent::ConfirmedAbsent => "confirmed_absent",
            AuditEvent::ProbeInconclusive => "probe_inconclusive",
            AuditEvent::ReportCreated => "report_created",
            AuditEvent::ReportSkipped => "report_skipped",
            AuditEvent::ExportFailed => "export_failed",
            AuditEvent::RunCompleted => "run_completed",
        };
        write!(f, "{}", s)
    }
}

/// Log an audit event.
///
/// # Arguments
///
/// * `event` - The type of audit event
/// * `subject` - What the event is about (user email, report locator, run id)
/// * `details` - Optional additional details about the event
pub fn log_audit_event(event: AuditEvent, subject: &str, details: Option<&str>) {
    let span = info_span!(
        "audit_event",
        event = %event,
        subject = %subject,
    );
    let _enter = span.enter();

    match (event, details) {
        (e, Some(d)) if e.is_failure() => warn!(reason = %d, "Audit event occurred"),
        (e, None) if e.is_failure() => warn!("Audit event occurred"),
        (AuditEvent::ConfirmedAbsent, _) => debug!("Audit event occurred"),
        (_, Some(d)) => info!(details = %d, "Audit event occurred"),
        (_, None) => info!("Audit event occurred"),
    }
}

/// Generate a new unique run ID.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span that wraps one whole audit run.
pub fn run_span(run_id: &str) -> Span {
    info_span!("audit_run", run_id = %run_id)
}

/// Install the global subscriber.
///
/// Does nothing when logging is disabled. Installing twice is not an error.
pub fn init_logging(config: &LoggingConfig) -> AuditResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let level = Level::from_str(&config.level).map_err(|_| {
        AuditError::ConfigError(format!("invalid logging.level '{}'", config.level))
    })?;

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_valid_uuid() {
        let id = generate_run_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn event_names() {
        assert_eq!(AuditEvent::ProbeInconclusive.to_string(), "probe_inconclusive");
        assert_eq!(AuditEvent::ConfirmedAbsent.to_string(), "confirmed_absent");
    }

    #[test]
    fn failure_events_are_distinct_from_absent() {
        assert!(AuditEvent::ProbeInconclusive.is_failure());
        assert!(AuditEvent::PaginationError.is_failure());
        assert!(!AuditEvent::ConfirmedAbsent.is_failure());
        assert!(!AuditEvent::ReportSkipped.is_failure());
    }

    #[test]
    fn disabled_logging_is_noop() {
        let config = LoggingConfig {
            enabled: false,
            level: "nonsense".to_string(),
        };
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn bad_level_is_rejected() {
        let config = LoggingConfig {
            enabled: true,
            level: "loud".to_string(),
        };
        assert!(init_logging(&config).is_err());
    }
}
