//! The inactive-and-licensed user audit.
//!
//! One run is a straight line:
//!
//! 1. **Cutoff**: `now - inactivity_days`, clock sampled once
//! 2. **Fetch**: page through the directory for accounts inactive since the cutoff
//! 3. **Filter**: keep candidates that hold the audited product/SKU
//! 4. **Export**: write the matches to a tabular sink
//!
//! Only configuration errors abort a run. A failed page truncates the
//! candidate list, a failed probe excludes one candidate, a failed export
//! loses the artifact but not the summary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use seatwatch::audit::AuditRun;
//! use seatwatch::policy::{AuditPolicy, NeverLoggedInPolicy};
//!
//! let policy = AuditPolicy::new(365, "Google-Apps", "1010020020", NeverLoggedInPolicy::Include)?;
//! let summary = AuditRun::new(directory, licensing, sink).run(&policy).await?;
//! println!("{}", summary.render_text());
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::Instrument;

use crate::cutoff::{compute_cutoff, Clock, Cutoff, SystemClock};
use crate::directory::{DirectoryQueryService, MAX_PAGE_SIZE};
use crate::errors::{AuditError, AuditResult};
use crate::licensing::EntitlementService;
use crate::logging::{generate_run_id, log_audit_event, run_span, AuditEvent};
use crate::policy::AuditPolicy;
use crate::report::{ExportOutcome, ReportExporter, TabularSink};

mod fetcher;
mod license_filter;

pub use fetcher::{FetchOutcome, InactiveUserFetcher};
pub use license_filter::{FilterOutcome, InconclusiveProbe, LicenseFilter, MatchedUser};

/// Process exit code: complete result.
pub const EXIT_OK: u8 = 0;
/// Process exit code: the run aborted for a reason other than configuration.
pub const EXIT_FAILURE: u8 = 1;
/// Process exit code: configuration error, nothing was queried.
pub const EXIT_CONFIG_ERROR: u8 = 2;
/// Process exit code: result is partial (see the summary).
pub const EXIT_PARTIAL: u8 = 3;

/// Exit code for a run that returned `Err` instead of a summary.
pub fn exit_code_for_error(error: &AuditError) -> u8 {
    match error {
        AuditError::ConfigError(_) => EXIT_CONFIG_ERROR,
        _ => EXIT_FAILURE,
    }
}

/// Everything a run found out, including what went wrong.
#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub run_id: String,
    pub policy: AuditPolicy,
    /// Catalog name of the audited SKU, when known
    pub sku_name: Option<String>,
    pub cutoff: Cutoff,
    pub candidates_fetched: usize,
    pub pages_fetched: usize,
    pub pagination_error: Option<String>,
    pub matched: Vec<MatchedUser>,
    pub confirmed_absent: usize,
    pub inconclusive: Vec<InconclusiveProbe>,
    pub export: ExportOutcome,
}

impl AuditSummary {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    /// True when every page, probe and the export succeeded.
    pub fn is_complete(&self) -> bool {
        self.pagination_error.is_none() && self.inconclusive.is_empty() && !self.export.is_failed()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_complete() {
            EXIT_OK
        } else {
            EXIT_PARTIAL
        }
    }

    /// Human readable summary for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Run:                {}\n", self.run_id));
        out.push_str(&format!(
            "License:            {} / {}",
            self.policy.product_id, self.policy.sku_id
        ));
        if let Some(name) = &self.sku_name {
            out.push_str(&format!(" ({name})"));
        }
        out.push('\n');
        out.push_str(&format!(
            "Inactive since:     {} ({} days)\n",
            self.cutoff.cutoff.format("%Y-%m-%d %H:%M:%S UTC"),
            self.policy.inactivity_days
        ));
        out.push_str(&format!(
            "Candidates fetched: {} ({} pages)\n",
            self.candidates_fetched, self.pages_fetched
        ));
        if let Some(error) = &self.pagination_error {
            out.push_str(&format!("  Pagination stopped early: {error}\n"));
        }
        out.push_str(&format!("Matched:            {}\n", self.matched_count()));
        out.push_str(&format!("Confirmed absent:   {}\n", self.confirmed_absent));
        out.push_str(&format!("Inconclusive:       {}\n", self.inconclusive.len()));
        for probe in &self.inconclusive {
            out.push_str(&format!("  {}: {}\n", probe.email, probe.reason));
        }
        match &self.export {
            ExportOutcome::NoMatches => out.push_str("Report:             none (no matches)\n"),
            ExportOutcome::Created { locator, rows } => {
                out.push_str(&format!("Report:             {locator} ({rows} rows)\n"))
            }
            ExportOutcome::Failed { reason } => {
                out.push_str(&format!("Report:             FAILED: {reason}\n"));
                for m in &self.matched {
                    out.push_str(&format!("  {} <{}>\n", m.user.full_name, m.user.email));
                }
            }
        }
        out
    }
}

/// Wires the pipeline components together for one run.
pub struct AuditRun {
    directory: Arc<dyn DirectoryQueryService>,
    entitlements: Arc<dyn EntitlementService>,
    sink: Arc<dyn TabularSink>,
    clock: Arc<dyn Clock>,
    page_size: u32,
    concurrency: usize,
    title_prefix: String,
    sku_name: Option<String>,
}

impl AuditRun {
    pub fn new(
        directory: Arc<dyn DirectoryQueryService>,
        entitlements: Arc<dyn EntitlementService>,
        sink: Arc<dyn TabularSink>,
    ) -> Self {
        Self {
            directory,
            entitlements,
            sink,
            clock: Arc::new(SystemClock),
            page_size: MAX_PAGE_SIZE,
            concurrency: 1,
            title_prefix: "Inactive licensed users".to_string(),
            sku_name: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_title_prefix(mut self, title_prefix: impl Into<String>) -> Self {
        self.title_prefix = title_prefix.into();
        self
    }

    /// Display name shown next to the product/SKU ids in the summary.
    pub fn with_sku_name(mut self, sku_name: impl Into<String>) -> Self {
        self.sku_name = Some(sku_name.into());
        self
    }

    /// Execute the audit once.
    ///
    /// Returns `Err` only for an invalid policy, before any network call.
    pub async fn run(&self, policy: &AuditPolicy) -> AuditResult<AuditSummary> {
        policy.validate()?;
        let cutoff = compute_cutoff(policy.inactivity_days, self.clock.as_ref())?;

        let run_id = generate_run_id();
        let span = run_span(&run_id);

        async move {
            log_audit_event(
                AuditEvent::RunStarted,
                &run_id,
                Some(&format!(
                    "product={} sku={} cutoff={}",
                    policy.product_id, policy.sku_id, cutoff.cutoff
                )),
            );

            let fetcher = InactiveUserFetcher::new(
                Arc::clone(&self.directory),
                self.page_size,
                policy.never_logged_in,
            );
            let fetched = fetcher.fetch_inactive_users(&cutoff).await;
            let candidates_fetched = fetched.users.len();

            let filter = LicenseFilter::new(Arc::clone(&self.entitlements), self.concurrency);
            let filtered = filter
                .filter(fetched.users, &policy.product_id, &policy.sku_id)
                .await;

            let exporter = ReportExporter::new(Arc::clone(&self.sink), self.title_prefix.clone());
            let export = exporter.export(&filtered.matched, cutoff.now).await;

            let summary = AuditSummary {
                run_id: run_id.clone(),
                policy: policy.clone(),
                sku_name: self.sku_name.clone(),
                cutoff,
                candidates_fetched,
                pages_fetched: fetched.pages_fetched,
                pagination_error: fetched.pagination_error,
                matched: filtered.matched,
                confirmed_absent: filtered.confirmed_absent,
                inconclusive: filtered.inconclusive,
                export,
            };

            log_audit_event(
                AuditEvent::RunCompleted,
                &run_id,
                Some(&format!(
                    "candidates={} matched={} inconclusive={} complete={}",
                    summary.candidates_fetched,
                    summary.matched_count(),
                    summary.inconclusive.len(),
                    summary.is_complete()
                )),
            );

            Ok(summary)
        }
        .instrument(span)
        .await
    }
}
