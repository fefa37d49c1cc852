//! Seatwatch command line.
//!
//! Exit codes: 0 complete, 1 aborted, 2 configuration error, 3 partial result.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use seatwatch::audit::{exit_code_for_error, AuditRun, AuditSummary};
use seatwatch::catalog::SkuCatalog;
use seatwatch::config::{ReportSinkKind, SeatwatchConfig};
use seatwatch::directory::{DirectoryQueryService, GoogleDirectoryClient};
use seatwatch::errors::{AuditError, AuditResult};
use seatwatch::licensing::{EntitlementService, GoogleLicensingClient};
use seatwatch::logging::init_logging;
use seatwatch::policy::{AuditPolicy, NeverLoggedInPolicy};
use seatwatch::report::{CsvSink, SheetsSink, TabularSink};
use seatwatch::sim::SimFixture;

/// Find inactive accounts that still hold a license seat.
#[derive(Debug, Parser)]
#[command(name = "seatwatch", version, about)]
struct Cli {
    /// Days without login before an account counts as inactive
    #[arg(short, long)]
    days: Option<i64>,

    /// License product identifier, e.g. Google-Apps
    #[arg(long)]
    product_id: Option<String>,

    /// License SKU identifier, e.g. 1010020020
    #[arg(long)]
    sku_id: Option<String>,

    /// SKU name or id from the catalog, used when ids are not given
    #[arg(long)]
    sku_name: Option<String>,

    /// Report destination: csv or sheets
    #[arg(long)]
    sink: Option<ReportSinkKind>,

    /// Directory for CSV reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Leave out accounts that never logged in
    #[arg(long)]
    exclude_never_logged_in: bool,

    /// Parallel license lookups
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// List known SKUs and exit
    #[arg(long)]
    list_skus: bool,

    /// Run against a local JSON fixture instead of the Google APIs
    #[arg(long, env = "SEATWATCH_DRY_RUN", value_name = "FIXTURE")]
    dry_run: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut SeatwatchConfig) {
        if let Some(days) = self.days {
            config.policy.inactivity_days = days;
        }
        if let Some(product_id) = &self.product_id {
            config.policy.product_id = product_id.clone();
        }
        if let Some(sku_id) = &self.sku_id {
            config.policy.sku_id = sku_id.clone();
        }
        if let Some(sku_name) = &self.sku_name {
            config.policy.sku_name = Some(sku_name.clone());
        }
        if let Some(sink) = self.sink {
            config.report.sink = sink;
        }
        if let Some(output_dir) = &self.output_dir {
            config.report.output_dir = Some(output_dir.clone());
        }
        if self.exclude_never_logged_in {
            config.policy.never_logged_in = NeverLoggedInPolicy::Exclude;
        }
        if let Some(concurrency) = self.concurrency {
            config.licensing.concurrency = concurrency;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("seatwatch: {e}");
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

async fn run(cli: Cli) -> AuditResult<u8> {
    let mut config = SeatwatchConfig::load()?;
    cli.apply(&mut config);
    config.validate()?;
    init_logging(&config.logging)?;

    let catalog = SkuCatalog::load(config.policy.sku_catalog_path.as_deref())?;

    if cli.list_skus {
        for entry in catalog.entries() {
            println!(
                "{:<48} {:<28} {}",
                entry.name, entry.product_id, entry.sku_id
            );
        }
        return Ok(0);
    }

    let policy = AuditPolicy::from_config(&config.policy, &catalog)?;

    let directory: Arc<dyn DirectoryQueryService>;
    let entitlements: Arc<dyn EntitlementService>;
    match &cli.dry_run {
        Some(fixture) => {
            let (sim_directory, sim_entitlements) = SimFixture::load(fixture).await?.into_services();
            directory = Arc::new(sim_directory);
            entitlements = Arc::new(sim_entitlements);
        }
        None => {
            directory = Arc::new(GoogleDirectoryClient::from_config(
                &config.directory,
                &config.http,
            )?);
            entitlements = Arc::new(GoogleLicensingClient::from_config(
                &config.licensing,
                &config.http,
            )?);
        }
    }

    let sink: Arc<dyn TabularSink> = match (config.report.sink, cli.dry_run.is_some()) {
        (ReportSinkKind::Sheets, true) => {
            return Err(AuditError::ConfigError(
                "--dry-run cannot write to Google Sheets; use the csv sink".to_string(),
            ));
        }
        (ReportSinkKind::Sheets, false) => {
            Arc::new(SheetsSink::from_config(&config.report, &config.http)?)
        }
        (ReportSinkKind::Csv, _) => Arc::new(CsvSink::new(config.report.resolved_output_dir())),
    };

    let mut audit = AuditRun::new(directory, entitlements, sink)
        .with_page_size(config.directory.page_size)
        .with_concurrency(config.licensing.concurrency)
        .with_title_prefix(config.report.title_prefix.clone());
    if let Some(name) = catalog.name_of(&policy.product_id, &policy.sku_id) {
        audit = audit.with_sku_name(name);
    }
    let summary = audit.run(&policy).await?;

    print_summary(&summary, cli.json)?;
    Ok(summary.exit_code())
}

fn print_summary(summary: &AuditSummary, json: bool) -> AuditResult<()> {
    if json {
        let rendered = serde_json::to_string_pretty(summary)
            .map_err(|e| AuditError::ExportError(format!("cannot render summary: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", summary.render_text());
    }
    Ok(())
}
