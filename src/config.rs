//! Configuration system for seatwatch.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Command-line flags (applied by the binary, highest priority)
//! 2. Environment variables
//! 3. `seatwatch.toml` file (or the file named by `SEATWATCH_CONFIG`)
//! 4. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `SEATWATCH_INACTIVITY_DAYS` - Days without login before an account counts as inactive
//! - `SEATWATCH_PRODUCT_ID` - License product identifier (e.g. `Google-Apps`)
//! - `SEATWATCH_SKU_ID` - License SKU identifier (e.g. `1010020020`)
//! - `SEATWATCH_SKU_NAME` - Human readable SKU name, resolved through the catalog
//! - `SEATWATCH_NEVER_LOGGED_IN` - `include` or `exclude` accounts that never logged in
//! - `SEATWATCH_SKU_CATALOG` - Path to an additional SKU catalog file
//! - `SEATWATCH_DIRECTORY_URL` - Directory API base URL
//! - `SEATWATCH_CUSTOMER` - Directory customer id (default `my_customer`)
//! - `SEATWATCH_DOMAIN` - Restrict the directory query to one domain
//! - `SEATWATCH_PAGE_SIZE` - Users per directory page (1-500)
//! - `SEATWATCH_LICENSING_URL` - Licensing API base URL
//! - `SEATWATCH_CONCURRENCY` - Parallel license probes
//! - `SEATWATCH_REPORT_SINK` - `csv` or `sheets`
//! - `SEATWATCH_OUTPUT_DIR` - Directory for CSV reports
//! - `SEATWATCH_REPORT_TITLE` - Report title prefix
//! - `SEATWATCH_SHEETS_URL` - Sheets API base URL
//! - `SEATWATCH_ACCESS_TOKEN` - OAuth bearer token for the Google APIs
//! - `SEATWATCH_REQUEST_TIMEOUT_SECS` - Per-request timeout
//! - `SEATWATCH_LOGGING_ENABLED` - Enable log output
//! - `SEATWATCH_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::directory::MAX_PAGE_SIZE;
use crate::errors::{AuditError, AuditResult};
use crate::policy::NeverLoggedInPolicy;

/// Environment variable that points at an explicit config file.
pub const CONFIG_FILE_ENV: &str = "SEATWATCH_CONFIG";

/// Default inactivity threshold in days.
pub const DEFAULT_INACTIVITY_DAYS: i64 = 365;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeatwatchConfig {
    /// What to audit
    pub policy: PolicyConfig,
    /// Directory (user listing) API settings
    pub directory: DirectoryConfig,
    /// Licensing API settings
    pub licensing: LicensingConfig,
    /// Report output settings
    pub report: ReportConfig,
    /// Shared HTTP settings
    pub http: HttpConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Audit policy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Days without a login before an account is considered inactive
    pub inactivity_days: i64,
    /// License product identifier
    pub product_id: String,
    /// License SKU identifier
    pub sku_id: String,
    /// Human readable SKU name, used when `product_id`/`sku_id` are empty
    pub sku_name: Option<String>,
    /// How accounts that never logged in are treated
    pub never_logged_in: NeverLoggedInPolicy,
    /// Additional SKU catalog file merged over the built-in table
    pub sku_catalog_path: Option<PathBuf>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            inactivity_days: DEFAULT_INACTIVITY_DAYS,
            product_id: String::new(),
            sku_id: String::new(),
            sku_name: None,
            never_logged_in: NeverLoggedInPolicy::Include,
            sku_catalog_path: None,
        }
    }
}

/// Directory API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub base_url: String,
    /// Customer id; `my_customer` means the caller's own account
    pub customer: String,
    /// When set, only users of this domain are listed
    pub domain: Option<String>,
    /// Users per page, capped at the server maximum of 500
    pub page_size: u32,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://admin.googleapis.com".to_string(),
            customer: "my_customer".to_string(),
            domain: None,
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Licensing API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LicensingConfig {
    pub base_url: String,
    /// Number of license probes in flight at once (1 = sequential)
    pub concurrency: usize,
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://licensing.googleapis.com".to_string(),
            concurrency: 8,
        }
    }
}

/// Where the report is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSinkKind {
    /// Local CSV file
    Csv,
    /// Google Sheets spreadsheet
    Sheets,
}

impl std::str::FromStr for ReportSinkKind {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportSinkKind::Csv),
            "sheets" => Ok(ReportSinkKind::Sheets),
            other => Err(AuditError::ConfigError(format!(
                "report.sink must be 'csv' or 'sheets', got '{other}'"
            ))),
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub sink: ReportSinkKind,
    /// Directory for CSV reports; defaults to the user's documents directory
    pub output_dir: Option<PathBuf>,
    /// Report title prefix; the run timestamp is appended
    pub title_prefix: String,
    pub sheets_base_url: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sink: ReportSinkKind::Csv,
            output_dir: None,
            title_prefix: "Inactive licensed users".to_string(),
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
        }
    }
}

impl ReportConfig {
    /// Directory CSV reports are written to.
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::document_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Shared HTTP settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// OAuth bearer token (use `env:VAR_NAME` to read from environment)
    pub access_token: String,
    /// Timeout applied to every individual request
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    /// Resolve the bearer token, following `env:VAR_NAME` indirection.
    ///
    /// Returns an error if no token is configured.
    pub fn resolve_access_token(&self) -> AuditResult<String> {
        let token = match self.access_token.strip_prefix("env:") {
            Some(var) => env::var(var).map_err(|_| {
                AuditError::ConfigError(format!(
                    "http.access_token refers to environment variable {var}, which is not set"
                ))
            })?,
            None => self.access_token.clone(),
        };

        if token.trim().is_empty() {
            return Err(AuditError::ConfigError(
                "http.access_token is required to talk to the Google APIs".to_string(),
            ));
        }

        Ok(token)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

fn config_error(e: config::ConfigError) -> AuditError {
    AuditError::ConfigError(e.to_string())
}

/// Read and parse an environment override.
///
/// Unset is `None`; set but unparseable is a configuration error.
fn env_parsed<T: std::str::FromStr>(name: &str, expected: &str) -> AuditResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AuditError::ConfigError(format!("{name} must be {expected}, got '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

impl SeatwatchConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `seatwatch.toml` or `$SEATWATCH_CONFIG` (optional)
    /// 3. Environment variables
    ///
    /// The result is not validated; call [`SeatwatchConfig::validate`] once
    /// command-line overrides have been applied.
    pub fn load() -> AuditResult<Self> {
        let file = env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| "seatwatch".to_string());

        let builder = Config::builder()
            .set_default("policy.inactivity_days", DEFAULT_INACTIVITY_DAYS)
            .map_err(config_error)?
            .set_default("policy.never_logged_in", "include")
            .map_err(config_error)?
            .set_default("directory.base_url", "https://admin.googleapis.com")
            .map_err(config_error)?
            .set_default("directory.customer", "my_customer")
            .map_err(config_error)?
            .set_default("directory.page_size", MAX_PAGE_SIZE as i64)
            .map_err(config_error)?
            .set_default("licensing.base_url", "https://licensing.googleapis.com")
            .map_err(config_error)?
            .set_default("licensing.concurrency", 8)
            .map_err(config_error)?
            .set_default("report.sink", "csv")
            .map_err(config_error)?
            .set_default("report.title_prefix", "Inactive licensed users")
            .map_err(config_error)?
            .set_default("report.sheets_base_url", "https://sheets.googleapis.com")
            .map_err(config_error)?
            .set_default("http.request_timeout_secs", 30)
            .map_err(config_error)?
            .set_default("logging.enabled", true)
            .map_err(config_error)?
            .set_default("logging.level", "info")
            .map_err(config_error)?
            .add_source(config::File::with_name(&file).required(false))
            .set_override_option(
                "policy.inactivity_days",
                env_parsed::<i64>("SEATWATCH_INACTIVITY_DAYS", "an integer")?,
            )
            .map_err(config_error)?
            .set_override_option("policy.product_id", env::var("SEATWATCH_PRODUCT_ID").ok())
            .map_err(config_error)?
            .set_override_option("policy.sku_id", env::var("SEATWATCH_SKU_ID").ok())
            .map_err(config_error)?
            .set_override_option("policy.sku_name", env::var("SEATWATCH_SKU_NAME").ok())
            .map_err(config_error)?
            .set_override_option(
                "policy.never_logged_in",
                env::var("SEATWATCH_NEVER_LOGGED_IN")
                    .ok()
                    .map(|v| v.to_lowercase()),
            )
            .map_err(config_error)?
            .set_override_option(
                "policy.sku_catalog_path",
                env::var("SEATWATCH_SKU_CATALOG").ok(),
            )
            .map_err(config_error)?
            .set_override_option("directory.base_url", env::var("SEATWATCH_DIRECTORY_URL").ok())
            .map_err(config_error)?
            .set_override_option("directory.customer", env::var("SEATWATCH_CUSTOMER").ok())
            .map_err(config_error)?
            .set_override_option("directory.domain", env::var("SEATWATCH_DOMAIN").ok())
            .map_err(config_error)?
            .set_override_option(
                "directory.page_size",
                env_parsed::<i64>("SEATWATCH_PAGE_SIZE", "an integer")?,
            )
            .map_err(config_error)?
            .set_override_option("licensing.base_url", env::var("SEATWATCH_LICENSING_URL").ok())
            .map_err(config_error)?
            .set_override_option(
                "licensing.concurrency",
                env_parsed::<i64>("SEATWATCH_CONCURRENCY", "an integer")?,
            )
            .map_err(config_error)?
            .set_override_option(
                "report.sink",
                env::var("SEATWATCH_REPORT_SINK")
                    .ok()
                    .map(|v| v.to_lowercase()),
            )
            .map_err(config_error)?
            .set_override_option("report.output_dir", env::var("SEATWATCH_OUTPUT_DIR").ok())
            .map_err(config_error)?
            .set_override_option("report.title_prefix", env::var("SEATWATCH_REPORT_TITLE").ok())
            .map_err(config_error)?
            .set_override_option("report.sheets_base_url", env::var("SEATWATCH_SHEETS_URL").ok())
            .map_err(config_error)?
            .set_override_option("http.access_token", env::var("SEATWATCH_ACCESS_TOKEN").ok())
            .map_err(config_error)?
            .set_override_option(
                "http.request_timeout_secs",
                env_parsed::<i64>("SEATWATCH_REQUEST_TIMEOUT_SECS", "an integer")?,
            )
            .map_err(config_error)?
            .set_override_option(
                "logging.enabled",
                env_parsed::<bool>("SEATWATCH_LOGGING_ENABLED", "true or false")?,
            )
            .map_err(config_error)?
            .set_override_option("logging.level", env::var("SEATWATCH_LOG_LEVEL").ok())
            .map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| AuditError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AuditError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    ///
    /// License identifiers are checked later, when the policy is resolved
    /// against the SKU catalog.
    pub fn validate(&self) -> AuditResult<()> {
        if self.policy.inactivity_days <= 0 {
            return Err(AuditError::ConfigError(format!(
                "policy.inactivity_days must be greater than 0, got {}",
                self.policy.inactivity_days
            )));
        }

        if self.directory.page_size == 0 || self.directory.page_size > MAX_PAGE_SIZE {
            return Err(AuditError::ConfigError(format!(
                "directory.page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.directory.page_size
            )));
        }

        if self.directory.customer.trim().is_empty() && self.directory.domain.is_none() {
            return Err(AuditError::ConfigError(
                "directory.customer cannot be empty unless directory.domain is set".to_string(),
            ));
        }

        if self.licensing.concurrency == 0 {
            return Err(AuditError::ConfigError(
                "licensing.concurrency must be greater than 0".to_string(),
            ));
        }

        if self.http.request_timeout_secs == 0 {
            return Err(AuditError::ConfigError(
                "http.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        for (key, url) in [
            ("directory.base_url", &self.directory.base_url),
            ("licensing.base_url", &self.licensing.base_url),
            ("report.sheets_base_url", &self.report.sheets_base_url),
        ] {
            if reqwest::Url::parse(url).is_err() {
                return Err(AuditError::ConfigError(format!(
                    "{key} is not a valid URL: '{url}'"
                )));
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(AuditError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SeatwatchConfig::default();
        assert_eq!(config.policy.inactivity_days, 365);
        assert_eq!(config.directory.page_size, 500);
        assert_eq!(config.report.sink, ReportSinkKind::Csv);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_days() {
        let mut config = SeatwatchConfig::default();
        config.policy.inactivity_days = 0;
        assert!(matches!(config.validate(), Err(AuditError::ConfigError(_))));

        config.policy.inactivity_days = -5;
        assert!(matches!(config.validate(), Err(AuditError::ConfigError(_))));
    }

    #[test]
    fn rejects_oversized_page() {
        let mut config = SeatwatchConfig::default();
        config.directory.page_size = 501;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = SeatwatchConfig::default();
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn sink_kind_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ReportSinkKind>().unwrap(), ReportSinkKind::Csv);
        assert_eq!(
            "sheets".parse::<ReportSinkKind>().unwrap(),
            ReportSinkKind::Sheets
        );
        assert!("xlsx".parse::<ReportSinkKind>().is_err());
    }

    #[test]
    fn literal_access_token() {
        let http = HttpConfig {
            access_token: "ya29.token".to_string(),
            request_timeout_secs: 30,
        };
        assert_eq!(http.resolve_access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn missing_access_token_is_config_error() {
        let http = HttpConfig::default();
        assert!(matches!(
            http.resolve_access_token(),
            Err(AuditError::ConfigError(_))
        ));
    }
}
