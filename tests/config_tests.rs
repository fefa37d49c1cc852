use std::env;
use std::fs;

use serial_test::serial;

use seatwatch::catalog::SkuCatalog;
use seatwatch::config::{ReportSinkKind, SeatwatchConfig, CONFIG_FILE_ENV};
use seatwatch::errors::AuditError;
use seatwatch::policy::{AuditPolicy, NeverLoggedInPolicy};

const OVERRIDES: &[&str] = &[
    CONFIG_FILE_ENV,
    "SEATWATCH_INACTIVITY_DAYS",
    "SEATWATCH_PRODUCT_ID",
    "SEATWATCH_SKU_ID",
    "SEATWATCH_SKU_NAME",
    "SEATWATCH_NEVER_LOGGED_IN",
    "SEATWATCH_PAGE_SIZE",
    "SEATWATCH_CONCURRENCY",
    "SEATWATCH_REPORT_SINK",
    "SEATWATCH_ACCESS_TOKEN",
    "SEATWATCH_LOG_LEVEL",
    "SEATWATCH_LOGGING_ENABLED",
];

fn clear_env() {
    for name in OVERRIDES {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn defaults_without_file_or_env() {
    clear_env();

    let config = SeatwatchConfig::load().expect("defaults should load");

    assert_eq!(config.policy.inactivity_days, 365);
    assert_eq!(config.policy.never_logged_in, NeverLoggedInPolicy::Include);
    assert_eq!(config.directory.customer, "my_customer");
    assert_eq!(config.directory.page_size, 500);
    assert_eq!(config.licensing.concurrency, 8);
    assert_eq!(config.report.sink, ReportSinkKind::Csv);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn env_overrides_defaults() {
    clear_env();
    env::set_var("SEATWATCH_INACTIVITY_DAYS", "90");
    env::set_var("SEATWATCH_PRODUCT_ID", "Google-Apps");
    env::set_var("SEATWATCH_SKU_ID", "1010020027");
    env::set_var("SEATWATCH_NEVER_LOGGED_IN", "EXCLUDE");
    env::set_var("SEATWATCH_PAGE_SIZE", "100");
    env::set_var("SEATWATCH_REPORT_SINK", "Sheets");

    let config = SeatwatchConfig::load().expect("config should load");

    assert_eq!(config.policy.inactivity_days, 90);
    assert_eq!(config.policy.product_id, "Google-Apps");
    assert_eq!(config.policy.sku_id, "1010020027");
    assert_eq!(config.policy.never_logged_in, NeverLoggedInPolicy::Exclude);
    assert_eq!(config.directory.page_size, 100);
    assert_eq!(config.report.sink, ReportSinkKind::Sheets);

    clear_env();
}

#[test]
#[serial]
fn env_wins_over_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seatwatch.toml");
    fs::write(
        &path,
        r#"
[policy]
inactivity_days = 180
sku_name = "Google Workspace Business Starter"

[licensing]
concurrency = 2

[logging]
level = "debug"
"#,
    )
    .unwrap();

    env::set_var(CONFIG_FILE_ENV, &path);
    env::set_var("SEATWATCH_CONCURRENCY", "16");

    let config = SeatwatchConfig::load().expect("config should load");

    assert_eq!(config.policy.inactivity_days, 180);
    assert_eq!(
        config.policy.sku_name.as_deref(),
        Some("Google Workspace Business Starter")
    );
    assert_eq!(config.licensing.concurrency, 16);
    assert_eq!(config.logging.level, "debug");

    let catalog = SkuCatalog::builtin().unwrap();
    let policy = AuditPolicy::from_config(&config.policy, &catalog).unwrap();
    assert_eq!(policy.product_id, "Google-Apps");
    assert_eq!(policy.sku_id, "1010020027");
    assert_eq!(policy.inactivity_days, 180);

    clear_env();
}

#[test]
#[serial]
fn invalid_values_fail_validation() {
    clear_env();
    env::set_var("SEATWATCH_INACTIVITY_DAYS", "-3");

    let config = SeatwatchConfig::load().expect("config should load");
    assert!(config.validate().is_err());

    env::set_var("SEATWATCH_INACTIVITY_DAYS", "30");
    env::set_var("SEATWATCH_LOG_LEVEL", "chatty");
    let config = SeatwatchConfig::load().expect("config should load");
    assert!(config.validate().is_err());

    clear_env();
}

#[test]
#[serial]
fn token_is_required_for_google_clients() {
    clear_env();

    let config = SeatwatchConfig::load().expect("config should load");
    assert!(config.http.resolve_access_token().is_err());

    env::set_var("SEATWATCH_ACCESS_TOKEN", "ya29.token");
    let config = SeatwatchConfig::load().expect("config should load");
    assert_eq!(config.http.resolve_access_token().unwrap(), "ya29.token");

    clear_env();
}

#[test]
#[serial]
fn unknown_sku_name_is_a_config_error() {
    clear_env();
    env::set_var("SEATWATCH_SKU_NAME", "Not A Real SKU");

    let config = SeatwatchConfig::load().expect("config should load");
    let catalog = SkuCatalog::builtin().unwrap();
    assert!(AuditPolicy::from_config(&config.policy, &catalog).is_err());

    clear_env();
}

#[test]
#[serial]
fn unparseable_numeric_override_is_rejected() {
    clear_env();
    env::set_var("SEATWATCH_INACTIVITY_DAYS", "ninety");

    match SeatwatchConfig::load() {
        Err(AuditError::ConfigError(message)) => {
            assert_eq!(
                message,
                "SEATWATCH_INACTIVITY_DAYS must be an integer, got 'ninety'"
            );
        }
        other => panic!("expected configuration error, got {other:?}"),
    }

    clear_env();
    env::set_var("SEATWATCH_CONCURRENCY", "lots");
    assert!(matches!(
        SeatwatchConfig::load(),
        Err(AuditError::ConfigError(_))
    ));

    clear_env();
    env::set_var("SEATWATCH_LOGGING_ENABLED", "sometimes");
    assert!(matches!(
        SeatwatchConfig::load(),
        Err(AuditError::ConfigError(_))
    ));

    clear_env();
}
