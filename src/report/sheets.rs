//! Google Sheets reports.
//!
//! Creates a spreadsheet per report and appends values to its first sheet
//! with `values/A1:append`, one request for the header and one for all rows.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{SheetHandle, TabularSink};
use crate::config::{HttpConfig, ReportConfig};
use crate::errors::{AuditError, AuditResult};
use crate::google::ApiClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    #[serde(default)]
    spreadsheet_url: Option<String>,
}

/// Writes reports to new Google Sheets spreadsheets.
#[derive(Debug, Clone)]
pub struct SheetsSink {
    api: ApiClient,
}

impl SheetsSink {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Build a sink from configuration.
    pub fn from_config(report: &ReportConfig, http: &HttpConfig) -> AuditResult<Self> {
        let api = ApiClient::new(
            &report.sheets_base_url,
            http.resolve_access_token()?,
            Duration::from_secs(http.request_timeout_secs),
        )?;
        Ok(Self::new(api))
    }

    async fn append_values(&self, spreadsheet_id: &str, values: serde_json::Value) -> AuditResult<()> {
        let url = self
            .api
            .endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", "A1:append"])?;

        self.api
            .send(
                self.api
                    .post(url)
                    .query(&[
                        ("valueInputOption", "RAW"),
                        ("insertDataOption", "INSERT_ROWS"),
                    ])
                    .json(&json!({ "values": values })),
            )
            .await
            .map_err(|e| AuditError::ExportError(format!("failed to append to spreadsheet: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl TabularSink for SheetsSink {
    async fn create(&self, title: &str) -> AuditResult<SheetHandle> {
        let url = self.api.endpoint(&["v4", "spreadsheets"])?;

        let resp = self
            .api
            .send(
                self.api
                    .post(url)
                    .json(&json!({ "properties": { "title": title } })),
            )
            .await
            .map_err(|e| AuditError::ExportError(format!("failed to create spreadsheet: {e}")))?;

        let created: CreatedSpreadsheet = resp.json().await.map_err(|e| {
            AuditError::ExportError(format!("failed to parse spreadsheet response: {e}"))
        })?;

        debug!(spreadsheet_id = %created.spreadsheet_id, "Spreadsheet created");

        let locator = created.spreadsheet_url.unwrap_or_else(|| {
            format!(
                "https://docs.google.com/spreadsheets/d/{}/edit",
                created.spreadsheet_id
            )
        });

        Ok(SheetHandle {
            id: created.spreadsheet_id,
            locator,
        })
    }

    async fn append_header(&self, handle: &SheetHandle, columns: &[&str]) -> AuditResult<()> {
        self.append_values(&handle.id, json!([columns])).await
    }

    async fn write_rows(&self, handle: &SheetHandle, rows: &[Vec<String>]) -> AuditResult<()> {
        self.append_values(&handle.id, json!(rows)).await
    }

    fn locator_of(&self, handle: &SheetHandle) -> String {
        handle.locator.clone()
    }
}
