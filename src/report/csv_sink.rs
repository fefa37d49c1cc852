//! CSV report files.
//!
//! Each report is a new file named after the report title. Existing files
//! are never overwritten.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{SheetHandle, TabularSink};
use crate::errors::{AuditError, AuditResult};

/// Numbered names tried before giving up on a title.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Writes reports as CSV files under one directory.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Turn a report title into a file name stem.
pub fn file_stem(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "report".to_string()
    } else {
        stem.to_string()
    }
}

fn encode(rows: &[Vec<String>]) -> AuditResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| AuditError::ExportError(format!("failed to encode CSV: {e}")))
}

async fn append(path: &str, bytes: &[u8]) -> AuditResult<()> {
    let mut file = OpenOptions::new().append(true).open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

#[async_trait]
impl TabularSink for CsvSink {
    async fn create(&self, title: &str) -> AuditResult<SheetHandle> {
        fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            AuditError::ExportError(format!(
                "cannot create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let stem = file_stem(title);
        let mut attempt = 1;
        let path = loop {
            let name = if attempt == 1 {
                format!("{stem}.csv")
            } else {
                format!("{stem}-{attempt}.csv")
            };
            let candidate = self.output_dir.join(name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(_) => break candidate,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AuditError::ExportError(format!(
                        "cannot create {}: {e}",
                        candidate.display()
                    )));
                }
            }
        };

        let locator = fs::canonicalize(&path).await.unwrap_or_else(|_| path.clone());

        Ok(SheetHandle {
            id: path.display().to_string(),
            locator: locator.display().to_string(),
        })
    }

    async fn append_header(&self, handle: &SheetHandle, columns: &[&str]) -> AuditResult<()> {
        let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        append(&handle.id, &encode(&[header])?).await
    }

    async fn write_rows(&self, handle: &SheetHandle, rows: &[Vec<String>]) -> AuditResult<()> {
        append(&handle.id, &encode(rows)?).await
    }

    fn locator_of(&self, handle: &SheetHandle) -> String {
        handle.locator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_from_title() {
        assert_eq!(
            file_stem("Inactive licensed users 2024-05-06 07:08:09"),
            "inactive-licensed-users-2024-05-06-07-08-09"
        );
        assert_eq!(file_stem("  ///  "), "report");
    }

    #[tokio::test]
    async fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("reports"));

        let handle = sink.create("Audit 1").await.unwrap();
        sink.append_header(&handle, &["Name", "Email"]).await.unwrap();
        sink.write_rows(
            &handle,
            &[
                vec!["Lopez, Ana".to_string(), "ana@example.com".to_string()],
                vec!["Bo".to_string(), "bo@example.com".to_string()],
            ],
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(&handle.id).unwrap();
        assert_eq!(
            content,
            "Name,Email\n\"Lopez, Ana\",ana@example.com\nBo,bo@example.com\n"
        );
        assert!(sink.locator_of(&handle).ends_with("audit-1.csv"));
    }

    #[tokio::test]
    async fn same_title_gets_numbered_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());

        let first = sink.create("Same Title").await.unwrap();
        sink.append_header(&first, &["Name"]).await.unwrap();
        let second = sink.create("Same Title").await.unwrap();
        let third = sink.create("Same Title").await.unwrap();

        assert!(first.id.ends_with("same-title.csv"));
        assert!(second.id.ends_with("same-title-2.csv"));
        assert!(third.id.ends_with("same-title-3.csv"));
        // The earlier report is left untouched.
        assert_eq!(std::fs::read_to_string(&first.id).unwrap(), "Name\n");
        assert_eq!(std::fs::read_to_string(&second.id).unwrap(), "");
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let sink = CsvSink::new(&blocker);

        let err = sink.create("Report").await.unwrap_err();
        assert!(matches!(err, AuditError::ExportError(_)));
    }
}
