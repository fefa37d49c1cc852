//! In-memory stand-ins for the directory, licensing and report services.
//!
//! Used by the test suite and by `seatwatch --dry-run`, which seeds them from
//! a JSON fixture:
//!
//! ```json
//! {
//!   "users": [
//!     {
//!       "email": "ana@example.com",
//!       "full_name": "Ana Lopez",
//!       "last_login_time": "2022-01-01T00:00:00Z",
//!       "creation_time": "2020-01-01T00:00:00Z",
//!       "suspended": false
//!     }
//!   ],
//!   "assignments": [
//!     { "product_id": "Google-Apps", "sku_id": "1010020020", "user_id": "ana@example.com" }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::directory::{CandidateUser, DirectoryFilter, DirectoryQueryService, UserPage};
use crate::errors::{AuditError, AuditResult};
use crate::licensing::{EntitlementService, ProbeOutcome};
use crate::report::{SheetHandle, TabularSink};

fn lock_error() -> AuditError {
    AuditError::ServerError {
        status: 500,
        message: "simulator state lock poisoned".to_string(),
    }
}

#[derive(Debug)]
enum DirectoryData {
    /// Users filtered by last login and paged by the requested size
    Users(Vec<CandidateUser>),
    /// Fixed pages returned as-is, ignoring filter and page size
    Pages(Vec<Vec<CandidateUser>>),
}

/// Simulated directory listing.
///
/// Page tokens are the decimal offset (or page index) of the next page.
#[derive(Debug)]
pub struct InMemoryDirectory {
    data: DirectoryData,
    fail_on_page: Option<usize>,
    calls: AtomicUsize,
    requested_page_sizes: Mutex<Vec<u32>>,
}

impl InMemoryDirectory {
    /// Directory that applies the "last login before" filter itself.
    ///
    /// Accounts without a login match every filter, like the real service.
    pub fn new(users: Vec<CandidateUser>) -> Self {
        Self::with_data(DirectoryData::Users(users))
    }

    /// Directory that returns exactly these pages in order.
    pub fn from_pages(pages: Vec<Vec<CandidateUser>>) -> Self {
        Self::with_data(DirectoryData::Pages(pages))
    }

    fn with_data(data: DirectoryData) -> Self {
        Self {
            data,
            fail_on_page: None,
            calls: AtomicUsize::new(0),
            requested_page_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Fail the request for the given 1-based page number.
    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Number of `list_users` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Page sizes passed to `list_users`, in call order.
    pub fn requested_page_sizes(&self) -> Vec<u32> {
        self.requested_page_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }
}

fn parse_token(token: Option<&str>) -> AuditResult<usize> {
    match token {
        None => Ok(0),
        Some(t) => t.parse().map_err(|_| AuditError::ServerError {
            status: 400,
            message: format!("invalid page token '{t}'"),
        }),
    }
}

#[async_trait]
impl DirectoryQueryService for InMemoryDirectory {
    async fn list_users(
        &self,
        filter: &DirectoryFilter,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AuditResult<UserPage> {
        let page_number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requested_page_sizes
            .lock()
            .map_err(|_| lock_error())?
            .push(page_size);

        if self.fail_on_page == Some(page_number) {
            return Err(AuditError::ServerError {
                status: 503,
                message: format!("simulated failure on page {page_number}"),
            });
        }

        let position = parse_token(page_token)?;

        match &self.data {
            DirectoryData::Users(users) => {
                let matching: Vec<&CandidateUser> = users
                    .iter()
                    .filter(|u| u.last_login_time.map_or(true, |t| t < filter.before))
                    .collect();
                let size = page_size.max(1) as usize;
                let end = (position + size).min(matching.len());
                let page = matching
                    .get(position..end)
                    .unwrap_or_default()
                    .iter()
                    .map(|u| (*u).clone())
                    .collect();

                Ok(UserPage {
                    users: page,
                    next_page_token: (end < matching.len()).then(|| end.to_string()),
                })
            }
            DirectoryData::Pages(pages) => Ok(UserPage {
                users: pages.get(position).cloned().unwrap_or_default(),
                next_page_token: (position + 1 < pages.len()).then(|| (position + 1).to_string()),
            }),
        }
    }
}

/// Simulated license assignments.
#[derive(Debug, Default)]
pub struct InMemoryEntitlements {
    assignments: HashSet<(String, String, String)>,
    failures: HashMap<String, String>,
    probes: AtomicUsize,
}

impl InMemoryEntitlements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user_id` holds `product_id`/`sku_id`.
    pub fn with_assignment(mut self, product_id: &str, sku_id: &str, user_id: &str) -> Self {
        self.assignments.insert((
            product_id.to_string(),
            sku_id.to_string(),
            user_id.to_string(),
        ));
        self
    }

    /// Make every probe for `user_id` fail with `reason`.
    pub fn with_failure(mut self, user_id: &str, reason: &str) -> Self {
        self.failures.insert(user_id.to_string(), reason.to_string());
        self
    }

    /// Number of probes answered so far.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntitlementService for InMemoryEntitlements {
    async fn get_assignment(&self, product_id: &str, sku_id: &str, user_id: &str) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.failures.get(user_id) {
            return ProbeOutcome::Inconclusive(reason.clone());
        }

        let key = (
            product_id.to_string(),
            sku_id.to_string(),
            user_id.to_string(),
        );
        if self.assignments.contains(&key) {
            ProbeOutcome::Found
        } else {
            ProbeOutcome::NotFound
        }
    }
}

/// A table written to [`InMemorySink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedSheet {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Number of `write_rows` calls that went into `rows`
    pub row_writes: usize,
}

/// Simulated report destination.
#[derive(Debug, Default)]
pub struct InMemorySink {
    sheets: Mutex<Vec<RecordedSheet>>,
    failure: Option<String>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `create` always fails.
    pub fn failing(reason: &str) -> Self {
        Self {
            sheets: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
        }
    }

    /// Snapshot of every sheet created so far.
    pub fn sheets(&self) -> Vec<RecordedSheet> {
        self.sheets
            .lock()
            .map(|sheets| sheets.clone())
            .unwrap_or_default()
    }

    fn with_sheet<T>(
        &self,
        handle: &SheetHandle,
        f: impl FnOnce(&mut RecordedSheet) -> T,
    ) -> AuditResult<T> {
        let mut sheets = self.sheets.lock().map_err(|_| lock_error())?;
        let index: usize = handle
            .id
            .parse()
            .map_err(|_| AuditError::ExportError(format!("unknown sheet '{}'", handle.id)))?;
        let sheet = sheets
            .get_mut(index)
            .ok_or_else(|| AuditError::ExportError(format!("unknown sheet '{}'", handle.id)))?;
        Ok(f(sheet))
    }
}

#[async_trait]
impl TabularSink for InMemorySink {
    async fn create(&self, title: &str) -> AuditResult<SheetHandle> {
        if let Some(reason) = &self.failure {
            return Err(AuditError::ExportError(reason.clone()));
        }

        let mut sheets = self.sheets.lock().map_err(|_| lock_error())?;
        sheets.push(RecordedSheet {
            title: title.to_string(),
            ..RecordedSheet::default()
        });
        let id = (sheets.len() - 1).to_string();

        Ok(SheetHandle {
            locator: format!("memory://sheets/{id}"),
            id,
        })
    }

    async fn append_header(&self, handle: &SheetHandle, columns: &[&str]) -> AuditResult<()> {
        self.with_sheet(handle, |sheet| {
            sheet.header = columns.iter().map(|c| c.to_string()).collect();
        })
    }

    async fn write_rows(&self, handle: &SheetHandle, rows: &[Vec<String>]) -> AuditResult<()> {
        self.with_sheet(handle, |sheet| {
            sheet.rows.extend_from_slice(rows);
            sheet.row_writes += 1;
        })
    }

    fn locator_of(&self, handle: &SheetHandle) -> String {
        handle.locator.clone()
    }
}

#[derive(Debug, Deserialize)]
struct FixtureAssignment {
    product_id: String,
    sku_id: String,
    user_id: String,
}

/// Directory and license data for a dry run.
#[derive(Debug, Deserialize)]
pub struct SimFixture {
    #[serde(default)]
    users: Vec<CandidateUser>,
    #[serde(default)]
    assignments: Vec<FixtureAssignment>,
}

impl SimFixture {
    /// Read a fixture from a JSON file.
    pub async fn load(path: &Path) -> AuditResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AuditError::ConfigError(format!("cannot read fixture {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AuditError::ConfigError(format!("invalid fixture {}: {e}", path.display()))
        })
    }

    /// Build the simulated services.
    pub fn into_services(self) -> (InMemoryDirectory, InMemoryEntitlements) {
        let entitlements = self
            .assignments
            .iter()
            .fold(InMemoryEntitlements::new(), |acc, a| {
                acc.with_assignment(&a.product_id, &a.sku_id, &a.user_id)
            });
        (InMemoryDirectory::new(self.users), entitlements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn user(email: &str, year: Option<i32>) -> CandidateUser {
        CandidateUser {
            email: email.to_string(),
            full_name: email.to_string(),
            last_login_time: year.map(|y| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).unwrap()),
            creation_time: Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap(),
            suspended: false,
        }
    }

    #[tokio::test]
    async fn directory_filters_and_pages() {
        let directory = InMemoryDirectory::new(vec![
            user("a@x.com", Some(2020)),
            user("b@x.com", Some(2024)),
            user("c@x.com", None),
            user("d@x.com", Some(2021)),
        ]);
        let filter = DirectoryFilter {
            before: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        };

        let first = directory.list_users(&filter, 2, None).await.unwrap();
        assert_eq!(first.users.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = directory
            .list_users(&filter, 2, first.next_page_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.users[0].email, "d@x.com");
        assert!(second.next_page_token.is_none());
        assert_eq!(directory.calls(), 2);
    }

    #[tokio::test]
    async fn entitlements_are_tri_state() {
        let service = InMemoryEntitlements::new()
            .with_assignment("P", "S", "a@x.com")
            .with_failure("b@x.com", "timeout");

        assert_eq!(service.get_assignment("P", "S", "a@x.com").await, ProbeOutcome::Found);
        assert_eq!(
            service.get_assignment("P", "S", "b@x.com").await,
            ProbeOutcome::Inconclusive("timeout".to_string())
        );
        assert_eq!(service.get_assignment("P", "S", "c@x.com").await, ProbeOutcome::NotFound);
        assert_eq!(service.get_assignment("P", "T", "a@x.com").await, ProbeOutcome::NotFound);
        assert_eq!(service.probes(), 4);
    }

    #[tokio::test]
    async fn sink_records_tables() {
        let sink = InMemorySink::new();
        let handle = sink.create("T").await.unwrap();
        sink.append_header(&handle, &["A", "B"]).await.unwrap();
        sink.write_rows(&handle, &[vec!["1".into(), "2".into()]]).await.unwrap();

        let sheets = sink.sheets();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].header, vec!["A", "B"]);
        assert_eq!(sheets[0].rows.len(), 1);
        assert_eq!(sink.locator_of(&handle), "memory://sheets/0");
    }

    #[test]
    fn fixture_parses() {
        let json = r#"{
            "users": [{
                "email": "ana@example.com",
                "full_name": "Ana Lopez",
                "last_login_time": null,
                "creation_time": "2020-01-01T00:00:00Z",
                "suspended": false
            }],
            "assignments": [
                {"product_id": "Google-Apps", "sku_id": "1010020020", "user_id": "ana@example.com"}
            ]
        }"#;

        let fixture: SimFixture = serde_json::from_str(json).unwrap();
        let (directory, entitlements) = fixture.into_services();
        let found = tokio_test::block_on(entitlements.get_assignment(
            "Google-Apps",
            "1010020020",
            "ana@example.com",
        ));
        assert_eq!(found, ProbeOutcome::Found);
        assert_eq!(directory.calls(), 0);
    }
}
