//! User directory access.
//!
//! - `DirectoryQueryService` → paginated, timestamp-filtered user listing
//! - `google`                → Admin SDK Directory API implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AuditResult;

pub mod google;

pub use google::GoogleDirectoryClient;

/// Largest page the directory will return.
pub const MAX_PAGE_SIZE: u32 = 500;

/// An account returned by the inactivity query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUser {
    /// Primary email; unique key of the account
    pub email: String,
    pub full_name: String,
    /// `None` when the account has never logged in
    pub last_login_time: Option<DateTime<Utc>>,
    pub creation_time: DateTime<Utc>,
    pub suspended: bool,
}

/// Server-side filter for a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryFilter {
    /// Only accounts whose last login is strictly before this instant
    pub before: DateTime<Utc>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<CandidateUser>,
    /// Opaque cursor for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Paginated listing of directory accounts.
#[async_trait]
pub trait DirectoryQueryService: Send + Sync {
    async fn list_users(
        &self,
        filter: &DirectoryFilter,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AuditResult<UserPage>;
}
