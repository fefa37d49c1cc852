//! Inactive user retrieval.
//!
//! Walks the directory listing page by page with a server-side
//! "last login before cutoff" filter. Pagination is strictly sequential:
//! each page token comes from the previous response.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cutoff::Cutoff;
use crate::directory::{CandidateUser, DirectoryFilter, DirectoryQueryService, MAX_PAGE_SIZE};
use crate::logging::{log_audit_event, AuditEvent};
use crate::policy::NeverLoggedInPolicy;

/// Accounts retrieved for one run.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Candidates in page-then-intra-page order
    pub users: Vec<CandidateUser>,
    pub pages_fetched: usize,
    /// Set when a page failed and retrieval stopped early
    pub pagination_error: Option<String>,
}

impl FetchOutcome {
    pub fn is_truncated(&self) -> bool {
        self.pagination_error.is_some()
    }
}

/// Retrieves all accounts whose last login precedes the cutoff.
pub struct InactiveUserFetcher {
    directory: Arc<dyn DirectoryQueryService>,
    page_size: u32,
    never_logged_in: NeverLoggedInPolicy,
}

impl InactiveUserFetcher {
    /// `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(
        directory: Arc<dyn DirectoryQueryService>,
        page_size: u32,
        never_logged_in: NeverLoggedInPolicy,
    ) -> Self {
        Self {
            directory,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            never_logged_in,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch every inactive account.
    ///
    /// A failed page stops the walk and returns what was accumulated so far,
    /// with the failure recorded in `pagination_error`. There is no retry.
    pub async fn fetch_inactive_users(&self, cutoff: &Cutoff) -> FetchOutcome {
        let filter = DirectoryFilter {
            before: cutoff.cutoff,
        };
        let mut outcome = FetchOutcome::default();
        let mut page_token: Option<String> = None;
        // Every token handed out so far; a repeat means the listing cycles.
        let mut seen_tokens: HashSet<String> = HashSet::new();

        info!(
            cutoff = %cutoff.cutoff,
            page_size = self.page_size,
            never_logged_in = %self.never_logged_in,
            "Fetching inactive users"
        );

        loop {
            let page = match self
                .directory
                .list_users(&filter, self.page_size, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    let reason = format!("page {} failed: {e}", outcome.pages_fetched + 1);
                    log_audit_event(AuditEvent::PaginationError, "directory", Some(&reason));
                    outcome.pagination_error = Some(reason);
                    return outcome;
                }
            };

            outcome.pages_fetched += 1;
            debug!(
                page = outcome.pages_fetched,
                users = page.users.len(),
                "Directory page received"
            );

            for user in page.users {
                if self.accepts(&user, cutoff) {
                    outcome.users.push(user);
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    let reason = format!(
                        "page {} returned page token '{next}' a second time; stopping",
                        outcome.pages_fetched
                    );
                    log_audit_event(AuditEvent::PaginationError, "directory", Some(&reason));
                    outcome.pagination_error = Some(reason);
                    return outcome;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        info!(
            candidates = outcome.users.len(),
            pages = outcome.pages_fetched,
            "Inactive users fetched"
        );

        outcome
    }

    fn accepts(&self, user: &CandidateUser, cutoff: &Cutoff) -> bool {
        match user.last_login_time {
            None => {
                if self.never_logged_in == NeverLoggedInPolicy::Exclude {
                    debug!(user = %user.email, "Skipping account that never logged in");
                    return false;
                }
                true
            }
            Some(last_login) if !cutoff.is_inactive(last_login) => {
                debug!(
                    user = %user.email,
                    last_login = %last_login,
                    "Directory returned an account inside the activity window; skipping"
                );
                false
            }
            Some(_) => true,
        }
    }
}
