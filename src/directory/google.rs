//! Admin SDK Directory API client.
//!
//! Lists users with `GET {base}/admin/directory/v1/users` and a
//! `lastLoginTime<...` search query. Accounts that never logged in come back
//! with an epoch login timestamp; they are mapped to `last_login_time: None`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CandidateUser, DirectoryFilter, DirectoryQueryService, UserPage, MAX_PAGE_SIZE};
use crate::config::{DirectoryConfig, HttpConfig};
use crate::errors::AuditResult;
use crate::google::ApiClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsersResponse {
    #[serde(default)]
    users: Vec<DirectoryUser>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryUser {
    primary_email: String,
    #[serde(default)]
    name: Option<UserName>,
    #[serde(default)]
    last_login_time: Option<DateTime<Utc>>,
    creation_time: DateTime<Utc>,
    #[serde(default)]
    suspended: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserName {
    #[serde(default)]
    full_name: String,
}

impl From<DirectoryUser> for CandidateUser {
    fn from(user: DirectoryUser) -> Self {
        Self {
            email: user.primary_email,
            full_name: user.name.unwrap_or_default().full_name,
            // The API reports "never" as the Unix epoch.
            last_login_time: user.last_login_time.filter(|t| t.timestamp() > 0),
            creation_time: user.creation_time,
            suspended: user.suspended,
        }
    }
}

/// Where the listing is scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Customer(String),
    Domain(String),
}

/// Directory API client.
#[derive(Debug, Clone)]
pub struct GoogleDirectoryClient {
    api: ApiClient,
    scope: Scope,
}

impl GoogleDirectoryClient {
    pub fn new(api: ApiClient, customer: impl Into<String>, domain: Option<String>) -> Self {
        let scope = match domain {
            Some(domain) if !domain.trim().is_empty() => Scope::Domain(domain),
            _ => Scope::Customer(customer.into()),
        };
        Self { api, scope }
    }

    /// Build a client from configuration.
    pub fn from_config(directory: &DirectoryConfig, http: &HttpConfig) -> AuditResult<Self> {
        let api = ApiClient::new(
            &directory.base_url,
            http.resolve_access_token()?,
            Duration::from_secs(http.request_timeout_secs),
        )?;
        Ok(Self::new(
            api,
            directory.customer.clone(),
            directory.domain.clone(),
        ))
    }
}

/// Search expression for "last login strictly before `before`".
pub fn last_login_query(before: DateTime<Utc>) -> String {
    format!(
        "lastLoginTime<{}",
        before.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[async_trait]
impl DirectoryQueryService for GoogleDirectoryClient {
    async fn list_users(
        &self,
        filter: &DirectoryFilter,
        page_size: u32,
        page_token: Option<&str>,
    ) -> AuditResult<UserPage> {
        let url = self.api.endpoint(&["admin", "directory", "v1", "users"])?;

        let (scope_key, scope_value) = match &self.scope {
            Scope::Customer(c) => ("customer", c.as_str()),
            Scope::Domain(d) => ("domain", d.as_str()),
        };
        let max_results = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let query = last_login_query(filter.before);

        let mut params = vec![
            (scope_key, scope_value),
            ("query", query.as_str()),
            ("maxResults", max_results.as_str()),
            ("orderBy", "email"),
            ("projection", "basic"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        debug!(query = %query, page_token = ?page_token, "Listing directory users");

        let resp = self.api.send(self.api.get(url).query(&params)).await?;
        let body: UsersResponse = resp.json().await?;

        Ok(UserPage {
            users: body.users.into_iter().map(CandidateUser::from).collect(),
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
