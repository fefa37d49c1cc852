//! Enterprise License Manager API client.
//!
//! `GET {base}/apps/licensing/v1/product/{productId}/sku/{skuId}/user/{userId}`
//! answers 200 when the assignment exists and 404 when it does not. Every
//! other result is inconclusive.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{EntitlementService, ProbeOutcome};
use crate::config::{HttpConfig, LicensingConfig};
use crate::errors::AuditResult;
use crate::google::ApiClient;

/// Licensing API client.
#[derive(Debug, Clone)]
pub struct GoogleLicensingClient {
    api: ApiClient,
}

impl GoogleLicensingClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Build a client from configuration.
    pub fn from_config(licensing: &LicensingConfig, http: &HttpConfig) -> AuditResult<Self> {
        let api = ApiClient::new(
            &licensing.base_url,
            http.resolve_access_token()?,
            Duration::from_secs(http.request_timeout_secs),
        )?;
        Ok(Self::new(api))
    }
}

#[async_trait]
impl EntitlementService for GoogleLicensingClient {
    async fn get_assignment(&self, product_id: &str, sku_id: &str, user_id: &str) -> ProbeOutcome {
        let url = match self.api.endpoint(&[
            "apps", "licensing", "v1", "product", product_id, "sku", sku_id, "user", user_id,
        ]) {
            Ok(url) => url,
            Err(e) => return ProbeOutcome::Inconclusive(e.to_string()),
        };

        match self.api.send(self.api.get(url)).await {
            Ok(_) => ProbeOutcome::Found,
            Err(e) if e.is_not_found() => {
                debug!(user = %user_id, "No license assignment");
                ProbeOutcome::NotFound
            }
            Err(e) => ProbeOutcome::Inconclusive(e.to_string()),
        }
    }
}
