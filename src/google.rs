//! Shared plumbing for the Google REST APIs.
//!
//! Every adapter (directory, licensing, sheets) goes through [`ApiClient`],
//! which adds bearer authentication, a per-request timeout, and turns error
//! responses into [`AuditError::ServerError`].

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::{AuditError, AuditResult};

/// The inner body of a Google API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorBody {
    /// HTTP status code echoed by the server
    #[serde(default)]
    pub code: u16,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
    /// Canonical status, e.g. `NOT_FOUND` or `PERMISSION_DENIED`
    #[serde(default)]
    pub status: Option<String>,
}

/// Google API error envelope.
///
/// ```json
/// {
///   "error": {
///     "code": 404,
///     "message": "User does not have a license for specified sku and product",
///     "status": "NOT_FOUND"
///   }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

/// Authenticated client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> AuditResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            AuditError::ConfigError(format!("invalid API base URL '{base_url}': {e}"))
        })?;

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> AuditResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AuditError::ConfigError(format!(
                    "API base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.token)
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.token)
    }

    /// Send a request, mapping non-success statuses to `ServerError`.
    pub async fn send(&self, request: RequestBuilder) -> AuditResult<Response> {
        let resp = request.send().await?;
        error_for_status(resp).await
    }
}

/// Pass a successful response through; turn anything else into `ServerError`.
pub async fn error_for_status(resp: Response) -> AuditResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = parse_error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });

    Err(AuditError::ServerError {
        status: status.as_u16(),
        message,
    })
}

/// Extract the message from a Google error envelope, if the body is one.
pub fn parse_error_message(body: &str) -> Option<String> {
    let resp: GoogleErrorResponse = serde_json::from_str(body).ok()?;
    match (resp.error.message.is_empty(), resp.error.status) {
        (false, Some(status)) => Some(format!("{status}: {}", resp.error.message)),
        (false, None) => Some(resp.error.message),
        (true, Some(status)) => Some(status),
        (true, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_not_found_envelope() {
        let json = r#"{
            "error": {
                "code": 404,
                "message": "User does not have a license for specified sku and product",
                "status": "NOT_FOUND"
            }
        }"#;

        let resp: GoogleErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.error.code, 404);
        assert_eq!(resp.error.status.as_deref(), Some("NOT_FOUND"));

        let message = parse_error_message(json).unwrap();
        assert!(message.starts_with("NOT_FOUND: "));
        assert!(message.contains("does not have a license"));
    }

    #[test]
    fn parse_envelope_without_status() {
        let json = r#"{"error": {"code": 403, "message": "Not Authorized to access this resource/api"}}"#;
        assert_eq!(
            parse_error_message(json).as_deref(),
            Some("Not Authorized to access this resource/api")
        );
    }

    #[test]
    fn non_envelope_body_yields_none() {
        assert!(parse_error_message("<html>Bad Gateway</html>").is_none());
        assert!(parse_error_message(r#"{"error": {}}"#).is_none());
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = ApiClient::new(
            "https://licensing.googleapis.com/",
            "token",
            Duration::from_secs(5),
        )
        .unwrap();

        let url = client
            .endpoint(&["apps", "licensing", "v1", "user", "a b@example.com"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://licensing.googleapis.com/apps/licensing/v1/user/a%20b@example.com"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client =
            ApiClient::new("http://127.0.0.1:9000/mock", "token", Duration::from_secs(5)).unwrap();
        let url = client.endpoint(&["v4", "spreadsheets"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/mock/v4/spreadsheets");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            ApiClient::new("not a url", "t", Duration::from_secs(1)),
            Err(AuditError::ConfigError(_))
        ));
    }
}
