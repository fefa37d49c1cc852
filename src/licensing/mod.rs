//! License assignment lookups.
//!
//! A probe answers one question: does user X hold product/SKU Y? The answer
//! is tri-state so that a definitive "no" is never confused with a failed
//! lookup.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

pub mod google;

pub use google::GoogleLicensingClient;

/// Outcome of a single assignment probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// The assignment exists
    Found,
    /// The service confirmed there is no such assignment
    NotFound,
    /// The lookup failed for any other reason (transport, auth, quota)
    Inconclusive(String),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Found => write!(f, "found"),
            ProbeOutcome::NotFound => write!(f, "not_found"),
            ProbeOutcome::Inconclusive(reason) => write!(f, "inconclusive: {reason}"),
        }
    }
}

/// Point lookup of license assignments.
#[async_trait]
pub trait EntitlementService: Send + Sync {
    async fn get_assignment(&self, product_id: &str, sku_id: &str, user_id: &str) -> ProbeOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(ProbeOutcome::Found.to_string(), "found");
        assert_eq!(ProbeOutcome::NotFound.to_string(), "not_found");
        assert_eq!(
            ProbeOutcome::Inconclusive("timeout".into()).to_string(),
            "inconclusive: timeout"
        );
    }

    #[test]
    fn serializes_with_tag() {
        let json = serde_json::to_value(ProbeOutcome::Inconclusive("503".into())).unwrap();
        assert_eq!(json["outcome"], "inconclusive");
        assert_eq!(json["reason"], "503");
    }
}
