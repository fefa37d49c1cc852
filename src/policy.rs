//! The audit policy: what counts as inactive and which license to look for.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::SkuCatalog;
use crate::config::PolicyConfig;
use crate::errors::{AuditError, AuditResult};

/// How accounts without any recorded login are treated.
///
/// The directory reports such accounts with an epoch login timestamp, which
/// satisfies any "last login before" filter, so they come back from the
/// server either way. This decides whether they stay in the candidate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeverLoggedInPolicy {
    /// Never-logged-in accounts are overdue relative to any cutoff
    #[default]
    Include,
    /// Only accounts with a real, stale login are audited
    Exclude,
}

impl fmt::Display for NeverLoggedInPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeverLoggedInPolicy::Include => write!(f, "include"),
            NeverLoggedInPolicy::Exclude => write!(f, "exclude"),
        }
    }
}

/// Immutable policy for a single audit run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditPolicy {
    pub inactivity_days: i64,
    pub product_id: String,
    pub sku_id: String,
    pub never_logged_in: NeverLoggedInPolicy,
}

impl AuditPolicy {
    /// Build and validate a policy.
    pub fn new(
        inactivity_days: i64,
        product_id: impl Into<String>,
        sku_id: impl Into<String>,
        never_logged_in: NeverLoggedInPolicy,
    ) -> AuditResult<Self> {
        let policy = Self {
            inactivity_days,
            product_id: product_id.into().trim().to_string(),
            sku_id: sku_id.into().trim().to_string(),
            never_logged_in,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Resolve the policy from configuration.
    ///
    /// Explicit `product_id`/`sku_id` win. When both are empty, `sku_name`
    /// is looked up in the catalog.
    pub fn from_config(config: &PolicyConfig, catalog: &SkuCatalog) -> AuditResult<Self> {
        let (product_id, sku_id) =
            if config.product_id.trim().is_empty() && config.sku_id.trim().is_empty() {
                match config.sku_name.as_deref().map(str::trim) {
                    Some(name) if !name.is_empty() => {
                        let entry = catalog.lookup(name).ok_or_else(|| {
                            AuditError::ConfigError(format!(
                                "unknown SKU '{name}'; run with --list-skus to see the catalog"
                            ))
                        })?;
                        (entry.product_id.clone(), entry.sku_id.clone())
                    }
                    _ => {
                        return Err(AuditError::ConfigError(
                            "set policy.product_id and policy.sku_id, or policy.sku_name"
                                .to_string(),
                        ))
                    }
                }
            } else {
                (config.product_id.clone(), config.sku_id.clone())
            };

        Self::new(
            config.inactivity_days,
            product_id,
            sku_id,
            config.never_logged_in,
        )
    }

    /// Validate the policy before any network call is made.
    pub fn validate(&self) -> AuditResult<()> {
        if self.inactivity_days <= 0 {
            return Err(AuditError::ConfigError(format!(
                "inactivity_days must be greater than 0, got {}",
                self.inactivity_days
            )));
        }

        // Product and SKU ids become path segments in the licensing API.
        let id_regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap();

        for (field, value) in [("product_id", &self.product_id), ("sku_id", &self.sku_id)] {
            if value.is_empty() {
                return Err(AuditError::ConfigError(format!("{field} cannot be empty")));
            }
            if !id_regex.is_match(value) {
                return Err(AuditError::ConfigError(format!(
                    "{field} contains invalid characters: '{value}'"
                )));
            }
        }

        Ok(())
    }
}
