//! SKU catalog: human readable license names mapped to product/SKU ids.
//!
//! The catalog is reference data, not behavior. The built-in table lives in
//! `data/skus.toml` and is embedded at compile time. Sites can layer their
//! own file on top via `policy.sku_catalog_path`:
//!
//! ```toml
//! [[sku]]
//! name = "Internal Pilot Seat"
//! product_id = "Google-Apps"
//! product_name = "Google Workspace"
//! sku_id = "1010020099"
//! ```
//!
//! Entries from the extra file replace built-in entries with the same name
//! and are appended otherwise.
//!
//! # Usage
//!
//! ```rust,ignore
//! use seatwatch::catalog::SkuCatalog;
//!
//! let catalog = SkuCatalog::builtin()?;
//! if let Some(entry) = catalog.lookup("Google Workspace Enterprise Plus") {
//!     println!("{} / {}", entry.product_id, entry.sku_id);
//! }
//! ```

use config::{Config, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{AuditError, AuditResult};

const BUILTIN_CATALOG: &str = include_str!("../data/skus.toml");

/// One license SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuEntry {
    /// Display name, e.g. "Google Workspace Business Plus"
    pub name: String,
    /// Product identifier used by the licensing API
    pub product_id: String,
    /// Display name of the product family
    #[serde(default)]
    pub product_name: String,
    /// SKU identifier used by the licensing API
    pub sku_id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sku: Vec<SkuEntry>,
}

/// Lookup table of known SKUs.
#[derive(Debug, Clone, Default)]
pub struct SkuCatalog {
    entries: Vec<SkuEntry>,
}

impl SkuCatalog {
    /// Catalog with only the built-in entries.
    pub fn builtin() -> AuditResult<Self> {
        let entries = parse_catalog(
            Config::builder().add_source(config::File::from_str(BUILTIN_CATALOG, FileFormat::Toml)),
            "built-in SKU catalog",
        )?;
        Ok(Self { entries })
    }

    /// Built-in catalog, optionally extended by a file on disk.
    pub fn load(extra: Option<&Path>) -> AuditResult<Self> {
        let mut catalog = Self::builtin()?;

        if let Some(path) = extra {
            let entries = parse_catalog(
                Config::builder().add_source(config::File::from(path).format(FileFormat::Toml)),
                &path.display().to_string(),
            )?;
            catalog.merge(entries);
        }

        Ok(catalog)
    }

    fn merge(&mut self, entries: Vec<SkuEntry>) {
        for entry in entries {
            match self
                .entries
                .iter_mut()
                .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
            {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }
    }

    /// Find an entry by display name (case-insensitive) or by SKU id.
    pub fn lookup(&self, name_or_id: &str) -> Option<&SkuEntry> {
        let needle = name_or_id.trim();
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(needle))
            .or_else(|| self.entries.iter().find(|e| e.sku_id == needle))
    }

    /// Display name for a product/SKU pair, if known.
    pub fn name_of(&self, product_id: &str, sku_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.product_id == product_id && e.sku_id == sku_id)
            .map(|e| e.name.as_str())
    }

    /// All entries, in catalog order.
    pub fn entries(&self) -> &[SkuEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_catalog(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    source: &str,
) -> AuditResult<Vec<SkuEntry>> {
    let parsed: CatalogFile = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| AuditError::ConfigError(format!("failed to load {source}: {e}")))?;

    for entry in &parsed.sku {
        if entry.name.trim().is_empty()
            || entry.product_id.trim().is_empty()
            || entry.sku_id.trim().is_empty()
        {
            return Err(AuditError::ConfigError(format!(
                "{source}: every [[sku]] needs name, product_id and sku_id"
            )));
        }
    }

    Ok(parsed.sku)
}
