//! Seatwatch - find inactive accounts that still hold a paid license seat
//!
//! A run computes an inactivity cutoff, pages through the Google Workspace
//! directory for accounts whose last login precedes it, checks each one for a
//! specific product/SKU assignment, and writes the matches to a CSV file or a
//! Google Sheets spreadsheet.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use seatwatch::audit::AuditRun;
//! use seatwatch::policy::{AuditPolicy, NeverLoggedInPolicy};
//! use seatwatch::sim::{InMemoryDirectory, InMemoryEntitlements, InMemorySink};
//!
//! let policy = AuditPolicy::new(365, "Google-Apps", "1010020020", NeverLoggedInPolicy::Include)?;
//! let run = AuditRun::new(
//!     Arc::new(InMemoryDirectory::new(users)),
//!     Arc::new(InMemoryEntitlements::new()),
//!     Arc::new(InMemorySink::new()),
//! );
//! let summary = run.run(&policy).await?;
//! ```

// Pipeline
pub mod audit;
pub mod cutoff;
pub mod policy;

// Collaborators
pub mod directory;
pub mod licensing;
pub mod report;
pub mod sim;

// Shared plumbing
pub mod catalog;
pub mod config;
pub mod errors;
pub mod google;
pub mod logging;
