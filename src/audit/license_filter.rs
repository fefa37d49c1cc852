//! License verification for inactive candidates.
//!
//! One point lookup per candidate instead of listing every assignment of the
//! SKU. Probes are independent, so they may run on a bounded pool of tasks;
//! results are written to per-candidate slots and read back in input order.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::directory::CandidateUser;
use crate::licensing::{EntitlementService, ProbeOutcome};
use crate::logging::{log_audit_event, AuditEvent};

/// An inactive account confirmed to hold the audited license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedUser {
    #[serde(flatten)]
    pub user: CandidateUser,
}

impl From<CandidateUser> for MatchedUser {
    fn from(user: CandidateUser) -> Self {
        Self { user }
    }
}

/// A candidate whose license status could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InconclusiveProbe {
    pub email: String,
    pub reason: String,
}

/// Result of filtering candidates by license.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// Licensed candidates, in input order
    pub matched: Vec<MatchedUser>,
    /// Candidates confirmed to not hold the license
    pub confirmed_absent: usize,
    /// Candidates excluded because the lookup failed
    pub inconclusive: Vec<InconclusiveProbe>,
}

/// Keeps only candidates that hold a given product/SKU.
pub struct LicenseFilter {
    entitlements: Arc<dyn EntitlementService>,
    concurrency: usize,
}

impl LicenseFilter {
    /// `concurrency` of 1 (or 0) probes sequentially.
    pub fn new(entitlements: Arc<dyn EntitlementService>, concurrency: usize) -> Self {
        Self {
            entitlements,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn filter(
        &self,
        candidates: Vec<CandidateUser>,
        product_id: &str,
        sku_id: &str,
    ) -> FilterOutcome {
        let outcomes = if self.concurrency == 1 || candidates.len() <= 1 {
            self.probe_sequentially(&candidates, product_id, sku_id).await
        } else {
            self.probe_concurrently(&candidates, product_id, sku_id).await
        };

        let mut result = FilterOutcome::default();

        for (user, outcome) in candidates.into_iter().zip(outcomes) {
            match outcome {
                ProbeOutcome::Found => {
                    log_audit_event(AuditEvent::CandidateMatched, &user.email, None);
                    result.matched.push(MatchedUser::from(user));
                }
                ProbeOutcome::NotFound => {
                    log_audit_event(AuditEvent::ConfirmedAbsent, &user.email, None);
                    result.confirmed_absent += 1;
                }
                ProbeOutcome::Inconclusive(reason) => {
                    log_audit_event(AuditEvent::ProbeInconclusive, &user.email, Some(&reason));
                    result.inconclusive.push(InconclusiveProbe {
                        email: user.email,
                        reason,
                    });
                }
            }
        }

        info!(
            matched = result.matched.len(),
            confirmed_absent = result.confirmed_absent,
            inconclusive = result.inconclusive.len(),
            "License filter finished"
        );

        result
    }

    async fn probe_sequentially(
        &self,
        candidates: &[CandidateUser],
        product_id: &str,
        sku_id: &str,
    ) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(candidates.len());
        for user in candidates {
            outcomes.push(
                self.entitlements
                    .get_assignment(product_id, sku_id, &user.email)
                    .await,
            );
        }
        outcomes
    }

    async fn probe_concurrently(
        &self,
        candidates: &[CandidateUser],
        product_id: &str,
        sku_id: &str,
    ) -> Vec<ProbeOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let product_id: Arc<str> = Arc::from(product_id);
        let sku_id: Arc<str> = Arc::from(sku_id);
        let mut tasks = JoinSet::new();

        for (index, user) in candidates.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let service = Arc::clone(&self.entitlements);
            let product_id = Arc::clone(&product_id);
            let sku_id = Arc::clone(&sku_id);
            let email = user.email.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = service.get_assignment(&product_id, &sku_id, &email).await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; candidates.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "License probe task failed"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    ProbeOutcome::Inconclusive("license probe task did not complete".to_string())
                })
            })
            .collect()
    }
}
