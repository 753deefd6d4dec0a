//! Usage resolver — lazily fetches where an asset is referenced
//!
//! Results are cached on the record, so repeated lookups for the same asset
//! do not re-fetch. The cache is never invalidated automatically (a lock
//! change does not reset it); callers invalidate explicitly and re-resolve.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::catalog::{AssetId, Intent, ScopeId, UsageAdmission};
use crate::status::OperationStatus;
use crate::transport::CatalogTransport;

pub(crate) const USAGE_FAILED_MESSAGE: &str = "Failed to fetch usage locations.";

/// Resolves and caches usage-reference locations per asset
pub struct UsageResolver {
    scope: ScopeId,
    transport: Arc<dyn CatalogTransport>,
    intents: mpsc::UnboundedSender<Intent>,
}

impl UsageResolver {
    pub(crate) fn new(
        scope: ScopeId,
        transport: Arc<dyn CatalogTransport>,
        intents: mpsc::UnboundedSender<Intent>,
    ) -> Self {
        Self {
            scope,
            transport,
            intents,
        }
    }

    /// Resolve where an asset is referenced.
    ///
    /// Returns `Successful` without a network call when the record already
    /// carries resolved usage data. A failed fetch leaves the record
    /// unresolved, distinguishable from "resolved, none found".
    pub async fn resolve(&self, id: AssetId) -> OperationStatus {
        let (reply, admission) = oneshot::channel();
        let _ = self.intents.send(Intent::BeginUsage {
            id: id.clone(),
            reply,
        });

        match admission.await {
            Ok(UsageAdmission::Cached) => OperationStatus::Successful,
            Ok(UsageAdmission::Missing) | Err(_) => OperationStatus::Failed,
            Ok(UsageAdmission::Fetch) => {
                match self.transport.fetch_usage(&self.scope, &id).await {
                    Ok(locations) => {
                        let _ = self.intents.send(Intent::CommitUsage { id, locations });
                        OperationStatus::Successful
                    }
                    Err(err) => {
                        tracing::warn!(%err, %id, "usage fetch failed");
                        let _ = self.intents.send(Intent::FailUsage {
                            message: err.user_message(USAGE_FAILED_MESSAGE),
                        });
                        OperationStatus::Failed
                    }
                }
            }
        }
    }

    /// Drop the cached usage data so the next resolve fetches again
    pub fn invalidate(&self, id: AssetId) {
        let _ = self.intents.send(Intent::InvalidateUsage { id });
    }
}
