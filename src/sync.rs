//! Catalog synchronizer — paginated load
//!
//! Pages are fetched sequentially so store appends occur in request order.
//! A load pass owns a generation; pages and terminal statuses arriving after
//! a newer pass has begun are discarded by the apply loop.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::catalog::{CatalogSnapshot, Intent, ScopeId};
use crate::status::{OperationKind, OperationStatus};
use crate::transport::{CatalogTransport, TransportError};

pub(crate) const LOAD_FAILED_MESSAGE: &str = "Failed to load all files.";
pub(crate) const LOAD_PARTIAL_MESSAGE: &str = "Failed to load remaining files.";
pub(crate) const LOAD_DENIED_MESSAGE: &str =
    "Not authorized to access files for this course.";

/// Drives paginated synchronization of the catalog with the remote store
pub struct Synchronizer {
    scope: ScopeId,
    transport: Arc<dyn CatalogTransport>,
    intents: mpsc::UnboundedSender<Intent>,
    snapshot: watch::Receiver<CatalogSnapshot>,
}

impl Synchronizer {
    pub(crate) fn new(
        scope: ScopeId,
        transport: Arc<dyn CatalogTransport>,
        intents: mpsc::UnboundedSender<Intent>,
        snapshot: watch::Receiver<CatalogSnapshot>,
    ) -> Self {
        Self {
            scope,
            transport,
            intents,
            snapshot,
        }
    }

    /// Run one synchronization pass from page 0 until the server reports no
    /// further pages, replacing the previous catalog content.
    ///
    /// Page 0 failure leaves the store empty (`Failed`, or `Denied` for an
    /// authorization failure); a later page failure keeps every successfully
    /// fetched page (`PartialFailure`). A pass superseded by a newer `load`
    /// has its results discarded and returns the catalog's current load
    /// status instead of its own.
    pub async fn load(&self) -> OperationStatus {
        let (reply, started) = oneshot::channel();
        let _ = self.intents.send(Intent::StartLoad { reply });
        let Ok(generation) = started.await else {
            return OperationStatus::Failed;
        };

        let mut page_index = 0;
        loop {
            match self.transport.fetch_page(&self.scope, page_index).await {
                Ok(page) => {
                    let has_more = page.has_more;
                    let (reply, committed) = oneshot::channel();
                    let _ = self.intents.send(Intent::CommitPage {
                        generation,
                        records: page.records,
                        total_count: page.total_count,
                        has_more,
                        reply,
                    });
                    if !committed.await.unwrap_or(false) {
                        tracing::info!(page_index, "discarding superseded load pass");
                        return self.snapshot.borrow().status(OperationKind::Load);
                    }
                    if !has_more {
                        let _ = self.intents.send(Intent::FinishLoad {
                            generation,
                            status: OperationStatus::Successful,
                            message: None,
                        });
                        return OperationStatus::Successful;
                    }
                    page_index += 1;
                }
                Err(err) => {
                    let (status, message) = if page_index == 0 {
                        if matches!(err, TransportError::Denied) {
                            (OperationStatus::Denied, LOAD_DENIED_MESSAGE)
                        } else {
                            (OperationStatus::Failed, LOAD_FAILED_MESSAGE)
                        }
                    } else {
                        (OperationStatus::PartialFailure, LOAD_PARTIAL_MESSAGE)
                    };
                    tracing::warn!(%err, page_index, "catalog load failed");
                    let _ = self.intents.send(Intent::FinishLoad {
                        generation,
                        status,
                        message: Some(message.to_string()),
                    });
                    return status;
                }
            }
        }
    }
}
