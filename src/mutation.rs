//! Optimistic add / delete / lock-update with mandatory rollback
//!
//! Each mutation stages its optimistic state in one apply transition, issues
//! the remote call, then commits or rolls back in another. The store is
//! never left in the speculative state after a failure. At most one mutation
//! per asset id is in flight; a second one is rejected as a conflict.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::catalog::{AssetId, Intent, ScopeId, UploadFile};
use crate::status::{OperationKind, OperationStatus};
use crate::transport::CatalogTransport;

/// Largest accepted upload (20 MB)
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

pub(crate) const ADD_FAILED_MESSAGE: &str = "Failed to add file.";
pub(crate) const DELETE_FAILED_MESSAGE: &str = "Failed to delete file.";
pub(crate) const LOCK_FAILED_MESSAGE: &str = "Failed to update lock status.";

pub(crate) fn oversize_message(name: &str) -> String {
    format!("File {name} exceeds maximum size of 20 MB.")
}

/// Performs optimistic mutations against the catalog
pub struct MutationCoordinator {
    scope: ScopeId,
    transport: Arc<dyn CatalogTransport>,
    intents: mpsc::UnboundedSender<Intent>,
}

impl MutationCoordinator {
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

    fn submit(&self, intent: Intent) {
        let _ = self.intents.send(intent);
    }

    /// Upload a file, inserting it at `insert_index` in the visible list.
    ///
    /// Size validation is local; an oversize file fails immediately without
    /// a network call. While the upload is in flight the catalog shows a
    /// pending placeholder at the requested index, replaced in place by the
    /// confirmed record on success and removed on failure. Concurrent adds
    /// stage independent placeholders and do not block each other.
    pub async fn add(&self, file: UploadFile, insert_index: usize) -> OperationStatus {
        if file.size_bytes() > MAX_UPLOAD_BYTES {
            let message = oversize_message(&file.name);
            tracing::warn!(file = %file.name, size = file.size_bytes(), "rejected oversize upload");
            self.submit(Intent::FinishOperation {
                kind: OperationKind::Add,
                status: OperationStatus::Failed,
                message: Some(message),
            });
            return OperationStatus::Failed;
        }

        let (reply, staged) = oneshot::channel();
        self.submit(Intent::StagePlaceholder {
            display_name: file.name.clone(),
            content_type: file.content_type.clone(),
            file_size_bytes: file.size_bytes(),
            insert_index,
            reply,
        });
        let Ok(placeholder) = staged.await else {
            return OperationStatus::Failed;
        };

        match self.transport.create_asset(&self.scope, &file).await {
            Ok(record) => {
                self.submit(Intent::ConfirmPlaceholder {
                    placeholder,
                    record,
                });
                OperationStatus::Successful
            }
            Err(err) => {
                tracing::warn!(%err, file = %file.name, "upload failed");
                self.submit(Intent::DiscardPlaceholder {
                    placeholder,
                    message: err.user_message(ADD_FAILED_MESSAGE),
                });
                OperationStatus::Failed
            }
        }
    }

    /// Delete an asset. The caller has already run its confirmation step;
    /// this assumes approval.
    ///
    /// The record is hidden while the remote delete is in flight; on success
    /// it is dropped from store and selection in the same transition, on
    /// failure it reappears with store and selection unchanged.
    pub async fn delete(&self, id: AssetId) -> OperationStatus {
        let (reply, staged) = oneshot::channel();
        self.submit(Intent::StageRemoval {
            id: id.clone(),
            reply,
        });
        if !staged.await.unwrap_or(false) {
            return OperationStatus::Failed;
        }

        match self.transport.delete_asset(&self.scope, &id).await {
            Ok(()) => {
                self.submit(Intent::CommitRemoval { id });
                OperationStatus::Successful
            }
            Err(err) => {
                tracing::warn!(%err, %id, "delete failed");
                self.submit(Intent::RestoreRemoval {
                    id,
                    message: err.user_message(DELETE_FAILED_MESSAGE),
                });
                OperationStatus::Failed
            }
        }
    }

    /// Flip an asset's lock flag.
    ///
    /// The flag is flipped optimistically; a remote failure restores the
    /// prior value exactly, a success keeps the optimistic value.
    pub async fn update_lock(&self, id: AssetId, locked: bool) -> OperationStatus {
        let (reply, staged) = oneshot::channel();
        self.submit(Intent::StageLock {
            id: id.clone(),
            locked,
            reply,
        });
        let Some(prior) = staged.await.ok().flatten() else {
            return OperationStatus::Failed;
        };

        match self.transport.set_lock(&self.scope, &id, locked).await {
            Ok(_confirmed) => {
                self.submit(Intent::CommitLock { id });
                OperationStatus::Successful
            }
            Err(err) => {
                tracing::warn!(%err, %id, locked, "lock update failed");
                self.submit(Intent::RevertLock {
                    id,
                    prior,
                    message: err.user_message(LOCK_FAILED_MESSAGE),
                });
                OperationStatus::Failed
            }
        }
    }
}
