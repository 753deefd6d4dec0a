//! Bulk transfer orchestrator
//!
//! Fans out one binary fetch per requested asset concurrently and aggregates
//! conservatively: the operation is `Successful` only when every fetch
//! delivered. Any refusal or transport fault fails the whole operation and
//! no artifacts are written, since a partially delivered set is not a
//! consistent result. This is deliberately stricter than pagination, where
//! partial data is still usable.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};

use crate::catalog::{AssetId, CatalogSnapshot, Intent, ScopeId};
use crate::status::{OperationKind, OperationStatus};
use crate::transport::{BinaryFetch, CatalogTransport};

pub(crate) const DOWNLOAD_FAILED_MESSAGE: &str = "Failed to download files.";
pub(crate) const DOWNLOAD_EMPTY_MESSAGE: &str = "No files selected for download.";

/// Downloads a selection of assets to local artifacts
pub struct BulkTransfer {
    scope: ScopeId,
    transport: Arc<dyn CatalogTransport>,
    intents: mpsc::UnboundedSender<Intent>,
    snapshot: watch::Receiver<CatalogSnapshot>,
}

impl BulkTransfer {
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

    fn finish(&self, status: OperationStatus, message: Option<String>) {
        let _ = self.intents.send(Intent::FinishOperation {
            kind: OperationKind::BulkDownload,
            status,
            message,
        });
    }

    /// Download the given assets into `dest_dir`, one artifact per asset
    /// under its display name.
    ///
    /// A single id is fetched and saved directly; multiple ids are fetched
    /// concurrently. Every fetch is attempted even when another one has
    /// already failed.
    pub async fn download(&self, ids: &[AssetId], dest_dir: &Path) -> OperationStatus {
        if ids.is_empty() {
            self.finish(
                OperationStatus::Failed,
                Some(DOWNLOAD_EMPTY_MESSAGE.to_string()),
            );
            return OperationStatus::Failed;
        }
        let _ = self.intents.send(Intent::MarkInProgress {
            kind: OperationKind::BulkDownload,
        });

        let names: Vec<Option<String>> = {
            let snapshot = self.snapshot.borrow();
            ids.iter()
                .map(|id| snapshot.record(id).map(|r| r.display_name.clone()))
                .collect()
        };

        let outcomes = join_all(
            ids.iter()
                .map(|id| self.transport.fetch_binary(&self.scope, id)),
        )
        .await;

        let mut artifacts: Vec<(String, Bytes)> = Vec::with_capacity(ids.len());
        let mut delivered = true;
        for ((id, name), outcome) in ids.iter().zip(&names).zip(outcomes) {
            match (name, outcome) {
                (Some(name), Ok(BinaryFetch::Delivered(bytes))) => {
                    artifacts.push((name.clone(), bytes));
                }
                (None, _) => {
                    tracing::warn!(%id, "download requested for unknown asset");
                    delivered = false;
                }
                (_, Ok(BinaryFetch::Refused(status))) => {
                    tracing::warn!(%id, status, "binary fetch refused");
                    delivered = false;
                }
                (_, Err(err)) => {
                    tracing::warn!(%err, %id, "binary fetch failed");
                    delivered = false;
                }
            }
        }

        if !delivered {
            self.finish(
                OperationStatus::Failed,
                Some(DOWNLOAD_FAILED_MESSAGE.to_string()),
            );
            return OperationStatus::Failed;
        }

        if let Err(err) = save_artifacts(dest_dir, &artifacts).await {
            tracing::warn!(%err, "failed to save downloaded files");
            self.finish(
                OperationStatus::Failed,
                Some(DOWNLOAD_FAILED_MESSAGE.to_string()),
            );
            return OperationStatus::Failed;
        }

        self.finish(OperationStatus::Successful, None);
        OperationStatus::Successful
    }
}

async fn save_artifacts(dest_dir: &Path, artifacts: &[(String, Bytes)]) -> anyhow::Result<()> {
    fs::create_dir_all(dest_dir).await?;
    for (name, bytes) in artifacts {
        let path = dest_dir.join(name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }
    Ok(())
}
