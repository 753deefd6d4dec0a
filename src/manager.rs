//! CatalogManager — composes the catalog core
//!
//! Owns the apply loop and wires the synchronizer, mutation coordinator,
//! usage resolver, and bulk transfer to one shared transport. Operations run
//! as independent async calls that suspend on their own remote work while
//! the rest of the system proceeds; every state change funnels through the
//! apply loop.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::catalog::{
    spawn_apply_loop, AssetId, CatalogSnapshot, Intent, ScopeId, UploadFile,
};
use crate::download::BulkTransfer;
use crate::mutation::MutationCoordinator;
use crate::selection::SortSpec;
use crate::status::OperationStatus;
use crate::sync::Synchronizer;
use crate::transport::CatalogTransport;
use crate::usage::UsageResolver;

/// Facade over the catalog core for one scope
pub struct CatalogManager {
    scope: ScopeId,
    sync: Synchronizer,
    mutations: MutationCoordinator,
    usage: UsageResolver,
    transfer: BulkTransfer,
    intents: mpsc::UnboundedSender<Intent>,
    snapshot: watch::Receiver<CatalogSnapshot>,
    #[allow(dead_code)]
    apply_handle: JoinHandle<()>,
}

impl CatalogManager {
    pub fn new(scope: ScopeId, transport: Arc<dyn CatalogTransport>) -> Self {
        let (intents, snapshot, apply_handle) = spawn_apply_loop();

        let sync = Synchronizer::new(
            scope.clone(),
            Arc::clone(&transport),
            intents.clone(),
            snapshot.clone(),
        );
        let mutations =
            MutationCoordinator::new(scope.clone(), Arc::clone(&transport), intents.clone());
        let usage = UsageResolver::new(scope.clone(), Arc::clone(&transport), intents.clone());
        let transfer = BulkTransfer::new(
            scope.clone(),
            Arc::clone(&transport),
            intents.clone(),
            snapshot.clone(),
        );

        Self {
            scope,
            sync,
            mutations,
            usage,
            transfer,
            intents,
            snapshot,
            apply_handle,
        }
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    /// Current consistent view of the catalog
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for state changes; one update per applied transition
    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.snapshot.clone()
    }

    /// Synchronize the catalog with the remote store from page 0
    ///
    /// Like every operation below, this returns only after its final state
    /// transition is observable in snapshots.
    pub async fn load(&self) -> OperationStatus {
        let status = self.sync.load().await;
        self.settle().await;
        status
    }

    /// Upload a file, inserting it at `insert_index` in the visible list
    pub async fn add_file(&self, file: UploadFile, insert_index: usize) -> OperationStatus {
        let status = self.mutations.add(file, insert_index).await;
        self.settle().await;
        status
    }

    /// Delete an asset (the caller has already confirmed)
    pub async fn delete_file(&self, id: AssetId) -> OperationStatus {
        let status = self.mutations.delete(id).await;
        self.settle().await;
        status
    }

    /// Flip an asset's lock flag
    pub async fn update_lock(&self, id: AssetId, locked: bool) -> OperationStatus {
        let status = self.mutations.update_lock(id, locked).await;
        self.settle().await;
        status
    }

    /// Resolve where an asset is referenced (cached per record)
    pub async fn resolve_usage(&self, id: AssetId) -> OperationStatus {
        let status = self.usage.resolve(id).await;
        self.settle().await;
        status
    }

    /// Drop an asset's cached usage data
    pub fn invalidate_usage(&self, id: AssetId) {
        self.usage.invalidate(id);
    }

    /// Download the given assets into `dest_dir`
    pub async fn download(&self, ids: &[AssetId], dest_dir: &Path) -> OperationStatus {
        let status = self.transfer.download(ids, dest_dir).await;
        self.settle().await;
        status
    }

    /// Toggle selection of a visible committed record
    pub fn toggle_select(&self, id: AssetId) {
        let _ = self.intents.send(Intent::ToggleSelect { id });
    }

    pub fn clear_selection(&self) {
        let _ = self.intents.send(Intent::ClearSelection);
    }

    pub fn select_all_visible(&self) {
        let _ = self.intents.send(Intent::SelectAllVisible);
    }

    /// Set the ordering applied to sorted views
    pub fn set_sort(&self, spec: SortSpec) {
        let _ = self.intents.send(Intent::SetSort { spec });
    }

    /// Wait until every previously submitted command has been applied, so a
    /// following [`snapshot`](Self::snapshot) reflects them.
    pub async fn settle(&self) {
        let (reply, done) = oneshot::channel();
        let _ = self.intents.send(Intent::Barrier { reply });
        let _ = done.await;
    }
}
