//! Integration tests for the catalog core over the in-memory transport
//!
//! These drive the public `CatalogManager` API end to end and assert on the
//! published snapshots and the transport call log.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use crate::catalog::{AssetId, AssetRecord, ScopeId, UploadFile, UsageLocation, UsageState};
use crate::catalog::CONFLICT_MESSAGE;
use crate::download::{DOWNLOAD_EMPTY_MESSAGE, DOWNLOAD_FAILED_MESSAGE};
use crate::manager::CatalogManager;
use crate::mutation::{
    oversize_message, ADD_FAILED_MESSAGE, DELETE_FAILED_MESSAGE, MAX_UPLOAD_BYTES,
};
use crate::selection::{SortDirection, SortField, SortSpec};
use crate::status::{OperationKind, OperationStatus};
use crate::sync::{LOAD_DENIED_MESSAGE, LOAD_FAILED_MESSAGE, LOAD_PARTIAL_MESSAGE};
use crate::transport::{MemoryTransport, TransportError};

fn scope() -> ScopeId {
    ScopeId::from_string("course-v1:Aula+ENG101+2024")
}

fn record(id: &str, name: &str, size: u64, minute: u32) -> AssetRecord {
    AssetRecord::new(AssetId::from_string(id), name, "image/png", size)
        .with_created_at(Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap())
}

fn id(raw: &str) -> AssetId {
    AssetId::from_string(raw)
}

fn manager_with(transport: &Arc<MemoryTransport>) -> CatalogManager {
    CatalogManager::new(scope(), Arc::clone(transport) as Arc<dyn crate::transport::CatalogTransport>)
}

fn temp_download_dir() -> PathBuf {
    std::env::temp_dir().join(format!("aula_download_test_{}", uuid::Uuid::new_v4()))
}

async fn wait_for_status(
    manager: &CatalogManager,
    kind: OperationKind,
    status: OperationStatus,
) {
    let mut rx = manager.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if rx.borrow_and_update().status(kind) == status {
                return;
            }
            rx.changed().await.expect("apply loop gone");
        }
    })
    .await
    .expect("timed out waiting for status");
}

// ============================================================================
// Load
// ============================================================================

#[tokio::test]
async fn test_load_concatenates_pages_in_order() {
    let transport = Arc::new(MemoryTransport::new(2));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
        record("a3", "three.png", 30, 2),
        record("a4", "four.png", 40, 3),
        record("a5", "five.png", 50, 4),
    ]);
    let manager = manager_with(&transport);

    let status = manager.load().await;
    assert_eq!(status, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    let ids: Vec<&str> = snapshot
        .records()
        .iter()
        .map(|v| v.record.id.as_str())
        .collect();
    assert_eq!(ids, ["a1", "a2", "a3", "a4", "a5"]);
    assert_eq!(snapshot.total_count(), 5);
    assert!(!snapshot.has_more());
    assert_eq!(snapshot.status(OperationKind::Load), OperationStatus::Successful);
    assert_eq!(transport.calls().fetch_page, 3);
}

#[tokio::test]
async fn test_load_empty_catalog_succeeds() {
    let transport = Arc::new(MemoryTransport::new(10));
    let manager = manager_with(&transport);

    assert_eq!(manager.load().await, OperationStatus::Successful);
    let snapshot = manager.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.total_count(), 0);
}

#[tokio::test]
async fn test_load_page_zero_failure_leaves_store_empty() {
    let transport = Arc::new(MemoryTransport::new(2));
    transport.seed([record("a1", "one.png", 10, 0)]);
    transport.fail_page(0, TransportError::Network("connection reset".to_string()));
    let manager = manager_with(&transport);

    assert_eq!(manager.load().await, OperationStatus::Failed);
    let snapshot = manager.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.message(OperationKind::Load), Some(LOAD_FAILED_MESSAGE));
}

#[tokio::test]
async fn test_load_denied_is_distinguishable_from_failure() {
    let transport = Arc::new(MemoryTransport::new(2));
    transport.fail_page(0, TransportError::Denied);
    let manager = manager_with(&transport);

    assert_eq!(manager.load().await, OperationStatus::Denied);
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.status(OperationKind::Load), OperationStatus::Denied);
    assert_eq!(snapshot.message(OperationKind::Load), Some(LOAD_DENIED_MESSAGE));
}

#[tokio::test]
async fn test_load_later_page_failure_keeps_fetched_pages() {
    let transport = Arc::new(MemoryTransport::new(2));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
        record("a3", "three.png", 30, 2),
        record("a4", "four.png", 40, 3),
    ]);
    transport.fail_page(1, TransportError::Network("timeout".to_string()));
    let manager = manager_with(&transport);

    assert_eq!(manager.load().await, OperationStatus::PartialFailure);

    let snapshot = manager.snapshot();
    let ids: Vec<&str> = snapshot
        .records()
        .iter()
        .map(|v| v.record.id.as_str())
        .collect();
    assert_eq!(ids, ["a1", "a2"]);
    assert_eq!(snapshot.message(OperationKind::Load), Some(LOAD_PARTIAL_MESSAGE));
}

#[tokio::test]
async fn test_reload_replaces_content_and_clears_selection() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;

    manager.toggle_select(id("a1"));
    manager.settle().await;
    assert_eq!(manager.snapshot().selection().len(), 1);

    transport.seed([record("b1", "fresh.png", 5, 2)]);
    assert_eq!(manager.load().await, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.records()[0].record.id.as_str(), "b1");
    assert!(snapshot.selection().is_empty());
}

// ============================================================================
// Add
// ============================================================================

#[tokio::test]
async fn test_add_success_inserts_confirmed_record_at_index() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
        record("a3", "three.png", 30, 2),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;

    let file = UploadFile::new("new.png", "image/png", vec![1u8, 2, 3]);
    let status = manager.add_file(file, 1).await;
    assert_eq!(status, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 4);
    assert_eq!(snapshot.total_count(), 4);
    let inserted = &snapshot.records()[1];
    assert_eq!(inserted.record.display_name, "new.png");
    assert!(!inserted.record.id.is_placeholder());
    assert!(!inserted.pending);
}

#[tokio::test]
async fn test_add_placeholder_visible_while_upload_in_flight() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = Arc::new(manager_with(&transport));
    manager.load().await;

    let gate = transport.gate_create();
    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .add_file(UploadFile::new("slow.png", "image/png", vec![0u8; 64]), 1)
                .await
        })
    };
    wait_for_status(&manager, OperationKind::Add, OperationStatus::InProgress).await;

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 3);
    let placeholder = &snapshot.records()[1];
    assert!(placeholder.pending);
    assert!(placeholder.record.id.is_placeholder());
    assert_eq!(placeholder.record.display_name, "slow.png");

    gate.notify_one();
    assert_eq!(task.await.unwrap(), OperationStatus::Successful);

    let snapshot = manager.snapshot();
    let confirmed = &snapshot.records()[1];
    assert_eq!(confirmed.record.display_name, "slow.png");
    assert!(!confirmed.record.id.is_placeholder());
    assert!(!confirmed.pending);
}

#[tokio::test]
async fn test_add_oversize_file_never_reaches_transport() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = manager_with(&transport);
    manager.load().await;
    let before = manager.snapshot();

    let file = UploadFile::new(
        "big.bin",
        "application/octet-stream",
        vec![0u8; MAX_UPLOAD_BYTES as usize + 1],
    );
    assert_eq!(manager.add_file(file, 0).await, OperationStatus::Failed);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), before.len());
    assert_eq!(
        snapshot.message(OperationKind::Add),
        Some(oversize_message("big.bin").as_str())
    );
    assert_eq!(transport.calls().create_asset, 0);
}

#[tokio::test]
async fn test_add_failure_rolls_back_placeholder() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;
    transport.fail_create(TransportError::Network("connection reset".to_string()));

    let file = UploadFile::new("doomed.png", "image/png", vec![1u8]);
    assert_eq!(manager.add_file(file, 1).await, OperationStatus::Failed);

    let snapshot = manager.snapshot();
    let ids: Vec<&str> = snapshot
        .records()
        .iter()
        .map(|v| v.record.id.as_str())
        .collect();
    assert_eq!(ids, ["a1", "a2"]);
    assert_eq!(snapshot.message(OperationKind::Add), Some(ADD_FAILED_MESSAGE));
    assert_eq!(transport.calls().create_asset, 1);
}

#[tokio::test]
async fn test_add_failure_surfaces_server_reason_verbatim() {
    let transport = Arc::new(MemoryTransport::new(10));
    let manager = manager_with(&transport);
    manager.load().await;
    transport.fail_create(TransportError::Validation(
        "File type not allowed.".to_string(),
    ));

    let file = UploadFile::new("weird.xyz", "application/octet-stream", vec![1u8]);
    assert_eq!(manager.add_file(file, 0).await, OperationStatus::Failed);
    assert_eq!(
        manager.snapshot().message(OperationKind::Add),
        Some("File type not allowed.")
    );
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_removes_from_store_and_selection() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;
    manager.toggle_select(id("a1"));
    manager.settle().await;

    assert_eq!(manager.delete_file(id("a1")).await, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.record(&id("a1")).is_none());
    assert!(snapshot.selection().is_empty());
    assert_eq!(snapshot.total_count(), 1);
}

#[tokio::test]
async fn test_delete_failure_leaves_store_and_selection_unchanged() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;
    manager.toggle_select(id("a1"));
    manager.settle().await;
    transport.fail_delete(TransportError::NotFound);

    assert_eq!(manager.delete_file(id("a1")).await, OperationStatus::Failed);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.record(&id("a1")).is_some());
    assert!(snapshot.selection().contains(&id("a1")));
    assert_eq!(snapshot.message(OperationKind::Delete), Some(DELETE_FAILED_MESSAGE));
}

// ============================================================================
// Lock update
// ============================================================================

#[tokio::test]
async fn test_update_lock_keeps_optimistic_value_on_success() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = manager_with(&transport);
    manager.load().await;

    assert_eq!(manager.update_lock(id("a1"), true).await, OperationStatus::Successful);
    assert!(manager.snapshot().record(&id("a1")).unwrap().locked);
}

#[tokio::test]
async fn test_update_lock_failure_restores_prior_value() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0).with_locked(true)]);
    let manager = manager_with(&transport);
    manager.load().await;
    transport.fail_lock(TransportError::NotFound);

    assert_eq!(manager.update_lock(id("a1"), false).await, OperationStatus::Failed);

    let snapshot = manager.snapshot();
    assert!(snapshot.record(&id("a1")).unwrap().locked);
    assert!(snapshot.message(OperationKind::LockUpdate).is_some());
}

#[tokio::test]
async fn test_update_lock_is_idempotent() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = manager_with(&transport);
    manager.load().await;

    assert_eq!(manager.update_lock(id("a1"), true).await, OperationStatus::Successful);
    assert_eq!(manager.update_lock(id("a1"), true).await, OperationStatus::Successful);
    assert!(manager.snapshot().record(&id("a1")).unwrap().locked);
    assert_eq!(transport.calls().set_lock, 2);
}

#[tokio::test]
async fn test_second_mutation_on_same_id_is_rejected_as_conflict() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = Arc::new(manager_with(&transport));
    manager.load().await;

    let gate = transport.gate_delete();
    let task = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.delete_file(id("a1")).await })
    };
    wait_for_status(&manager, OperationKind::Delete, OperationStatus::InProgress).await;

    // the record is mid-delete; a lock update against it must be rejected
    // immediately without touching it
    assert_eq!(manager.update_lock(id("a1"), true).await, OperationStatus::Failed);
    let snapshot = manager.snapshot();
    assert_eq!(snapshot.message(OperationKind::LockUpdate), Some(CONFLICT_MESSAGE));

    gate.notify_one();
    assert_eq!(task.await.unwrap(), OperationStatus::Successful);
    assert!(manager.snapshot().record(&id("a1")).is_none());
}

// ============================================================================
// Usage resolution
// ============================================================================

#[tokio::test]
async fn test_usage_resolution_is_cached_until_invalidated() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    transport.seed_usage(
        id("a1"),
        vec![UsageLocation::new("subsection - unit / block", "base/unit_id#block_id")],
    );
    let manager = manager_with(&transport);
    manager.load().await;

    assert_eq!(manager.resolve_usage(id("a1")).await, OperationStatus::Successful);
    let usage = manager.snapshot().record(&id("a1")).unwrap().usage.clone();
    assert_eq!(
        usage.locations().unwrap()[0].display_location,
        "subsection - unit / block"
    );
    assert_eq!(transport.calls().fetch_usage, 1);

    // second resolve is served from the record
    assert_eq!(manager.resolve_usage(id("a1")).await, OperationStatus::Successful);
    assert_eq!(transport.calls().fetch_usage, 1);

    manager.invalidate_usage(id("a1"));
    manager.settle().await;
    assert_eq!(manager.resolve_usage(id("a1")).await, OperationStatus::Successful);
    assert_eq!(transport.calls().fetch_usage, 2);
}

#[tokio::test]
async fn test_usage_none_found_differs_from_unresolved() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    transport.seed_usage(id("a1"), Vec::new());
    let manager = manager_with(&transport);
    manager.load().await;

    assert_eq!(manager.resolve_usage(id("a1")).await, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    assert_eq!(
        snapshot.record(&id("a1")).unwrap().usage,
        UsageState::Resolved(Vec::new())
    );
    assert_eq!(snapshot.record(&id("a2")).unwrap().usage, UsageState::Unresolved);
}

#[tokio::test]
async fn test_usage_failure_leaves_record_unresolved() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = manager_with(&transport);
    manager.load().await;

    // nothing seeded: the transport reports not-found
    assert_eq!(manager.resolve_usage(id("a1")).await, OperationStatus::Failed);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.record(&id("a1")).unwrap().usage, UsageState::Unresolved);
    assert!(snapshot.message(OperationKind::UsageFetch).is_some());
}

// ============================================================================
// Bulk download
// ============================================================================

#[tokio::test]
async fn test_download_single_asset_writes_artifact() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    transport.seed_binary(id("a1"), &b"png bytes"[..]);
    let manager = manager_with(&transport);
    manager.load().await;

    let dir = temp_download_dir();
    assert_eq!(manager.download(&[id("a1")], &dir).await, OperationStatus::Successful);

    let saved = tokio::fs::read(dir.join("one.png")).await.unwrap();
    assert_eq!(saved, b"png bytes");
    assert_eq!(transport.calls().fetch_binary, 1);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_download_multiple_assets_fetches_in_parallel_and_saves_all() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    transport.seed_binary(id("a1"), &b"first"[..]);
    transport.seed_binary(id("a2"), &b"second"[..]);
    let manager = manager_with(&transport);
    manager.load().await;

    let dir = temp_download_dir();
    let ids = [id("a1"), id("a2")];
    assert_eq!(manager.download(&ids, &dir).await, OperationStatus::Successful);

    assert_eq!(tokio::fs::read(dir.join("one.png")).await.unwrap(), b"first");
    assert_eq!(tokio::fs::read(dir.join("two.png")).await.unwrap(), b"second");
    assert_eq!(transport.calls().fetch_binary, 2);

    tokio::fs::remove_dir_all(&dir).await.ok();
}

#[tokio::test]
async fn test_download_any_failure_fails_whole_operation() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 1024 * 1024, 0),
        record("a2", "two.png", 2 * 1024 * 1024, 1),
    ]);
    transport.seed_binary(id("a1"), &b"first"[..]);
    transport.refuse_binary(id("a2"), 500);
    let manager = manager_with(&transport);
    manager.load().await;

    // select both, then download the selection
    manager.select_all_visible();
    manager.settle().await;
    let ids: Vec<AssetId> = manager.snapshot().selection().ids().cloned().collect();
    assert_eq!(ids.len(), 2);

    let dir = temp_download_dir();
    assert_eq!(manager.download(&ids, &dir).await, OperationStatus::Failed);

    // both fetches were still attempted, but nothing was written
    assert_eq!(transport.calls().fetch_binary, 2);
    assert!(tokio::fs::metadata(&dir).await.is_err());
    assert_eq!(
        manager.snapshot().message(OperationKind::BulkDownload),
        Some(DOWNLOAD_FAILED_MESSAGE)
    );
}

#[tokio::test]
async fn test_download_empty_selection_fails_without_fetching() {
    let transport = Arc::new(MemoryTransport::new(10));
    let manager = manager_with(&transport);

    let dir = temp_download_dir();
    assert_eq!(manager.download(&[], &dir).await, OperationStatus::Failed);
    assert_eq!(transport.calls().fetch_binary, 0);
    assert_eq!(
        manager.snapshot().message(OperationKind::BulkDownload),
        Some(DOWNLOAD_EMPTY_MESSAGE)
    );
}

// ============================================================================
// Cross-operation behavior
// ============================================================================

#[tokio::test]
async fn test_failed_delete_does_not_affect_other_statuses() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([record("a1", "one.png", 10, 0)]);
    let manager = manager_with(&transport);
    manager.load().await;

    transport.fail_delete(TransportError::Network("oops".to_string()));
    assert_eq!(manager.delete_file(id("a1")).await, OperationStatus::Failed);

    let file = UploadFile::new("new.png", "image/png", vec![1u8]);
    assert_eq!(manager.add_file(file, 0).await, OperationStatus::Successful);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.status(OperationKind::Add), OperationStatus::Successful);
    assert_eq!(snapshot.status(OperationKind::Delete), OperationStatus::Failed);
    assert_eq!(snapshot.status(OperationKind::Load), OperationStatus::Successful);
}

#[tokio::test]
async fn test_sorted_view_orders_without_mutating_store() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "zebra.png", 30, 0),
        record("a2", "Apple.png", 10, 1),
        record("a3", "mango.png", 20, 2),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;

    manager.set_sort(SortSpec::new(SortField::Name, SortDirection::Ascending));
    manager.settle().await;

    let snapshot = manager.snapshot();
    let sorted: Vec<&str> = snapshot
        .sorted_records()
        .iter()
        .map(|r| r.display_name.as_str())
        .collect();
    assert_eq!(sorted, ["Apple.png", "mango.png", "zebra.png"]);

    // insertion order untouched
    let stored: Vec<&str> = snapshot
        .records()
        .iter()
        .map(|v| v.record.display_name.as_str())
        .collect();
    assert_eq!(stored, ["zebra.png", "Apple.png", "mango.png"]);
}

#[tokio::test]
async fn test_select_all_and_clear() {
    let transport = Arc::new(MemoryTransport::new(10));
    transport.seed([
        record("a1", "one.png", 10, 0),
        record("a2", "two.png", 20, 1),
    ]);
    let manager = manager_with(&transport);
    manager.load().await;

    manager.select_all_visible();
    manager.settle().await;
    assert_eq!(manager.snapshot().selection().len(), 2);

    manager.clear_selection();
    manager.settle().await;
    assert!(manager.snapshot().selection().is_empty());
}
