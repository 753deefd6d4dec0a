//! In-memory transport for tests
//!
//! Seeded records are served in fixed-size pages. Failures are scripted per
//! endpoint and consumed when they trigger, so a retry after a scripted
//! failure succeeds. Every call is counted so tests can assert on traffic
//! (or the absence of it).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::catalog::{AssetId, AssetRecord, ScopeId, UploadFile, UsageLocation};

use super::{
    BinaryFetch, CatalogTransport, LockResponse, PageResponse, TransportError,
};

/// Per-endpoint call counts
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CallLog {
    pub fetch_page: usize,
    pub create_asset: usize,
    pub delete_asset: usize,
    pub set_lock: usize,
    pub fetch_usage: usize,
    pub fetch_binary: usize,
}

#[derive(Default)]
struct Inner {
    records: Vec<AssetRecord>,
    usage: HashMap<AssetId, Vec<UsageLocation>>,
    binaries: HashMap<AssetId, Bytes>,
    refused: HashMap<AssetId, u16>,
    next_id: u64,
    fail_page: HashMap<usize, TransportError>,
    fail_create: Option<TransportError>,
    fail_delete: Option<TransportError>,
    fail_lock: Option<TransportError>,
    fail_usage: Option<TransportError>,
    gate_create: Option<Arc<Notify>>,
    gate_delete: Option<Arc<Notify>>,
    calls: CallLog,
}

/// In-memory `CatalogTransport` for testing
pub struct MemoryTransport {
    page_size: usize,
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Replace the seeded records
    pub fn seed(&self, records: impl IntoIterator<Item = AssetRecord>) {
        let mut inner = self.inner.lock().unwrap();
        inner.records = records.into_iter().collect();
    }

    pub fn seed_usage(&self, id: AssetId, locations: Vec<UsageLocation>) {
        self.inner.lock().unwrap().usage.insert(id, locations);
    }

    pub fn seed_binary(&self, id: AssetId, bytes: impl Into<Bytes>) {
        self.inner.lock().unwrap().binaries.insert(id, bytes.into());
    }

    /// Answer the next binary fetches for `id` with an in-band refusal
    pub fn refuse_binary(&self, id: AssetId, status: u16) {
        self.inner.lock().unwrap().refused.insert(id, status);
    }

    /// Script the fetch of one page to fail once
    pub fn fail_page(&self, page_index: usize, err: TransportError) {
        self.inner.lock().unwrap().fail_page.insert(page_index, err);
    }

    /// Script the next create to fail
    pub fn fail_create(&self, err: TransportError) {
        self.inner.lock().unwrap().fail_create = Some(err);
    }

    /// Script the next delete to fail
    pub fn fail_delete(&self, err: TransportError) {
        self.inner.lock().unwrap().fail_delete = Some(err);
    }

    /// Script the next lock update to fail
    pub fn fail_lock(&self, err: TransportError) {
        self.inner.lock().unwrap().fail_lock = Some(err);
    }

    /// Script the next usage fetch to fail
    pub fn fail_usage(&self, err: TransportError) {
        self.inner.lock().unwrap().fail_usage = Some(err);
    }

    /// Make the next create wait until the returned gate is notified
    pub fn gate_create(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().gate_create = Some(Arc::clone(&gate));
        gate
    }

    /// Make the next delete wait until the returned gate is notified
    pub fn gate_delete(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner.lock().unwrap().gate_delete = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> CallLog {
        self.inner.lock().unwrap().calls
    }

    pub fn records(&self) -> Vec<AssetRecord> {
        self.inner.lock().unwrap().records.clone()
    }
}

#[async_trait]
impl CatalogTransport for MemoryTransport {
    async fn fetch_page(
        &self,
        _scope: &ScopeId,
        page_index: usize,
    ) -> Result<PageResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.fetch_page += 1;
        if let Some(err) = inner.fail_page.remove(&page_index) {
            return Err(err);
        }

        let total = inner.records.len();
        let start = (page_index * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        Ok(PageResponse {
            records: inner.records[start..end].to_vec(),
            total_count: total as u64,
            has_more: end < total,
        })
    }

    async fn create_asset(
        &self,
        _scope: &ScopeId,
        upload: &UploadFile,
    ) -> Result<AssetRecord, TransportError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.create_asset += 1;
            inner.gate_create.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.fail_create.take() {
            return Err(err);
        }
        inner.next_id += 1;
        let record = AssetRecord::new(
            AssetId::from_string(format!("asset-{}", inner.next_id)),
            upload.name.clone(),
            upload.content_type.clone(),
            upload.size_bytes(),
        );
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn delete_asset(&self, _scope: &ScopeId, id: &AssetId) -> Result<(), TransportError> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.delete_asset += 1;
            inner.gate_delete.take()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(err) = inner.fail_delete.take() {
            return Err(err);
        }
        let before = inner.records.len();
        inner.records.retain(|record| record.id != *id);
        if inner.records.len() == before {
            return Err(TransportError::NotFound);
        }
        Ok(())
    }

    async fn set_lock(
        &self,
        _scope: &ScopeId,
        id: &AssetId,
        locked: bool,
    ) -> Result<LockResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.set_lock += 1;
        if let Some(err) = inner.fail_lock.take() {
            return Err(err);
        }
        let record = inner
            .records
            .iter_mut()
            .find(|record| record.id == *id)
            .ok_or(TransportError::NotFound)?;
        record.locked = locked;
        Ok(LockResponse { locked })
    }

    async fn fetch_usage(
        &self,
        _scope: &ScopeId,
        id: &AssetId,
    ) -> Result<Vec<UsageLocation>, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.fetch_usage += 1;
        if let Some(err) = inner.fail_usage.take() {
            return Err(err);
        }
        inner
            .usage
            .get(id)
            .cloned()
            .ok_or(TransportError::NotFound)
    }

    async fn fetch_binary(
        &self,
        _scope: &ScopeId,
        id: &AssetId,
    ) -> Result<BinaryFetch, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.fetch_binary += 1;
        if let Some(status) = inner.refused.get(id) {
            return Ok(BinaryFetch::Refused(*status));
        }
        match inner.binaries.get(id) {
            Some(bytes) => Ok(BinaryFetch::Delivered(bytes.clone())),
            None => Ok(BinaryFetch::Refused(404)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeId {
        ScopeId::from_string("course-v1:Aula+TEST")
    }

    fn record(id: &str) -> AssetRecord {
        AssetRecord::new(AssetId::from_string(id), format!("{id}.png"), "image/png", 10)
    }

    #[tokio::test]
    async fn test_paging_math() {
        let transport = MemoryTransport::new(2);
        transport.seed([record("a1"), record("a2"), record("a3")]);

        let page0 = transport.fetch_page(&scope(), 0).await.unwrap();
        assert_eq!(page0.records.len(), 2);
        assert_eq!(page0.total_count, 3);
        assert!(page0.has_more);

        let page1 = transport.fetch_page(&scope(), 1).await.unwrap();
        assert_eq!(page1.records.len(), 1);
        assert!(!page1.has_more);
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed() {
        let transport = MemoryTransport::new(10);
        transport.seed([record("a1")]);
        transport.fail_page(0, TransportError::Network("flaky".to_string()));

        assert!(transport.fetch_page(&scope(), 0).await.is_err());
        assert!(transport.fetch_page(&scope(), 0).await.is_ok());
        assert_eq!(transport.calls().fetch_page, 2);
    }

    #[tokio::test]
    async fn test_binary_fetch_refusal_is_in_band() {
        let transport = MemoryTransport::new(10);
        transport.seed_binary(AssetId::from_string("a1"), &b"data"[..]);
        transport.refuse_binary(AssetId::from_string("a2"), 500);

        assert!(matches!(
            transport.fetch_binary(&scope(), &AssetId::from_string("a1")).await,
            Ok(BinaryFetch::Delivered(_))
        ));
        assert!(matches!(
            transport.fetch_binary(&scope(), &AssetId::from_string("a2")).await,
            Ok(BinaryFetch::Refused(500))
        ));
        assert!(matches!(
            transport.fetch_binary(&scope(), &AssetId::from_string("a3")).await,
            Ok(BinaryFetch::Refused(404))
        ));
    }
}
