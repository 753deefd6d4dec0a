//! The remote-store seam
//!
//! The wire transport is an external collaborator behind the
//! [`CatalogTransport`] trait: `http` talks to the real catalog service,
//! `memory` backs tests. Operations never see transport internals, only the
//! error taxonomy defined here.

mod http;
mod memory;

pub use http::HttpCatalogTransport;
pub use memory::{CallLog, MemoryTransport};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::catalog::{AssetId, AssetRecord, ScopeId, UploadFile, UsageLocation};

/// Failure taxonomy at the transport boundary
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Server-side precondition rejection, carrying the server's own reason
    #[error("{0}")]
    Validation(String),
    /// Transport or remote failure
    #[error("network error: {0}")]
    Network(String),
    /// Authorization failure, distinct from a generic failure
    #[error("not authorized")]
    Denied,
    #[error("not found")]
    NotFound,
    /// Response shape the client does not understand
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl TransportError {
    /// The message to surface to the user: the server's reason verbatim when
    /// it provided one, otherwise the given fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            TransportError::Validation(reason) => reason.clone(),
            _ => fallback.to_string(),
        }
    }
}

/// One page of catalog records
#[derive(Clone, Debug)]
pub struct PageResponse {
    pub records: Vec<AssetRecord>,
    /// Server-reported total across all pages
    pub total_count: u64,
    pub has_more: bool,
}

/// Result of a lock update
#[derive(Copy, Clone, Debug)]
pub struct LockResponse {
    pub locked: bool,
}

/// Outcome of a binary fetch
///
/// A refusal is data, not an error: the remote reports non-success in-band
/// and the caller must treat both shapes as failure.
#[derive(Clone, Debug)]
pub enum BinaryFetch {
    Delivered(Bytes),
    Refused(u16),
}

impl BinaryFetch {
    pub fn is_delivered(&self) -> bool {
        matches!(self, BinaryFetch::Delivered(_))
    }
}

/// Remote operations on the asset catalog
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Fetch one page of the catalog
    async fn fetch_page(
        &self,
        scope: &ScopeId,
        page_index: usize,
    ) -> Result<PageResponse, TransportError>;

    /// Create an asset from an uploaded file, returning the confirmed record
    async fn create_asset(
        &self,
        scope: &ScopeId,
        upload: &UploadFile,
    ) -> Result<AssetRecord, TransportError>;

    async fn delete_asset(&self, scope: &ScopeId, id: &AssetId) -> Result<(), TransportError>;

    async fn set_lock(
        &self,
        scope: &ScopeId,
        id: &AssetId,
        locked: bool,
    ) -> Result<LockResponse, TransportError>;

    /// Fetch the locations referencing one asset
    async fn fetch_usage(
        &self,
        scope: &ScopeId,
        id: &AssetId,
    ) -> Result<Vec<UsageLocation>, TransportError>;

    /// Fetch an asset's binary content
    async fn fetch_binary(
        &self,
        scope: &ScopeId,
        id: &AssetId,
    ) -> Result<BinaryFetch, TransportError>;
}
