//! Asset catalog synchronization core for the Aula course authoring client
//!
//! This crate keeps a client-side catalog of uploaded course files consistent
//! with a remote store under pagination, partial failure, optimistic
//! mutation, per-asset locking, usage-reference lookup, and bulk download.
//!
//! - **Catalog state**: [`catalog`] — records with an explicit
//!   committed/pending/removing state machine, pagination bookkeeping, and
//!   the single-writer apply loop that owns all of it
//! - **Operations**: [`sync`], [`mutation`], [`usage`], [`download`]
//! - **Status**: [`status`] — independent per-operation status/message board
//! - **Selection**: [`selection`] — client-only selection and stable sorted
//!   views
//! - **Transport**: [`transport`] — the remote-store seam, with HTTP and
//!   in-memory implementations
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aula_core::{CatalogManager, ScopeId};
//! use aula_core::transport::HttpCatalogTransport;
//!
//! let transport = Arc::new(HttpCatalogTransport::new("https://studio.example.org/api"));
//! let catalog = CatalogManager::new(ScopeId::from_string("course-v1:Aula+ENG101"), transport);
//! let status = catalog.load().await;
//! ```

pub mod catalog;
pub mod download;
pub mod manager;
pub mod mutation;
pub mod selection;
pub mod status;
pub mod sync;
pub mod transport;
pub mod usage;

pub use catalog::{
    AssetId, AssetRecord, CatalogSnapshot, ScopeId, UploadFile, UsageLocation, UsageState,
    VisibleRecord,
};
pub use download::BulkTransfer;
pub use manager::CatalogManager;
pub use mutation::MutationCoordinator;
pub use selection::{SelectionSet, SortDirection, SortField, SortSpec};
pub use status::{OperationKind, OperationStatus};
pub use sync::Synchronizer;
pub use transport::{BinaryFetch, CatalogTransport, PageResponse, TransportError};
pub use usage::UsageResolver;

#[cfg(test)]
mod tests;
