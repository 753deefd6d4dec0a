//! Catalog state: records, pagination bookkeeping, and the apply loop
//!
//! This module owns the authoritative in-memory collection of asset records.
//! All writes funnel through the single-writer apply loop in `state`;
//! everything else observes the catalog through [`CatalogSnapshot`]s.

mod ids;
mod state;
mod types;

pub use ids::{AssetId, ScopeId};
pub use state::{CatalogSnapshot, VisibleRecord};
pub use types::{AssetRecord, UploadFile, UsageLocation, UsageState};

pub(crate) use state::{spawn_apply_loop, Intent, UsageAdmission, CONFLICT_MESSAGE};
