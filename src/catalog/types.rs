//! Catalog record types

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::ids::AssetId;

/// Where an asset is referenced from within the course
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageLocation {
    /// Human-readable location (e.g. "subsection - unit / block")
    pub display_location: String,
    /// Link to the referencing location
    pub url: String,
}

impl UsageLocation {
    pub fn new(display_location: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            display_location: display_location.into(),
            url: url.into(),
        }
    }
}

/// Usage-reference cache state for one asset
///
/// `Unresolved` means the lookup never ran (or its last attempt failed);
/// `Resolved` with an empty list means it ran and found nothing. The two are
/// distinct states, not a nullable list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum UsageState {
    #[default]
    Unresolved,
    Resolved(Vec<UsageLocation>),
}

impl UsageState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, UsageState::Resolved(_))
    }

    /// Resolved locations, `None` while unresolved
    pub fn locations(&self) -> Option<&[UsageLocation]> {
        match self {
            UsageState::Resolved(locations) => Some(locations),
            UsageState::Unresolved => None,
        }
    }
}

/// One uploaded course file as known to the catalog
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: AssetId,
    pub display_name: String,
    pub content_type: String,
    pub file_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub locked: bool,
    pub thumbnail_url: Option<String>,
    pub usage: UsageState,
}

impl AssetRecord {
    /// Create a record with required fields
    pub fn new(
        id: AssetId,
        display_name: impl Into<String>,
        content_type: impl Into<String>,
        file_size_bytes: u64,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            content_type: content_type.into(),
            file_size_bytes,
            created_at: Utc::now(),
            locked: false,
            thumbnail_url: None,
            usage: UsageState::Unresolved,
        }
    }

    /// Set the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the locked flag
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Set the thumbnail URL
    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}

/// A local file blob staged for upload
#[derive(Clone, Debug)]
pub struct UploadFile {
    /// Original filename
    pub name: String,
    /// MIME type of the file (e.g. "image/png")
    pub content_type: String,
    /// File content
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}
