//! Per-operation request status tracking
//!
//! Each operation kind tracks its outcome independently, so concurrent
//! operations cannot clobber each other's status. The board also carries the
//! user-facing message for the last terminal outcome; a non-successful
//! terminal status always has one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of one named asynchronous operation
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[default]
    Idle,
    InProgress,
    Successful,
    Failed,
    /// Some but not all paginated results were retrieved; usable data exists
    PartialFailure,
    /// Authorization failure, distinct from a generic failure
    Denied,
}

impl OperationStatus {
    /// Whether this is a terminal, non-successful outcome
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            OperationStatus::Failed | OperationStatus::PartialFailure | OperationStatus::Denied
        )
    }

    /// Whether the operation has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Idle | OperationStatus::InProgress)
    }
}

/// The operations the tracker distinguishes
#[derive(Copy, Clone, Debug, Deserialize, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Load,
    Add,
    Delete,
    LockUpdate,
    UsageFetch,
    BulkDownload,
}

/// Message used when a failure carries no usable detail
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred.";

#[derive(Clone, Debug, PartialEq, Eq)]
struct StatusEntry {
    status: OperationStatus,
    message: Option<String>,
}

/// Tracks status and message per operation kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusBoard {
    entries: HashMap<OperationKind, StatusEntry>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status of an operation kind; `Idle` if it has never run
    pub fn status(&self, kind: OperationKind) -> OperationStatus {
        self.entries
            .get(&kind)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Message attached to the last terminal outcome of an operation kind
    pub fn message(&self, kind: OperationKind) -> Option<&str> {
        self.entries
            .get(&kind)
            .and_then(|entry| entry.message.as_deref())
    }

    /// Mark an operation in progress, clearing any previous message
    pub(crate) fn begin(&mut self, kind: OperationKind) {
        self.entries.insert(
            kind,
            StatusEntry {
                status: OperationStatus::InProgress,
                message: None,
            },
        );
    }

    /// Record a terminal outcome
    ///
    /// A non-successful status with no message (or an empty one) falls back
    /// to [`FALLBACK_ERROR_MESSAGE`], so error statuses are never silent.
    pub(crate) fn finish(
        &mut self,
        kind: OperationKind,
        status: OperationStatus,
        message: Option<String>,
    ) {
        let message = if status.is_error() {
            Some(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
            )
        } else {
            message
        };
        self.entries.insert(kind, StatusEntry { status, message });
    }
}
