//! Catalog state and the single-writer apply loop
//!
//! Every store transition is an [`Intent`] applied by one task that owns the
//! state. Operations never mutate the catalog directly: they submit intents
//! and, where they need an atomic read-and-reserve (admission, optimistic
//! apply), receive the answer over a oneshot reply. Each applied intent is
//! one atomic observable transition; the loop publishes a fresh
//! [`CatalogSnapshot`] after every one, so readers never see a half-applied
//! page or a half-replaced placeholder.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::selection::{sorted_view, SelectionSet, SortSpec};
use crate::status::{OperationKind, OperationStatus, StatusBoard};

use super::ids::AssetId;
use super::types::{AssetRecord, UsageLocation, UsageState};

/// Message shown when a second mutation targets an id already in flight
pub(crate) const CONFLICT_MESSAGE: &str =
    "Another operation is already in progress for this file.";

/// Message shown when a mutation targets an id the catalog does not hold
pub(crate) const MISSING_MESSAGE: &str = "File not found in the catalog.";

/// Per-record state machine
///
/// `Pending` is an unconfirmed upload placeholder (visible), `Removing` an
/// optimistic delete (retained but hidden). Rollback is a variant
/// transition: discard the `Pending`, or restore the `Committed` behind a
/// `Removing`.
#[derive(Clone, Debug)]
enum Slot {
    Committed(AssetRecord),
    Pending(AssetRecord),
    Removing(AssetRecord),
}

impl Slot {
    fn record(&self) -> &AssetRecord {
        match self {
            Slot::Committed(record) | Slot::Pending(record) | Slot::Removing(record) => record,
        }
    }

    fn is_visible(&self) -> bool {
        !matches!(self, Slot::Removing(_))
    }
}

/// Admission answer for a usage resolution
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum UsageAdmission {
    /// Not cached; the resolver should fetch
    Fetch,
    /// Already resolved; no fetch needed
    Cached,
    /// Unknown id; already reported as failed
    Missing,
}

/// One atomic store transition
pub(crate) enum Intent {
    StartLoad {
        reply: oneshot::Sender<u64>,
    },
    CommitPage {
        generation: u64,
        records: Vec<AssetRecord>,
        total_count: u64,
        has_more: bool,
        /// false when the page belongs to a superseded pass
        reply: oneshot::Sender<bool>,
    },
    FinishLoad {
        generation: u64,
        status: OperationStatus,
        message: Option<String>,
    },

    StagePlaceholder {
        display_name: String,
        content_type: String,
        file_size_bytes: u64,
        insert_index: usize,
        reply: oneshot::Sender<AssetId>,
    },
    ConfirmPlaceholder {
        placeholder: AssetId,
        record: AssetRecord,
    },
    DiscardPlaceholder {
        placeholder: AssetId,
        message: String,
    },

    StageRemoval {
        id: AssetId,
        /// false when rejected (conflict or unknown id)
        reply: oneshot::Sender<bool>,
    },
    CommitRemoval {
        id: AssetId,
    },
    RestoreRemoval {
        id: AssetId,
        message: String,
    },

    StageLock {
        id: AssetId,
        locked: bool,
        /// prior value when admitted, `None` when rejected
        reply: oneshot::Sender<Option<bool>>,
    },
    CommitLock {
        id: AssetId,
    },
    RevertLock {
        id: AssetId,
        prior: bool,
        message: String,
    },

    BeginUsage {
        id: AssetId,
        reply: oneshot::Sender<UsageAdmission>,
    },
    CommitUsage {
        id: AssetId,
        locations: Vec<UsageLocation>,
    },
    FailUsage {
        message: String,
    },
    InvalidateUsage {
        id: AssetId,
    },

    MarkInProgress {
        kind: OperationKind,
    },
    FinishOperation {
        kind: OperationKind,
        status: OperationStatus,
        message: Option<String>,
    },

    ToggleSelect {
        id: AssetId,
    },
    ClearSelection,
    SelectAllVisible,
    SetSort {
        spec: SortSpec,
    },

    /// Resolves once every previously submitted intent has been applied
    Barrier {
        reply: oneshot::Sender<()>,
    },
}

/// A record as exposed to the presentation layer
#[derive(Clone, Debug)]
pub struct VisibleRecord {
    pub record: AssetRecord,
    /// Unconfirmed upload placeholder awaiting the server's record
    pub pending: bool,
}

/// Consistent point-in-time view of the catalog
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    records: Vec<VisibleRecord>,
    total_count: u64,
    has_more: bool,
    selection: SelectionSet,
    sort: SortSpec,
    statuses: StatusBoard,
}

impl CatalogSnapshot {
    /// Visible records in insertion order
    pub fn records(&self) -> &[VisibleRecord] {
        &self.records
    }

    /// Visible records ordered by the current sort spec (stable; ties keep
    /// insertion order). Stored order is untouched.
    pub fn sorted_records(&self) -> Vec<&AssetRecord> {
        sorted_view(self.records.iter().map(|v| &v.record), self.sort)
    }

    pub fn record(&self, id: &AssetId) -> Option<&AssetRecord> {
        self.records
            .iter()
            .map(|v| &v.record)
            .find(|record| record.id == *id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Server-reported total, kept consistent across confirmed mutations
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn status(&self, kind: OperationKind) -> OperationStatus {
        self.statuses.status(kind)
    }

    pub fn message(&self, kind: OperationKind) -> Option<&str> {
        self.statuses.message(kind)
    }
}

/// The authoritative catalog state; owned by the apply loop, never shared
#[derive(Debug, Default)]
struct CatalogState {
    slots: Vec<Slot>,
    total_count: u64,
    has_more: bool,
    /// Current load pass; results from older passes are discarded
    generation: u64,
    placeholder_seq: u64,
    /// Ids with a mutation in flight; at most one per id
    in_flight: HashSet<AssetId>,
    selection: SelectionSet,
    sort: SortSpec,
    statuses: StatusBoard,
}

impl CatalogState {
    fn position(&self, id: &AssetId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.record().id == *id)
    }

    fn slot(&self, id: &AssetId) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.record().id == *id)
    }

    fn slot_mut(&mut self, id: &AssetId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|slot| slot.record().id == *id)
    }

    /// Map an index over visible records to an index into `slots`, clamped
    fn visible_to_slot_index(&self, visible_index: usize) -> usize {
        let mut remaining = visible_index;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_visible() {
                if remaining == 0 {
                    return i;
                }
                remaining -= 1;
            }
        }
        self.slots.len()
    }

    fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            records: self
                .slots
                .iter()
                .filter(|slot| slot.is_visible())
                .map(|slot| VisibleRecord {
                    record: slot.record().clone(),
                    pending: matches!(slot, Slot::Pending(_)),
                })
                .collect(),
            total_count: self.total_count,
            has_more: self.has_more,
            selection: self.selection.clone(),
            sort: self.sort,
            statuses: self.statuses.clone(),
        }
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::StartLoad { reply } => {
                self.generation += 1;
                self.slots.clear();
                self.selection.clear();
                self.in_flight.clear();
                self.total_count = 0;
                self.has_more = false;
                self.statuses.begin(OperationKind::Load);
                let _ = reply.send(self.generation);
            }
            Intent::CommitPage {
                generation,
                records,
                total_count,
                has_more,
                reply,
            } => {
                if generation != self.generation {
                    let _ = reply.send(false);
                    return;
                }
                self.slots.extend(records.into_iter().map(Slot::Committed));
                self.total_count = total_count;
                self.has_more = has_more;
                let _ = reply.send(true);
            }
            Intent::FinishLoad {
                generation,
                status,
                message,
            } => {
                if generation == self.generation {
                    self.statuses.finish(OperationKind::Load, status, message);
                }
            }

            Intent::StagePlaceholder {
                display_name,
                content_type,
                file_size_bytes,
                insert_index,
                reply,
            } => {
                self.placeholder_seq += 1;
                let id = AssetId::placeholder(self.placeholder_seq);
                let record =
                    AssetRecord::new(id.clone(), display_name, content_type, file_size_bytes);
                let at = self.visible_to_slot_index(insert_index);
                self.slots.insert(at, Slot::Pending(record));
                self.in_flight.insert(id.clone());
                self.statuses.begin(OperationKind::Add);
                let _ = reply.send(id);
            }
            Intent::ConfirmPlaceholder {
                placeholder,
                record,
            } => {
                self.in_flight.remove(&placeholder);
                // a reload may have dropped the placeholder; the confirmed
                // record is then discarded with the rest of the stale state
                if let Some(pos) = self.position(&placeholder) {
                    self.slots[pos] = Slot::Committed(record);
                    self.total_count += 1;
                }
                self.statuses
                    .finish(OperationKind::Add, OperationStatus::Successful, None);
            }
            Intent::DiscardPlaceholder {
                placeholder,
                message,
            } => {
                self.in_flight.remove(&placeholder);
                if let Some(pos) = self.position(&placeholder) {
                    self.slots.remove(pos);
                }
                self.statuses
                    .finish(OperationKind::Add, OperationStatus::Failed, Some(message));
            }

            Intent::StageRemoval { id, reply } => {
                let admitted = !self.in_flight.contains(&id)
                    && matches!(self.slot(&id), Some(Slot::Committed(_)));
                if admitted {
                    if let Some(slot) = self.slot_mut(&id) {
                        if let Slot::Committed(record) = slot {
                            let record = record.clone();
                            *slot = Slot::Removing(record);
                        }
                    }
                    self.in_flight.insert(id);
                    self.statuses.begin(OperationKind::Delete);
                } else {
                    let message = if self.position(&id).is_some() {
                        CONFLICT_MESSAGE
                    } else {
                        MISSING_MESSAGE
                    };
                    self.statuses.finish(
                        OperationKind::Delete,
                        OperationStatus::Failed,
                        Some(message.to_string()),
                    );
                }
                let _ = reply.send(admitted);
            }
            Intent::CommitRemoval { id } => {
                self.in_flight.remove(&id);
                if let Some(pos) = self.position(&id) {
                    self.slots.remove(pos);
                    // same transition: a removed id never lingers in the
                    // selection
                    self.selection.remove(&id);
                    self.total_count = self.total_count.saturating_sub(1);
                }
                self.statuses
                    .finish(OperationKind::Delete, OperationStatus::Successful, None);
            }
            Intent::RestoreRemoval { id, message } => {
                self.in_flight.remove(&id);
                if let Some(slot) = self.slot_mut(&id) {
                    if let Slot::Removing(record) = slot {
                        let record = record.clone();
                        *slot = Slot::Committed(record);
                    }
                }
                self.statuses.finish(
                    OperationKind::Delete,
                    OperationStatus::Failed,
                    Some(message),
                );
            }

            Intent::StageLock { id, locked, reply } => {
                let mut prior = None;
                if !self.in_flight.contains(&id) {
                    if let Some(Slot::Committed(record)) = self.slot_mut(&id) {
                        prior = Some(record.locked);
                        record.locked = locked;
                    }
                }
                if prior.is_some() {
                    self.in_flight.insert(id);
                    self.statuses.begin(OperationKind::LockUpdate);
                } else {
                    let message = if self.position(&id).is_some() {
                        CONFLICT_MESSAGE
                    } else {
                        MISSING_MESSAGE
                    };
                    self.statuses.finish(
                        OperationKind::LockUpdate,
                        OperationStatus::Failed,
                        Some(message.to_string()),
                    );
                }
                let _ = reply.send(prior);
            }
            Intent::CommitLock { id } => {
                self.in_flight.remove(&id);
                self.statuses.finish(
                    OperationKind::LockUpdate,
                    OperationStatus::Successful,
                    None,
                );
            }
            Intent::RevertLock { id, prior, message } => {
                self.in_flight.remove(&id);
                if let Some(Slot::Committed(record)) = self.slot_mut(&id) {
                    record.locked = prior;
                }
                self.statuses.finish(
                    OperationKind::LockUpdate,
                    OperationStatus::Failed,
                    Some(message),
                );
            }

            Intent::BeginUsage { id, reply } => {
                let admission = match self.slot(&id) {
                    Some(Slot::Committed(record)) => {
                        if record.usage.is_resolved() {
                            UsageAdmission::Cached
                        } else {
                            UsageAdmission::Fetch
                        }
                    }
                    _ => UsageAdmission::Missing,
                };
                match admission {
                    UsageAdmission::Fetch => self.statuses.begin(OperationKind::UsageFetch),
                    UsageAdmission::Cached => self.statuses.finish(
                        OperationKind::UsageFetch,
                        OperationStatus::Successful,
                        None,
                    ),
                    UsageAdmission::Missing => self.statuses.finish(
                        OperationKind::UsageFetch,
                        OperationStatus::Failed,
                        Some(MISSING_MESSAGE.to_string()),
                    ),
                }
                let _ = reply.send(admission);
            }
            Intent::CommitUsage { id, locations } => {
                if let Some(Slot::Committed(record)) = self.slot_mut(&id) {
                    record.usage = UsageState::Resolved(locations);
                }
                self.statuses.finish(
                    OperationKind::UsageFetch,
                    OperationStatus::Successful,
                    None,
                );
            }
            Intent::FailUsage { message } => {
                self.statuses.finish(
                    OperationKind::UsageFetch,
                    OperationStatus::Failed,
                    Some(message),
                );
            }
            Intent::InvalidateUsage { id } => {
                if let Some(Slot::Committed(record)) = self.slot_mut(&id) {
                    record.usage = UsageState::Unresolved;
                }
            }

            Intent::MarkInProgress { kind } => self.statuses.begin(kind),
            Intent::FinishOperation {
                kind,
                status,
                message,
            } => self.statuses.finish(kind, status, message),

            Intent::ToggleSelect { id } => {
                // pending placeholders are not selectable
                if matches!(self.slot(&id), Some(Slot::Committed(_))) {
                    self.selection.toggle(id);
                }
            }
            Intent::ClearSelection => self.selection.clear(),
            Intent::SelectAllVisible => {
                let ids: Vec<AssetId> = self
                    .slots
                    .iter()
                    .filter(|slot| matches!(slot, Slot::Committed(_)))
                    .map(|slot| slot.record().id.clone())
                    .collect();
                for id in ids {
                    self.selection.insert(id);
                }
            }
            Intent::SetSort { spec } => self.sort = spec,

            Intent::Barrier { reply } => {
                let _ = reply.send(());
            }
        }
    }
}

/// Spawn the apply loop; returns the intent sender, the snapshot watch, and
/// the loop's task handle. The loop exits when every sender is dropped.
pub(crate) fn spawn_apply_loop() -> (
    mpsc::UnboundedSender<Intent>,
    watch::Receiver<CatalogSnapshot>,
    JoinHandle<()>,
) {
    let (intent_tx, mut intent_rx) = mpsc::unbounded_channel::<Intent>();
    let mut state = CatalogState::default();
    let (watch_tx, watch_rx) = watch::channel(state.snapshot());

    let handle = tokio::spawn(async move {
        while let Some(intent) = intent_rx.recv().await {
            state.apply(intent);
            let _ = watch_tx.send(state.snapshot());
        }
    });

    (intent_tx, watch_rx, handle)
}
