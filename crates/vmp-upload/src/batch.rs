//! Upload batch state
//!
//! A batch is the single owner of its items. Every mutation goes through
//! the snapshot publisher, so subscribers observe each change as a fresh
//! [`BatchSnapshot`] with aggregate percent and completion recomputed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vmp_core::{
    BatchId, BatchSnapshot, FileHandle, ItemId, Publisher, SnapshotStream, UploadError, UploadItem,
    UploadStatus,
};

/// Items submitted together, with their live progress
#[derive(Debug, Clone)]
pub struct UploadBatch {
    inner: Arc<BatchInner>,
}

#[derive(Debug)]
struct BatchInner {
    id: BatchId,
    state: Publisher<BatchSnapshot>,
    dispatching: AtomicBool,
    rounds_completed: AtomicU64,
    notice_generation: AtomicU64,
}

fn refresh(snapshot: &mut BatchSnapshot) {
    let items = std::mem::take(&mut snapshot.items);
    let notice = snapshot.error_notice.take();
    *snapshot = BatchSnapshot::from_items(snapshot.batch_id, items, notice);
}

impl UploadBatch {
    pub(crate) fn new(items: Vec<UploadItem>) -> Self {
        let id = BatchId::new();
        Self {
            inner: Arc::new(BatchInner {
                id,
                state: Publisher::new(BatchSnapshot::from_items(id, items, None)),
                dispatching: AtomicBool::new(false),
                rounds_completed: AtomicU64::new(0),
                notice_generation: AtomicU64::new(0),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> BatchId {
        self.inner.id
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> BatchSnapshot {
        self.inner.state.current()
    }

    /// Stream of snapshots, starting with the current one
    #[must_use]
    pub fn subscribe(&self) -> SnapshotStream<BatchSnapshot> {
        self.inner.state.subscribe()
    }

    /// Whether a dispatch round is running
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.load(Ordering::SeqCst)
    }

    /// Dispatch rounds that ran to completion
    #[must_use]
    pub fn rounds_completed(&self) -> u64 {
        self.inner.rounds_completed.load(Ordering::SeqCst)
    }

    /// Remove a pending item. Returns `false` if it is not pending.
    pub fn discard(&self, id: ItemId) -> bool {
        self.update_if(|items| {
            let before = items.len();
            items.retain(|item| item.id != id || item.status != UploadStatus::Pending);
            items.len() != before
        })
    }

    /// Remove every item and the error notice.
    ///
    /// # Errors
    /// `UploadError::BatchInFlight` while a dispatch round is running.
    pub fn clear(&self) -> Result<(), UploadError> {
        if self.is_dispatching() {
            return Err(UploadError::BatchInFlight);
        }
        self.inner.notice_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.update(|snapshot| {
            snapshot.items.clear();
            snapshot.error_notice = None;
            refresh(snapshot);
        });
        Ok(())
    }

    /// Dismiss the batch error notice
    pub fn dismiss_notice(&self) {
        self.inner.notice_generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.update_if(|snapshot| snapshot.error_notice.take().is_some());
    }

    pub(crate) fn pending_names(&self) -> Vec<String> {
        self.snapshot()
            .items
            .into_iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .map(|item| item.file.name)
            .collect()
    }

    pub(crate) fn push(&self, files: Vec<FileHandle>) {
        if files.is_empty() {
            return;
        }
        self.update_if(|items| {
            items.extend(files.into_iter().map(UploadItem::pending));
            true
        });
    }

    /// Enter a dispatch round; `false` if one is already running
    pub(crate) fn try_begin_round(&self) -> bool {
        !self.inner.dispatching.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn end_round(&self, completed: bool) {
        if completed {
            self.inner.rounds_completed.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.dispatching.store(false, Ordering::SeqCst);
    }

    /// Reset Pending and Error items to a fresh Pending state and return
    /// their ids in enqueue order
    pub(crate) fn claim_unfinished(&self) -> Vec<ItemId> {
        let mut claimed = Vec::new();
        self.inner.state.update_if(|snapshot| {
            for item in &mut snapshot.items {
                if matches!(item.status, UploadStatus::Pending | UploadStatus::Error) {
                    item.status = UploadStatus::Pending;
                    item.percent = 0.0;
                    item.error = None;
                    claimed.push(item.id);
                }
            }
            if claimed.is_empty() {
                return false;
            }
            snapshot.error_notice = None;
            refresh(snapshot);
            true
        });
        if !claimed.is_empty() {
            self.inner.notice_generation.fetch_add(1, Ordering::SeqCst);
        }
        claimed
    }

    /// Mark an item Uploading and return its file; `None` if it was discarded
    pub(crate) fn start_item(&self, id: ItemId) -> Option<FileHandle> {
        let mut file = None;
        self.update_if(|items| {
            let Some(item) = items
                .iter_mut()
                .find(|item| item.id == id && item.status == UploadStatus::Pending)
            else {
                return false;
            };
            item.status = UploadStatus::Uploading;
            item.percent = 0.0;
            file = Some(item.file.clone());
            true
        });
        file
    }

    /// Record progress; percent never moves backwards
    pub(crate) fn set_percent(&self, id: ItemId, percent: f32) {
        self.update_if(|items| match find_uploading(items, id) {
            Some(item) if percent > item.percent => {
                item.percent = percent;
                true
            }
            _ => false,
        });
    }

    pub(crate) fn finish_item(&self, id: ItemId, result: Result<(), UploadError>) {
        self.update_if(|items| {
            let Some(item) = find_uploading(items, id) else {
                return false;
            };
            match result {
                Ok(()) => {
                    item.status = UploadStatus::Complete;
                    item.percent = 100.0;
                }
                Err(e) => {
                    item.status = UploadStatus::Error;
                    item.error = Some(e.to_string());
                }
            }
            true
        });
    }

    /// Put items interrupted mid-upload back to Pending
    pub(crate) fn reset_interrupted(&self, ids: &[ItemId]) {
        self.update_if(|items| {
            let mut changed = false;
            for item in items.iter_mut() {
                if item.status == UploadStatus::Uploading && ids.contains(&item.id) {
                    item.status = UploadStatus::Pending;
                    item.percent = 0.0;
                    changed = true;
                }
            }
            changed
        });
    }

    /// Publish a batch-level notice, optionally dismissing it after `dismiss_after`
    pub(crate) fn post_notice(&self, notice: String, dismiss_after: Option<Duration>) {
        let generation = self.inner.notice_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.update(|snapshot| snapshot.error_notice = Some(notice));

        if let Some(delay) = dismiss_after {
            let batch = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let Some(inner) = batch.upgrade() else {
                    return;
                };
                if inner.notice_generation.load(Ordering::SeqCst) == generation {
                    inner
                        .state
                        .update_if(|snapshot| snapshot.error_notice.take().is_some());
                }
            });
        }
    }

    /// Apply `f` to the items; publish a recomputed snapshot if it returns `true`
    fn update_if(&self, f: impl FnOnce(&mut Vec<UploadItem>) -> bool) -> bool {
        self.inner.state.update_if(|snapshot| {
            if !f(&mut snapshot.items) {
                return false;
            }
            refresh(snapshot);
            true
        })
    }
}

fn find_uploading(items: &mut [UploadItem], id: ItemId) -> Option<&mut UploadItem> {
    items
        .iter_mut()
        .find(|item| item.id == id && item.status == UploadStatus::Uploading)
}
