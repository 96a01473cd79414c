//! Per-request handle and shared state
//!
//! The handle owns the request's lifecycle: dropping it (or calling
//! [`AssetHandle::cancel`]) stops the pipeline task, discards any pending
//! scheduler entry and releases the surfaced blob.

use crate::controller::Pipeline;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use vmp_core::{AssetId, AssetRequest, AssetState, Phase, Publisher, SnapshotStream};
use vmp_transform::{BlobHandle, BlobStore};

/// How a pipeline run ended
#[derive(Debug)]
pub(crate) enum Outcome {
    Ready {
        locator: String,
        blob: Option<BlobHandle>,
    },
    Failed(String),
}

impl Outcome {
    pub(crate) fn ready(locator: impl Into<String>) -> Self {
        Self::Ready {
            locator: locator.into(),
            blob: None,
        }
    }
}

/// State shared between a handle and its pipeline task
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: AssetId,
    state: Publisher<AssetState>,
    /// Blob currently surfaced as the resolved locator.
    /// Held while finishing so cancellation cannot race a late result.
    blob: Mutex<Option<BlobHandle>>,
    blobs: Option<BlobStore>,
}

impl Shared {
    pub(crate) fn new(id: AssetId, blobs: Option<BlobStore>) -> Self {
        Self {
            id,
            state: Publisher::new(AssetState::idle()),
            blob: Mutex::new(None),
            blobs,
        }
    }

    /// Publish `next` if the phase edge is allowed and the handle is live
    pub(crate) fn transition(&self, next: AssetState) -> bool {
        let id = self.id;
        self.state.update_if(|current| {
            if !current.phase.can_transition_to(next.phase) {
                tracing::debug!(asset = %id, from = ?current.phase, to = ?next.phase, "Ignoring transition");
                return false;
            }
            tracing::debug!(asset = %id, from = ?current.phase, to = ?next.phase, "Asset transition");
            *current = next;
            true
        })
    }

    pub(crate) fn finish(&self, outcome: Outcome, started: Instant) {
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut slot = self.blob.lock();
        match outcome {
            Outcome::Ready { locator, blob } => {
                if self.transition(AssetState::ready(locator, elapsed_ms)) {
                    if let Some(previous) = blob.and_then(|blob| slot.replace(blob)) {
                        self.release(&previous);
                    }
                } else if let Some(blob) = blob {
                    self.release(&blob);
                }
            }
            Outcome::Failed(message) => {
                self.transition(AssetState::error(message, elapsed_ms));
            }
        }
    }

    /// Take ownership of a fresh blob ahead of publishing Ready.
    ///
    /// Returns `false` and releases the blob if the handle is already closed.
    pub(crate) fn adopt(&self, blob: BlobHandle) -> bool {
        let mut slot = self.blob.lock();
        if self.state.is_closed() {
            self.release(&blob);
            return false;
        }
        if let Some(previous) = slot.replace(blob) {
            self.release(&previous);
        }
        true
    }

    fn release(&self, blob: &BlobHandle) {
        if let Some(store) = &self.blobs {
            store.release(blob);
        }
    }

    fn release_slot(&self, slot: &mut Option<BlobHandle>) {
        if let Some(blob) = slot.take() {
            self.release(&blob);
        }
    }
}

/// Live view of one asset request
///
/// Dropping the handle cancels the request.
#[derive(Debug)]
pub struct AssetHandle {
    shared: Arc<Shared>,
    pipeline: Arc<Pipeline>,
    request: AssetRequest,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AssetHandle {
    pub(crate) fn new(
        shared: Arc<Shared>,
        pipeline: Arc<Pipeline>,
        request: AssetRequest,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shared,
            pipeline,
            request,
            task: Mutex::new(Some(task)),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AssetId {
        self.shared.id
    }

    #[inline]
    #[must_use]
    pub fn request(&self) -> &AssetRequest {
        &self.request
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> AssetState {
        self.shared.state.current()
    }

    /// Stream of state snapshots, starting with the current one.
    ///
    /// Ends when the handle is cancelled or dropped.
    #[must_use]
    pub fn subscribe(&self) -> SnapshotStream<AssetState> {
        self.shared.state.subscribe()
    }

    /// Whether the handle was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.state.is_closed()
    }

    /// Cancel the request. No state is emitted after this returns.
    pub fn cancel(&self) {
        let mut slot = self.shared.blob.lock();
        if self.shared.state.is_closed() {
            return;
        }
        self.shared.state.close();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.shared.release_slot(&mut slot);
        tracing::debug!(asset = %self.shared.id, "Asset request cancelled");
    }

    /// Run the pipeline again after a terminal error.
    ///
    /// Only valid in [`Phase::Error`]; returns `false` (doing nothing)
    /// otherwise or after cancellation. Must be called within a Tokio
    /// runtime.
    pub fn retry(&self) -> bool {
        let mut slot = self.shared.blob.lock();
        let reset = self.shared.state.update_if(|current| {
            if current.phase != Phase::Error {
                return false;
            }
            *current = AssetState::loading();
            true
        });
        if !reset {
            return false;
        }
        self.shared.release_slot(&mut slot);
        drop(slot);

        tracing::info!(asset = %self.shared.id, "Retrying asset request");
        let started = Instant::now();
        let task = tokio::spawn(Arc::clone(&self.pipeline).resolve(
            self.request.clone(),
            Arc::clone(&self.shared),
            started,
        ));
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        true
    }
}

impl Drop for AssetHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
