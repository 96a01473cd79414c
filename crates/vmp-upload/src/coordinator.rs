//! Upload coordinator
//!
//! Validates selections into batches and dispatches them through the
//! caller's [`FileUploader`]:
//! - At most `concurrency` uploads per batch run at once; with 1 they run
//!   in enqueue order
//! - One failing item never aborts the others
//! - Re-dispatch only touches items that are not Complete

use crate::batch::UploadBatch;
use crate::validate::validate;
use futures::StreamExt;
use std::sync::Arc;
use vmp_core::{
    BatchSnapshot, FileHandle, FileUploader, ItemId, ProgressSink, UploadConfig, UploadError,
    UploadStatus, ValidationError,
};

/// Result of [`UploadCoordinator::enqueue`]
#[derive(Debug)]
pub struct Enqueued {
    /// The new batch, holding every accepted file as Pending
    pub batch: UploadBatch,
    /// Files refused by validation
    pub rejected: Vec<ValidationError>,
}

/// Creates and dispatches upload batches
#[derive(Clone)]
pub struct UploadCoordinator {
    uploader: Arc<dyn FileUploader>,
    config: UploadConfig,
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Resets the round when a dispatch future is dropped part-way
struct RoundGuard<'a> {
    batch: &'a UploadBatch,
    claimed: Vec<ItemId>,
    finished: bool,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(batch = %self.batch.id(), "Dispatch interrupted");
            self.batch.reset_interrupted(&self.claimed);
        }
        self.batch.end_round(self.finished);
    }
}

impl UploadCoordinator {
    #[must_use]
    pub fn new(uploader: Arc<dyn FileUploader>, config: UploadConfig) -> Self {
        Self { uploader, config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate files into a new pending batch. No upload starts.
    pub fn enqueue(&self, files: Vec<FileHandle>) -> Enqueued {
        let validated = validate(&self.config, files, &[]);
        for rejection in &validated.rejected {
            tracing::info!(name = %rejection.file_name(), reason = %rejection, "File rejected");
        }
        let batch = UploadBatch::new(Vec::new());
        batch.push(validated.accepted);
        tracing::debug!(
            batch = %batch.id(),
            accepted = batch.snapshot().items.len(),
            rejected = validated.rejected.len(),
            "Batch enqueued"
        );
        Enqueued {
            batch,
            rejected: validated.rejected,
        }
    }

    /// Add files to an existing batch.
    ///
    /// # Errors
    /// `UploadError::BatchInFlight` while the batch is being dispatched.
    pub fn extend(&self, batch: &UploadBatch, files: Vec<FileHandle>) -> Result<Vec<ValidationError>, UploadError> {
        if batch.is_dispatching() {
            return Err(UploadError::BatchInFlight);
        }
        let validated = validate(&self.config, files, &batch.pending_names());
        batch.push(validated.accepted);
        Ok(validated.rejected)
    }

    /// Upload every Pending or Error item of the batch.
    ///
    /// Returns the snapshot at the end of the round, or `None` when there
    /// was nothing to do (all Complete, empty, or a round already running).
    #[tracing::instrument(skip_all, fields(batch = %batch.id()))]
    pub async fn dispatch(&self, batch: &UploadBatch) -> Option<BatchSnapshot> {
        if !batch.try_begin_round() {
            tracing::debug!("Dispatch already running");
            return None;
        }
        let claimed = batch.claim_unfinished();
        if claimed.is_empty() {
            tracing::debug!("Nothing to dispatch");
            batch.end_round(false);
            return None;
        }
        let mut guard = RoundGuard {
            batch,
            claimed: claimed.clone(),
            finished: false,
        };
        tracing::info!(items = claimed.len(), concurrency = self.config.concurrency, "Dispatching batch");

        futures::stream::iter(claimed.iter().copied())
            .for_each_concurrent(self.config.concurrency.max(1), |id| self.upload_item(batch, id))
            .await;

        let snapshot = batch.snapshot();
        let failed = snapshot
            .items
            .iter()
            .filter(|item| claimed.contains(&item.id) && item.status == UploadStatus::Error)
            .count();
        if failed > 0 {
            let notice = format!("{failed} of {} uploads failed", claimed.len());
            tracing::warn!(failed, "Batch finished with failures");
            batch.post_notice(notice, self.config.dismiss_errors_after());
        } else {
            tracing::info!("Batch finished");
        }

        guard.finished = true;
        drop(guard);
        Some(batch.snapshot())
    }

    async fn upload_item(&self, batch: &UploadBatch, id: ItemId) {
        let Some(file) = batch.start_item(id) else {
            // Discarded while waiting for its turn.
            return;
        };
        tracing::debug!(item = %id, name = %file.name, "Upload started");

        // The upload decides when the item is done; a transport may keep a
        // sink clone alive past its own completion.
        let (sink, mut progress) = ProgressSink::channel();
        let upload = self.uploader.upload(&file, sink);
        tokio::pin!(upload);
        let result = loop {
            tokio::select! {
                biased;
                Some(percent) = progress.next() => batch.set_percent(id, percent),
                result = &mut upload => break result,
            }
        };
        while let Some(percent) = progress.try_next() {
            batch.set_percent(id, percent);
        }
        drop(progress);

        match &result {
            Ok(()) => tracing::debug!(item = %id, "Upload complete"),
            Err(e) => tracing::warn!(item = %id, name = %file.name, error = %e, "Upload failed"),
        }
        batch.finish_item(id, result);
    }
}
