//! Transform worker pool
//!
//! A fixed arena of `workers` tasks pulls jobs from one bounded FIFO queue.
//! Each job runs on the blocking thread pool, so at most `workers`
//! transforms execute at once and the async runtime is never stalled by
//! image work.
//!
//! Jobs whose caller has gone away before a worker picks them up are
//! skipped without running.

use crate::blob::{BlobHandle, BlobStore};
use crate::transformer::{ImageResizer, ImageTransformer, TransformOptions};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use vmp_core::{TransformConfig, TransformError};

type JobReply = oneshot::Sender<Result<Vec<u8>, TransformError>>;

struct Job {
    input: Vec<u8>,
    options: TransformOptions,
    reply: JobReply,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Configured worker count
    pub workers: usize,
    /// Jobs waiting for a worker
    pub queued: usize,
    /// Jobs currently executing
    pub active: usize,
    /// Highest `active` ever observed
    pub peak_active: usize,
    /// Jobs that produced output
    pub completed: usize,
    /// Jobs that returned an error
    pub failed: usize,
    /// Jobs dropped because their caller stopped waiting
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl Counters {
    fn start(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
    }

    fn finish(&self, ok: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if ok {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Bounded pool of background image transform workers
pub struct TransformPool {
    config: TransformConfig,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    blobs: BlobStore,
}

impl std::fmt::Debug for TransformPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl TransformPool {
    /// Create a pool using the default [`ImageResizer`].
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Self::with_transformer(config, Arc::new(ImageResizer))
    }

    /// Create a pool running a custom transformer
    #[must_use]
    pub fn with_transformer(config: TransformConfig, transformer: Arc<dyn ImageTransformer>) -> Self {
        let counters = Arc::new(Counters::default());
        let blobs = BlobStore::new();

        if config.workers == 0 {
            tracing::info!("Transform pool disabled (no workers)");
            return Self {
                config,
                queue: Mutex::new(None),
                workers: Vec::new(),
                counters,
                blobs,
            };
        }

        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = (0..config.workers)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    Arc::clone(&rx),
                    Arc::clone(&transformer),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        tracing::info!(workers = config.workers, queue_depth = config.queue_depth, "Transform pool started");

        Self {
            config,
            queue: Mutex::new(Some(tx)),
            workers,
            counters,
            blobs,
        }
    }

    /// Whether transforms can be submitted
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.queue.lock().is_some()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Store backing the returned blob handles
    #[inline]
    #[must_use]
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Run a transform and surface the output as a blob
    ///
    /// # Errors
    /// Same as [`TransformPool::transform_bytes`].
    pub async fn transform(
        &self,
        input: Vec<u8>,
        options: TransformOptions,
    ) -> Result<BlobHandle, TransformError> {
        let bytes = self.transform_bytes(input, options).await?;
        Ok(self.blobs.register(bytes))
    }

    /// Queue a transform and wait for its output bytes.
    ///
    /// Jobs start in submission order. Dropping the returned future before
    /// a worker picks the job up means the job is never run.
    ///
    /// # Errors
    /// - `TransformError::Unavailable` if the pool has no workers or was shut down
    /// - `TransformError::WorkerLost` if the worker stopped without replying
    /// - Whatever the transformer itself reports
    pub async fn transform_bytes(
        &self,
        input: Vec<u8>,
        options: TransformOptions,
    ) -> Result<Vec<u8>, TransformError> {
        let queue = self.queue.lock().clone().ok_or(TransformError::Unavailable)?;
        let (reply, rx) = oneshot::channel();

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if queue.send(Job { input, options, reply }).await.is_err() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(TransformError::Unavailable);
        }

        rx.await.map_err(|_| TransformError::WorkerLost)?
    }

    /// Release a transformed blob; releasing twice is a no-op
    pub fn release(&self, handle: &BlobHandle) -> bool {
        self.blobs.release(handle)
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            workers: self.workers.len(),
            queued: c.queued.load(Ordering::SeqCst),
            active: c.active.load(Ordering::SeqCst),
            peak_active: c.peak_active.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work. Already queued jobs still run.
    pub fn shutdown(&self) {
        if self.queue.lock().take().is_some() {
            tracing::info!("Transform pool shutting down");
        }
    }
}

impl Drop for TransformPool {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop(
    index: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    transformer: Arc<dyn ImageTransformer>,
    counters: Arc<Counters>,
) {
    loop {
        let job = queue.lock().await.recv().await;
        let Some(Job { input, options, reply }) = job else {
            break;
        };
        counters.queued.fetch_sub(1, Ordering::SeqCst);

        if reply.is_closed() {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker = index, "Skipping transform, caller went away");
            continue;
        }

        counters.start();
        let transformer = Arc::clone(&transformer);
        let result = tokio::task::spawn_blocking(move || transformer.transform(&input, &options))
            .await
            .unwrap_or(Err(TransformError::WorkerLost));
        counters.finish(result.is_ok());

        if let Err(e) = &result {
            tracing::debug!(worker = index, error = %e, "Transform failed");
        }
        let _ = reply.send(result);
    }
    tracing::trace!(worker = index, "Transform worker exiting");
}
