//! External capabilities consumed by the pipeline
//!
//! The pipeline never talks to the network itself. Callers supply:
//! - [`AssetFetcher`] to fetch asset bytes by locator
//! - [`FileUploader`] to upload a selected file
//!
//! Upload progress flows back as a stream: the transport reports percentages
//! into a [`ProgressSink`] and the coordinator drains the paired
//! [`ProgressStream`].

use crate::error::{NetworkError, UploadError};
use crate::types::FileHandle;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Fetches raw asset bytes
#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the bytes behind a locator
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, NetworkError>;
}

/// Uploads one file, reporting progress as bytes are acknowledged
#[async_trait::async_trait]
pub trait FileUploader: Send + Sync {
    /// Upload a file; resolves once the transport reports a terminal result
    async fn upload(&self, file: &FileHandle, progress: ProgressSink) -> Result<(), UploadError>;
}

/// Transport side of an upload progress channel
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<f32>,
}

impl ProgressSink {
    /// Create a connected sink/stream pair
    #[must_use]
    pub fn channel() -> (ProgressSink, ProgressStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressSink { tx }, ProgressStream { rx })
    }

    /// Report percent acknowledged (clamped to 0..=100).
    ///
    /// Reports after the coordinator stopped listening are dropped.
    pub fn report(&self, percent: f32) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let _ = self.tx.send(percent);
    }

    /// Report progress as a byte count out of a total
    pub fn report_bytes(&self, sent: u64, total: u64) {
        if total == 0 {
            self.report(100.0);
            return;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let percent = (sent as f64 / total as f64 * 100.0) as f32;
        self.report(percent);
    }
}

/// Coordinator side of an upload progress channel
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<f32>,
}

impl ProgressStream {
    /// Take a buffered report without waiting
    pub fn try_next(&mut self) -> Option<f32> {
        self.rx.try_recv().ok()
    }
}

impl Stream for ProgressStream {
    type Item = f32;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<f32>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
