//! VMP Upload Coordinator
//!
//! Concurrent multi-file upload with per-file and aggregate progress,
//! failure isolation and selective retry.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = UploadCoordinator::new(uploader, UploadConfig::default());
//! let Enqueued { batch, rejected } = coordinator.enqueue(files);
//! let mut progress = batch.subscribe();
//! tokio::spawn(async move {
//!     while let Some(snapshot) = progress.next().await {
//!         println!("{:.0}%", snapshot.aggregate_percent);
//!     }
//! });
//! coordinator.dispatch(&batch).await;
//! ```

#![warn(unreachable_pub)]

pub mod batch;
pub mod coordinator;
mod validate;

pub use batch::UploadBatch;
pub use coordinator::{Enqueued, UploadCoordinator};
