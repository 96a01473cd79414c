//! VMP Core - shared building blocks of the vehicle media pipeline
//!
//! Everything the pipeline components agree on lives here:
//! - Identifiers, asset requests/states and upload items
//! - The error taxonomy (network, transform, validation, upload)
//! - Pipeline configuration (TOML-loadable)
//! - Snapshot publishing: immutable state snapshots delivered as streams
//! - The external capability contracts (`AssetFetcher`, `FileUploader`)
//!
//! # Example
//!
//! ```rust,ignore
//! use vmp_core::{AssetRequest, Priority, Publisher, AssetState};
//!
//! let request = AssetRequest::new("https://cdn.example.com/cars/911.jpg")
//!     .with_priority(Priority::Immediate)
//!     .with_target_dimensions(640, 480);
//!
//! let publisher = Publisher::new(AssetState::idle());
//! let mut states = publisher.subscribe();
//! ```

#![warn(unreachable_pub)]

pub mod capability;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;

// Re-exports for convenience
pub use capability::{AssetFetcher, FileUploader, ProgressSink, ProgressStream};
pub use config::{
    DuplicatePolicy, LoadConfig, PipelineConfig, TransformConfig, UploadConfig, ViewportConfig,
};
pub use error::{
    ConfigError, NetworkError, PipelineError, TransformError, UploadError, ValidationError,
};
pub use snapshot::{Publisher, SnapshotStream};
pub use types::{
    AssetId, AssetRequest, AssetState, BatchId, BatchSnapshot, Dimensions, FileHandle,
    FileSource, ItemId, Phase, Priority, Rect, UploadItem, UploadStatus,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the pipeline
    pub use crate::{
        AssetFetcher, AssetRequest, AssetState, FileHandle, FileUploader, Phase,
        PipelineConfig, PipelineError, Priority, ProgressSink, Publisher, SnapshotStream,
        UploadStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
