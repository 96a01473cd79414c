//! VMP Transform Worker Pool
//!
//! Runs CPU-bound image transforms off the async orchestration threads:
//! - A fixed, index-addressed arena of workers fed from one FIFO queue
//! - Never more transforms in flight than configured workers
//! - Transformed results surfaced as releasable [`BlobHandle`]s
//!
//! When the pool has no workers, [`TransformPool::is_available`] is `false`
//! and callers are expected to use the original asset unmodified.

#![warn(unreachable_pub)]

pub mod blob;
pub mod pool;
pub mod transformer;

pub use blob::{BlobHandle, BlobId, BlobStore};
pub use pool::{PoolStats, TransformPool};
pub use transformer::{
    parse_hex_color, CropRegion, ImageResizer, ImageTransformer, TransformOp, TransformOptions, DEFAULT_CROP_OUTPUT,
    DEFAULT_MATTE_CANVAS,
};
