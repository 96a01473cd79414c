//! VMP Simulator
//!
//! Runs the pipeline against the local filesystem:
//! - `load`: scroll a column of placeholders over a directory of images
//! - `upload`: validate and copy a selection of files into a destination
//! - `canvas`: extend or crop a studio shot onto a fixed-height canvas
//! - `crop`, `matte`: place a region or a whole photo on a fixed-size canvas
//!
//! The filesystem capabilities ([`FsFetcher`], [`FsUploader`]) are usable on
//! their own as stand-ins for a CDN and an upload endpoint.

#![warn(unreachable_pub)]

pub mod fs;
pub mod sim;

pub use fs::{FsFetcher, FsUploader};
pub use sim::{
    run_canvas, run_load, run_transform, run_upload, LoadOutcome, LoadPlan, LoadReport, UploadReport,
};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive`. Calling this twice is harmless.
pub fn init_tracing(json: bool, default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
