//! VMP Load Controller
//!
//! Turns an [`vmp_core::AssetRequest`] into a stream of
//! [`vmp_core::AssetState`] snapshots:
//! - Admission by the [`vmp_viewport::ViewportScheduler`]
//! - Fetch through the caller's [`vmp_core::AssetFetcher`], with retries
//! - Optional transform on a [`vmp_transform::TransformPool`]
//! - A moka LRU of resolved assets so repeated requests skip the network
//!
//! # Example
//!
//! ```rust,ignore
//! let controller = LoadController::from_config(fetcher, &PipelineConfig::default());
//! let handle = controller.observe(
//!     AssetRequest::new("https://cdn.example.com/car.jpg").with_target_dimensions(640, 480),
//!     Arc::new(FixedBounds(Rect::new(0.0, 0.0, 640.0, 480.0))),
//! );
//! controller.set_viewport(Rect::new(0.0, 0.0, 1280.0, 800.0));
//! let mut states = handle.subscribe();
//! while let Some(state) = states.next().await {
//!     if state.phase.is_terminal() { break; }
//! }
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod controller;
pub mod handle;

pub use cache::{AssetCache, CacheKey, Resolved};
pub use controller::LoadController;
pub use handle::AssetHandle;
