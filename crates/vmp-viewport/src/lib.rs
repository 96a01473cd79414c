//! VMP Viewport Scheduler
//!
//! Decides when registered asset placeholders may start loading so that
//! off-screen, low-priority assets never starve the visible ones.
//!
//! # Admission rules
//!
//! - `Priority::Immediate` is admitted inside `register`, same tick
//! - Everything else is admitted once its bounds intersect the viewport
//!   grown by `lookahead_screens` on every edge
//! - `Priority::Hover` may also be admitted early through `notify_hover`
//! - Each registration is admitted at most once and then leaves the table
//!
//! # Example
//!
//! ```rust,ignore
//! use vmp_core::{AssetId, Priority, Rect, ViewportConfig};
//! use vmp_viewport::{FixedBounds, ViewportScheduler};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let scheduler = ViewportScheduler::new(ViewportConfig::default());
//! let (registration, admission) =
//!     scheduler.register(AssetId::new(), Arc::new(FixedBounds(Rect::new(0.0, 900.0, 300.0, 200.0))), Priority::Viewport);
//!
//! scheduler.set_viewport(Rect::new(0.0, 0.0, 1280.0, 800.0));
//! assert!(admission.admitted().await.is_some());
//! # drop(registration);
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod scheduler;

pub use scheduler::{
    Admission, AdmissionReason, BoundsProvider, FixedBounds, Registration, SchedulerStats, ViewportScheduler,
};
