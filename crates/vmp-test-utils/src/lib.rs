//! Testing utilities for the VMP workspace
//!
//! Scripted capabilities, image fixtures and small builders shared by the
//! crate test suites.

#![allow(missing_docs)]

pub mod fetcher;
pub mod fixtures;
pub mod uploader;

pub use fetcher::ScriptedFetcher;
pub use uploader::ScriptedUploader;
