//! Pipeline configuration
//!
//! All knobs of the four components, loadable from TOML. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names:
//!
//! ```toml
//! [loader]
//! max_retries = 5
//!
//! [upload]
//! concurrency = 3
//! duplicate_names = "skip"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Viewport scheduler settings
    pub viewport: ViewportConfig,
    /// Transform worker pool settings
    pub transform: TransformConfig,
    /// Load controller settings
    pub loader: LoadConfig,
    /// Upload coordinator settings
    pub upload: UploadConfig,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on
    /// out-of-range values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`PipelineConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded pipeline configuration");
        Ok(config)
    }

    /// Serialize back to TOML
    #[must_use]
    pub fn to_toml_string(&self) -> String {
        // Plain structs of numbers, strings and sequences always serialize.
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject values the components cannot work with
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.viewport.lookahead_screens.is_finite() || self.viewport.lookahead_screens < 0.0 {
            return Err(invalid(
                "viewport.lookahead_screens",
                "must be a finite, non-negative number",
            ));
        }
        if self.transform.queue_depth == 0 {
            return Err(invalid("transform.queue_depth", "must be at least 1"));
        }
        if !(1..=100).contains(&self.transform.default_quality) {
            return Err(invalid("transform.default_quality", "must be within 1..=100"));
        }
        if self.loader.backoff_base_ms > self.loader.backoff_max_ms {
            return Err(invalid(
                "loader.backoff_base_ms",
                "must not exceed loader.backoff_max_ms",
            ));
        }
        if self.upload.concurrency == 0 {
            return Err(invalid("upload.concurrency", "must be at least 1"));
        }
        Ok(())
    }

    /// With a transform worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.transform.workers = workers;
        self
    }

    /// With upload concurrency
    #[inline]
    #[must_use]
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload.concurrency = concurrency;
        self
    }

    /// With automatic retry budget for fetches
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.loader.max_retries = retries;
        self
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Viewport scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// How far (in viewport sizes) beyond each edge placeholders are admitted
    pub lookahead_screens: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            lookahead_screens: 1.0,
        }
    }
}

/// Transform worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Fixed worker count; 0 disables background transforms
    pub workers: usize,
    /// Requests that may wait for a worker before callers are held back
    pub queue_depth: usize,
    /// JPEG quality used when a request has no quality hint
    pub default_quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_depth: 64,
            default_quality: 82,
        }
    }
}

/// Load controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Automatic retries after the first failed fetch
    pub max_retries: u32,
    /// Delay before the first retry
    pub backoff_base_ms: u64,
    /// Upper bound of any single retry delay
    pub backoff_max_ms: u64,
    /// Entries kept in the resolved-asset LRU cache
    pub cache_capacity: u64,
}

impl LoadConfig {
    /// Delay before retry number `retry` (1-based), doubling each time
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
            cache_capacity: 256,
        }
    }
}

/// What to do when a selected file name is already pending in the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep both; deduplication is the caller's concern
    #[default]
    Allow,
    /// Silently drop the new selection
    Skip,
    /// Reject the new selection with a validation error
    Reject,
}

/// Upload coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Items uploaded at the same time; 1 keeps enqueue order
    pub concurrency: usize,
    /// Largest accepted file
    pub max_file_bytes: u64,
    /// Accepted lowercase extensions; empty accepts everything
    pub allowed_extensions: Vec<String>,
    /// Handling of repeated file names among pending items
    pub duplicate_names: DuplicatePolicy,
    /// Clear the batch error notice after this long; `None` keeps it
    pub dismiss_errors_after_ms: Option<u64>,
}

impl UploadConfig {
    /// Auto-dismiss delay for batch error notices
    #[inline]
    #[must_use]
    pub fn dismiss_errors_after(&self) -> Option<Duration> {
        self.dismiss_errors_after_ms.map(Duration::from_millis)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_file_bytes: 100 * 1024 * 1024,
            allowed_extensions: [
                "jpg", "jpeg", "png", "webp", "gif", "tif", "tiff", "heic", "avif", "mp4", "mov",
                "pdf",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            duplicate_names: DuplicatePolicy::default(),
            dismiss_errors_after_ms: None,
        }
    }
}
