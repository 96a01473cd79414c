//! Error types for the pipeline
//!
//! Taxonomy:
//! - `NetworkError`: fetch/upload transport failures, retried locally
//! - `TransformError`: worker-side processing failures, never retried, fall back
//! - `ValidationError`: rejected at enqueue time, never enters the async pipeline
//! - `UploadError`: per-item or per-batch upload failures
//! - `ConfigError`: configuration loading and validation

use std::path::PathBuf;

/// Top-level pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport failure
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// Transform failure
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// Input rejected before dispatch
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Upload failure
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cancelled by the owner
    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Upload(UploadError::Network(e)) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Transport failures while fetching or uploading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Server answered with a failing status
    #[error("{locator} returned status {code}")]
    Status { locator: String, code: u16 },

    /// Connection-level failure
    #[error("transport failure for {locator}: {reason}")]
    Transport { locator: String, reason: String },

    /// The resource does not exist
    #[error("{locator} not found")]
    NotFound { locator: String },
}

impl NetworkError {
    /// Convenience constructor for transport failures
    #[inline]
    pub fn transport(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable.
    ///
    /// Missing resources and client errors other than 408/429 will not
    /// succeed on a second attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            Self::NotFound { .. } => false,
        }
    }
}

/// Failures while transforming asset bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// No background execution available
    #[error("transform workers unavailable")]
    Unavailable,

    /// Input bytes could not be decoded
    #[error("decode failed: {0}")]
    Decode(String),

    /// Output could not be encoded
    #[error("encode failed: {0}")]
    Encode(String),

    /// Options cannot be satisfied
    #[error("invalid transform options: {0}")]
    InvalidOptions(String),

    /// Worker went away before answering
    #[error("transform worker lost")]
    WorkerLost,
}

/// Synchronous rejection of a selected file
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Zero-byte file
    #[error("{name} is empty")]
    EmptyFile { name: String },

    /// File exceeds the configured size limit
    #[error("{name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    /// Extension not in the allow list
    #[error("{name} has unsupported type {extension:?}")]
    UnsupportedType {
        name: String,
        extension: Option<String>,
    },

    /// Same name already pending in the batch
    #[error("{name} is already queued")]
    DuplicateName { name: String },
}

impl ValidationError {
    /// Name of the rejected file
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::EmptyFile { name }
            | Self::TooLarge { name, .. }
            | Self::UnsupportedType { name, .. }
            | Self::DuplicateName { name } => name,
        }
    }
}

/// Upload failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Transport failure
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Server refused the file
    #[error("upload rejected: {reason}")]
    Rejected { reason: String },

    /// Local file could not be read
    #[error("cannot read {name}: {reason}")]
    Read { name: String, reason: String },

    /// Operation requires an idle batch
    #[error("batch has uploads in flight")]
    BatchInFlight,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_retryable() {
        assert!(NetworkError::transport("a", "reset").is_retryable());
        assert!(NetworkError::Status {
            locator: "a".into(),
            code: 503
        }
        .is_retryable());
        assert!(NetworkError::Status {
            locator: "a".into(),
            code: 429
        }
        .is_retryable());
        assert!(!NetworkError::Status {
            locator: "a".into(),
            code: 403
        }
        .is_retryable());
        assert!(!NetworkError::NotFound { locator: "a".into() }.is_retryable());
    }

    #[test]
    fn pipeline_error_classification() {
        let err = PipelineError::from(NetworkError::transport("a", "reset"));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("network error"));

        let err = PipelineError::from(TransformError::Decode("bad header".into()));
        assert!(!err.is_retryable());

        let err = PipelineError::from(ValidationError::EmptyFile { name: "x.jpg".into() });
        assert!(!err.is_retryable());

        let err = PipelineError::from(UploadError::from(NetworkError::transport("u", "eof")));
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_error_names_the_file() {
        let err = ValidationError::TooLarge {
            name: "big.mov".into(),
            size: 10,
            limit: 5,
        };
        assert_eq!(err.file_name(), "big.mov");
        assert!(err.to_string().contains("limit is 5"));
    }
}
