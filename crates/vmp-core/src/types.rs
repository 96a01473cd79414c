//! Core types for the pipeline
//!
//! Defines the fundamental data model:
//! - Identifiers (ULID based, sortable)
//! - Asset requests and their observable state
//! - Upload items and batch snapshots
//! - Viewport geometry used for admission decisions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Identifies one registered asset placeholder
    AssetId
);
ulid_id!(
    /// Identifies one file inside an upload batch
    ItemId
);
ulid_id!(
    /// Identifies an upload batch
    BatchId
);

/// Loading priority of an asset placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Load right away, no visibility signal needed
    Immediate,
    /// Load when the placeholder nears the viewport
    #[default]
    Viewport,
    /// Load near the viewport, or early when the user hovers its trigger
    Hover,
    /// No preference
    None,
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Create a rectangle from origin and size
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Grow every edge by a multiple of the rectangle's own size.
    ///
    /// `screens = 1.0` adds one full width on the left and right and one
    /// full height above and below.
    #[must_use]
    pub fn expand_by_screens(&self, screens: f64) -> Self {
        let dx = self.width * screens;
        let dy = self.height * screens;
        Self {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }

    /// Overlap test. Touching edges count as intersecting so that a
    /// zero-height placeholder sitting on the boundary is still admitted.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }
}

/// A single loadable resource, created when a UI element mounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRequest {
    /// Locator (URL) of the original asset
    pub source_locator: String,
    /// Admission priority
    pub priority: Priority,
    /// Resize target; requesting dimensions implies a transform
    pub target_dimensions: Option<Dimensions>,
    /// Re-encode quality (1..=100); implies a transform
    pub quality_hint: Option<u8>,
    /// Locator substituted when loading fails terminally
    pub fallback_locator: Option<String>,
    /// When set, a failed transform is an error instead of a fallback
    pub transform_required: bool,
}

impl AssetRequest {
    /// Create a request for a locator with default (viewport) priority
    #[inline]
    #[must_use]
    pub fn new(source_locator: impl Into<String>) -> Self {
        Self {
            source_locator: source_locator.into(),
            priority: Priority::default(),
            target_dimensions: None,
            quality_hint: None,
            fallback_locator: None,
            transform_required: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_target_dimensions(mut self, width: u32, height: u32) -> Self {
        self.target_dimensions = Some(Dimensions::new(width, height));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality_hint = Some(quality);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, locator: impl Into<String>) -> Self {
        self.fallback_locator = Some(locator.into());
        self
    }

    /// Fail instead of falling back to the untransformed asset
    #[inline]
    #[must_use]
    pub fn require_transform(mut self) -> Self {
        self.transform_required = true;
        self
    }

    /// Whether any transform was requested
    #[inline]
    #[must_use]
    pub fn wants_transform(&self) -> bool {
        self.target_dimensions.is_some() || self.quality_hint.is_some()
    }
}

/// Lifecycle phase of an asset request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Loading,
    Transforming,
    Ready,
    Error,
}

impl Phase {
    /// Whether no automatic transition leaves this phase
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ready | Phase::Error)
    }

    /// Check if a transition is allowed.
    ///
    /// `Error -> Loading` is the explicit retry path; every other edge moves
    /// forward along `Idle -> Loading -> Transforming -> Ready`.
    #[must_use]
    pub fn can_transition_to(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Idle, Phase::Loading)
                | (Phase::Loading, Phase::Transforming)
                | (Phase::Loading, Phase::Ready)
                | (Phase::Loading, Phase::Error)
                | (Phase::Transforming, Phase::Ready)
                | (Phase::Transforming, Phase::Error)
                | (Phase::Error, Phase::Loading)
        )
    }
}

/// Externally observed state of one asset request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetState {
    pub phase: Phase,
    pub resolved_locator: Option<String>,
    /// Wall-clock time since Loading began
    pub elapsed_ms: Option<u64>,
    pub error_message: Option<String>,
}

impl AssetState {
    #[inline]
    #[must_use]
    pub fn idle() -> Self {
        Self::with_phase(Phase::Idle)
    }

    #[inline]
    #[must_use]
    pub fn loading() -> Self {
        Self::with_phase(Phase::Loading)
    }

    #[inline]
    #[must_use]
    pub fn transforming() -> Self {
        Self::with_phase(Phase::Transforming)
    }

    /// Ready with the locator the UI should render
    #[must_use]
    pub fn ready(resolved_locator: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            phase: Phase::Ready,
            resolved_locator: Some(resolved_locator.into()),
            elapsed_ms: Some(elapsed_ms),
            error_message: None,
        }
    }

    /// Terminal failure with a human-readable message
    #[must_use]
    pub fn error(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            phase: Phase::Error,
            resolved_locator: None,
            elapsed_ms: Some(elapsed_ms),
            error_message: Some(message.into()),
        }
    }

    fn with_phase(phase: Phase) -> Self {
        Self {
            phase,
            resolved_locator: None,
            elapsed_ms: None,
            error_message: None,
        }
    }
}

impl Default for AssetState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Where the bytes of a selected file live
#[derive(Debug, Clone)]
pub enum FileSource {
    /// File on local disk
    Path(PathBuf),
    /// Bytes already in memory (drag and drop, tests)
    Memory(Arc<[u8]>),
}

/// A file selected or dropped by the user
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub source: FileSource,
}

impl FileHandle {
    /// In-memory file; size is taken from the buffer
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            content_type: None,
            source: FileSource::Memory(bytes),
        }
    }

    /// On-disk file with a known size
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            size_bytes,
            content_type: None,
            source: FileSource::Path(path),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Lowercased extension of the file name, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// Upload status of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadStatus {
    Pending,
    Uploading,
    Complete,
    Error,
}

impl UploadStatus {
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Complete | UploadStatus::Error)
    }
}

/// One file enqueued for upload (read-only projection for the UI)
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: ItemId,
    pub file: FileHandle,
    pub display_name: String,
    pub size_bytes: u64,
    pub status: UploadStatus,
    /// 0..=100
    pub percent: f32,
    pub error: Option<String>,
}

impl UploadItem {
    /// New pending item for a file
    #[must_use]
    pub fn pending(file: FileHandle) -> Self {
        Self {
            id: ItemId::new(),
            display_name: file.name.clone(),
            size_bytes: file.size_bytes,
            file,
            status: UploadStatus::Pending,
            percent: 0.0,
            error: None,
        }
    }

    /// Contribution of this item to the aggregate percent.
    ///
    /// Complete counts as 100, everything else (Error included) as its last
    /// known percent.
    #[inline]
    #[must_use]
    pub fn effective_percent(&self) -> f32 {
        match self.status {
            UploadStatus::Complete => 100.0,
            _ => self.percent,
        }
    }
}

/// Immutable view of a batch, published on every change
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub batch_id: BatchId,
    pub items: Vec<UploadItem>,
    pub aggregate_percent: f32,
    pub batch_complete: bool,
    /// Batch-level notice shown after a round with failures
    pub error_notice: Option<String>,
}

impl BatchSnapshot {
    /// Build a snapshot, deriving aggregate percent and completion
    #[must_use]
    pub fn from_items(batch_id: BatchId, items: Vec<UploadItem>, error_notice: Option<String>) -> Self {
        let aggregate_percent = aggregate_percent(&items);
        let batch_complete = !items.is_empty() && items.iter().all(|i| i.status.is_terminal());
        Self {
            batch_id,
            items,
            aggregate_percent,
            batch_complete,
            error_notice,
        }
    }

    /// Count items in a given status
    #[must_use]
    pub fn count(&self, status: UploadStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

/// Arithmetic mean of item contributions; 0 for an empty batch
#[must_use]
pub fn aggregate_percent(items: &[UploadItem]) -> f32 {
    if items.is_empty() {
        return 0.0;
    }
    let total: f32 = items.iter().map(UploadItem::effective_percent).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total / items.len() as f32;
    mean
}
