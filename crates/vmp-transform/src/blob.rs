//! In-process blob store for transformed image bytes
//!
//! Transformed results are addressed by a locator of the form
//! `blob:vmp/<id>`, usable anywhere a source locator is. Each blob lives
//! until released; releasing twice is a no-op.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Locator prefix for blobs owned by this store
pub const BLOB_SCHEME: &str = "blob:vmp/";

/// Identifier of a stored blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(Ulid);

impl BlobId {
    fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a `blob:vmp/<id>` locator
    #[must_use]
    pub fn from_locator(locator: &str) -> Option<Self> {
        locator
            .strip_prefix(BLOB_SCHEME)
            .and_then(|id| Ulid::from_string(id).ok())
            .map(Self)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a registered blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle {
    id: BlobId,
    locator: String,
}

impl BlobHandle {
    #[inline]
    #[must_use]
    pub fn id(&self) -> BlobId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// Shared map of live blobs. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    blobs: Arc<DashMap<BlobId, Arc<[u8]>>>,
}

impl BlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes and return their handle
    pub fn register(&self, bytes: Vec<u8>) -> BlobHandle {
        let id = BlobId::new();
        self.blobs.insert(id, Arc::from(bytes));
        BlobHandle {
            id,
            locator: format!("{BLOB_SCHEME}{id}"),
        }
    }

    /// Bytes behind a locator, if it names a live blob
    #[must_use]
    pub fn resolve(&self, locator: &str) -> Option<Arc<[u8]>> {
        let id = BlobId::from_locator(locator)?;
        self.blobs.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Release a blob. Returns `false` if it was already released.
    pub fn release(&self, handle: &BlobHandle) -> bool {
        let removed = self.blobs.remove(&handle.id).is_some();
        if removed {
            tracing::trace!(blob = %handle.id, "Released blob");
        }
        removed
    }

    /// Release by locator; unknown and foreign locators are ignored
    pub fn release_locator(&self, locator: &str) -> bool {
        BlobId::from_locator(locator).is_some_and(|id| self.blobs.remove(&id).is_some())
    }

    /// Number of blobs not yet released
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.blobs.len()
    }
}
