//! Frame cache for fast navigation.
//!
//! Caches already-scaled frames keyed by path plus file stamp, using an LRU
//! policy. A file rewritten in place gets a new stamp and so misses the cache.

use crate::file_utils::FileStamp;
use crate::image_loader::ScaledImage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Identity of one version of an image file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub path: PathBuf,
    pub stamp: FileStamp,
}

impl FrameKey {
    /// Builds the key for the file as it currently is on disk.
    pub fn current(path: PathBuf) -> Option<Self> {
        let stamp = FileStamp::read(&path)?;
        Some(Self { path, stamp })
    }
}

/// LRU cache for storing scaled frames.
pub struct ImageCache {
    cache: LruCache<FrameKey, ScaledImage>,
}

impl ImageCache {
    /// Creates a new frame cache with the specified capacity (at least one entry).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Retrieves a frame from the cache if it exists.
    pub fn get(&mut self, key: &FrameKey) -> Option<ScaledImage> {
        let result = self.cache.get(key).cloned();
        if result.is_some() {
            log::debug!("Cache HIT: {}", key.path.display());
        } else {
            log::debug!("Cache MISS: {}", key.path.display());
        }
        result
    }

    /// Stores a frame in the cache.
    pub fn put(&mut self, key: FrameKey, frame: ScaledImage) {
        log::debug!(
            "Cache PUT: {} ({}x{}, {} cached)",
            key.path.display(),
            frame.width,
            frame.height,
            self.len()
        );
        self.cache.put(key, frame);
    }

    /// Drops every cached frame, e.g. after the gallery directory was cleared.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}
