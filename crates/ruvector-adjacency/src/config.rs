//! Tunables for caches and chunked stores.

use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::LruCache;
use crate::chunked::{ChunkedArrayOptions, DEFAULT_CHUNK_SHAPE, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{AdjacencyError, Result};

/// Configuration shared by callers that memoize intermediate matrices and
/// stream results into chunked arrays.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```
/// use ruvector_adjacency::config::AdjacencyConfig;
///
/// let cfg = AdjacencyConfig::from_json_str(r#"{ "cache_maxsize": 16 }"#).unwrap();
/// assert_eq!(cfg.cache_maxsize, 16);
/// assert_eq!(cfg.compression_level, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjacencyConfig {
    /// Capacity of caches built with [`new_cache`](Self::new_cache).
    pub cache_maxsize: usize,
    /// Chunk shape for 2-D chunked arrays.
    pub chunk_shape: [usize; 2],
    /// zstd level for chunk payloads (1..=22).
    pub compression_level: i32,
    /// Write chunks straight to disk instead of buffering them.
    pub persist_to_disk: bool,
}

impl Default for AdjacencyConfig {
    fn default() -> Self {
        Self {
            cache_maxsize: 128,
            chunk_shape: [DEFAULT_CHUNK_SHAPE.0, DEFAULT_CHUNK_SHAPE.1],
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            persist_to_disk: false,
        }
    }
}

impl AdjacencyConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> Result<()> {
        if self.cache_maxsize == 0 {
            return Err(AdjacencyError::parameter("cache_maxsize", 0, ">= 1"));
        }
        if self.chunk_shape.contains(&0) {
            return Err(AdjacencyError::parameter(
                "chunk_shape",
                format!("{:?}", self.chunk_shape),
                "positive dimensions",
            ));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(AdjacencyError::parameter(
                "compression_level",
                self.compression_level,
                "1..=22",
            ));
        }
        Ok(())
    }

    /// Storage options for
    /// [`create_chunked_array_with`](crate::chunked::create_chunked_array_with).
    pub fn chunked_options(&self) -> ChunkedArrayOptions {
        ChunkedArrayOptions {
            compression_level: self.compression_level,
            persist_to_disk: self.persist_to_disk,
        }
    }

    /// An empty cache holding at most `cache_maxsize` entries.
    pub fn new_cache<K, V>(&self) -> Result<LruCache<K, V>>
    where
        K: Hash + Eq + Clone + Debug,
    {
        LruCache::new(self.cache_maxsize)
    }
}
