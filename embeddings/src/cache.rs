//! Embedding cache keyed by content hash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;

/// Cache entry for an embedding.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Shared so that readers clone a pointer, never a partially written vector.
    embedding: Arc<[f32]>,

    /// Insertion sequence number, used for eviction.
    inserted: u64,
}

/// Process-local memo of text to embedding.
///
/// Construct one per process (or per test) and share it through an `Arc`.
/// Every `get`/`set` runs under the map lock, so a reader observes either no
/// entry or a complete vector for a key.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,

    /// `None` means the cache never evicts.
    max_entries: Option<usize>,

    sequence: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Create an unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: None,
            sequence: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache holding at most `max_entries`, evicting the oldest
    /// insertion when full.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries.max(1)),
            ..Self::new()
        }
    }

    /// Compute the cache key for a text: hex SHA-256 over its UTF-8 bytes.
    pub fn key_for(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str) -> Option<Embedding> {
        let key = Self::key_for(text);
        let entries = self.entries.read().await;
        match entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.embedding.to_vec())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Put an embedding in the cache, replacing any previous value.
    pub async fn set(&self, text: &str, embedding: &[f32]) {
        let key = Self::key_for(text);
        let entry = CacheEntry {
            embedding: Arc::from(embedding),
            inserted: self.sequence.fetch_add(1, Ordering::Relaxed),
        };

        let mut entries = self.entries.write().await;

        if let Some(max) = self.max_entries
            && entries.len() >= max
            && !entries.contains_key(&key)
            && let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, v)| v.inserted)
                .map(|(k, _)| k.clone())
        {
            entries.remove(&oldest_key);
        }

        entries.insert(key, entry);
        debug!(dimension = embedding.len(), "cached embedding");
    }

    /// Check if an embedding is cached. Does not count as a hit or miss.
    pub async fn contains(&self, text: &str) -> bool {
        let key = Self::key_for(text);
        self.entries.read().await.contains_key(&key)
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds nothing.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Clear the entire cache. Administrative and test use only.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size, if bounded.
    pub max_entries: Option<usize>,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that found nothing.
    pub misses: u64,
}
