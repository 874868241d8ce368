//! In-memory [`CacheStore`] implementation.
//!
//! Entries live in a `HashMap` behind a `tokio::sync::RwLock`. Every
//! check-then-write happens under a single write guard, so concurrent writers
//! to one key resolve to first-writer-wins. Nothing survives the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheKey, CacheStore, CachedAnswer};
use crate::error::{Result, StoreError};

/// Process-local cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn reserve(&self, key: &CacheKey) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.clone(), CacheEntry::Reserved);
        Ok(true)
    }

    async fn insert_answer(&self, key: &CacheKey, answer: &CachedAnswer) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(CacheEntry::Answered(_)) = entries.get(key) {
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            });
        }
        entries.insert(key.clone(), CacheEntry::Answered(answer.clone()));
        Ok(())
    }

    async fn adjust_score(&self, key: &CacheKey, doc_id: &str, delta: i64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some(CacheEntry::Answered(CachedAnswer::Documents(documents))) = entries.get_mut(key)
        else {
            return Ok(false);
        };
        match documents.iter_mut().find(|d| d.id == doc_id) {
            Some(document) => {
                document.score += delta;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }
}
