//! In-memory [`ChunkIndex`] implementation.
//!
//! Similarity is the number of distinct query terms that also occur in the
//! chunk, where terms are lowercased alphanumeric runs. Every chunk is a
//! candidate, including chunks that share no term with the query, so a
//! search with `k = count()` returns the whole collection. Ties keep
//! insertion order.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ChunkIndex;
use crate::chunk::Chunk;

/// In-memory chunk index for tests, demos and small corpora.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from chunks. Later chunks replace earlier ones with the same id.
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let mut stored: Vec<Chunk> = Vec::new();
        for chunk in chunks {
            match stored.iter_mut().find(|c| c.id == chunk.id) {
                Some(existing) => *existing = chunk,
                None => stored.push(chunk),
            }
        }
        Self {
            chunks: RwLock::new(stored),
        }
    }

    /// Insert a chunk, replacing any chunk with the same id in place.
    pub async fn insert(&self, chunk: Chunk) {
        let mut chunks = self.chunks.write().await;
        match chunks.iter_mut().find(|c| c.id == chunk.id) {
            Some(existing) => *existing = chunk,
            None => chunks.push(chunk),
        }
    }

    /// Remove a chunk by id. Returns whether a chunk was removed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| c.id != id);
        chunks.len() != before
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ChunkIndex for MemoryIndex {
    async fn count(&self) -> Result<usize> {
        Ok(self.len().await)
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let query_terms = terms(query);
        let chunks = self.chunks.read().await;

        let mut scored: Vec<(usize, &Chunk)> = chunks
            .iter()
            .map(|chunk| {
                let chunk_terms = terms(&chunk.content);
                let overlap = query_terms.intersection(&chunk_terms).count();
                (overlap, chunk)
            })
            .collect();

        // Stable sort keeps insertion order among equal overlaps
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Chunk>> {
        let chunks = self.chunks.read().await;
        Ok(chunks.iter().find(|c| c.id == id).cloned())
    }
}
