//! Chunk index abstraction
//!
//! The index is built ahead of time by an external process; the resolution
//! pipeline only reads from it. [`ChunkIndex`] is the contract the pipeline
//! needs: a size, a ranked similarity search, and lookup by id (used when a
//! cached answer is replayed).
//!
//! ## Implementations
//!
//! - **MemoryIndex**: lexical term-overlap ranking over chunks held in memory,
//!   for tests, demos and small corpora

use anyhow::Result;
use async_trait::async_trait;

use crate::chunk::Chunk;

pub mod memory;

/// Read-only access to an indexed chunk collection.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Number of chunks in the collection
    async fn count(&self) -> Result<usize>;

    /// Return up to `k` chunks ordered by descending similarity to `query`.
    ///
    /// Position 0 is the most similar chunk.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>>;

    /// Get a chunk by id
    async fn get(&self, id: &str) -> Result<Option<Chunk>>;
}
