//! quorum-store: chunk index and response cache backends for quorum
//!
//! This crate holds the storage side of the query resolution pipeline: the
//! read-only chunk index the retriever searches, and the response cache that
//! lets repeated or paraphrased queries skip re-computation.
//!
//! ## Key Modules
//!
//! - **[`chunk`]**: The indexed document chunk type
//! - **[`index`]**: The [`ChunkIndex`] collaborator trait and an in-memory index
//! - **[`cache`]**: Cache entries, the [`CacheStore`] backend trait (SQLite and
//!   in-memory), and the idempotent [`ResponseCache`] protocol on top of it
//! - **[`error`]**: Store error type
//!
//! ## Architecture
//!
//! ```text
//! ChunkIndex ── MemoryIndex
//!
//! ResponseCache ── CacheStore ─┬─ SqliteCacheStore (durable)
//!                              └─ MemoryCacheStore
//! ```

pub mod cache;
pub mod chunk;
pub mod error;
pub mod index;

pub use cache::{
    CacheEntry, CacheKey, CacheStore, CachedAnswer, CachedDocument, ResponseCache, WriteOutcome,
    memory::MemoryCacheStore, sqlite::SqliteCacheStore,
};
pub use chunk::{Chunk, ChunkId};
pub use error::{Result, StoreError};
pub use index::{ChunkIndex, memory::MemoryIndex};
