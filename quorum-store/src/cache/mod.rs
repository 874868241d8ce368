//! Response cache: query → answer mappings that survive across resolution calls.
//!
//! The cache is split in two layers, the same way the chunk storage traits sit
//! under their adapters:
//!
//! - **[`CacheStore`]**: a raw key-value backend. It reports an attempt to
//!   answer an already-answered key as [`StoreError::DuplicateKey`].
//! - **[`ResponseCache`]**: the protocol the resolver talks to. It normalizes
//!   keys, and turns duplicate-key writes into [`WriteOutcome::AlreadyCached`]
//!   so that writing the same answer under several synonym keys never fails.
//!   Any other store error propagates.
//!
//! ## Entry lifecycle
//!
//! ```text
//! (absent) ──reserve──▶ Reserved ──write──▶ Answered
//!     └──────────────────write─────────────────▲
//! ```
//!
//! A key is reserved before the expensive path runs so the later write has
//! somewhere to land. A reservation is not an answer: it stays behind when the
//! resolution that made it fails, and readers treat it like an absent key.
//! "Nothing cleared the score floor" is an answer of its own,
//! [`CachedAnswer::Empty`]. Once answered, a key is never overwritten: the
//! first writer wins and later writers are no-ops. Only the stored document
//! scores change afterwards, through [`ResponseCache::adjust_score`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::chunk::ChunkId;
use crate::error::{Result, StoreError};

pub mod memory;
pub mod sqlite;

/// A normalized cache key.
///
/// Normalization trims the query, collapses whitespace runs to one space and
/// lowercases it. Lookups are exact matches on the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn normalize(query: &str) -> Self {
        let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
        Self(collapsed.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document reference stored in a cached answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    pub id: ChunkId,
    pub score: i64,
}

impl CachedDocument {
    pub fn new(id: impl Into<String>, score: i64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A stored answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedAnswer {
    /// Generated natural-language answer
    Conversational(String),
    /// Ranked document references, in the order they were written
    Documents(Vec<CachedDocument>),
    /// The query was resolved and no document cleared the score floor
    Empty,
}

impl CachedAnswer {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversational(_) => "conversational",
            Self::Documents(_) => "documents",
            Self::Empty => "empty",
        }
    }
}

/// What the cache holds for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// The key was reserved but no answer was written: a resolution is still
    /// in flight, or it failed before writing.
    Reserved,
    Answered(CachedAnswer),
}

impl CacheEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Answered(answer) => answer.kind(),
        }
    }

    /// The stored answer, or `None` for a bare reservation.
    pub fn answer(self) -> Option<CachedAnswer> {
        match self {
            Self::Reserved => None,
            Self::Answered(answer) => Some(answer),
        }
    }
}

/// Result of an idempotent cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The answer was stored
    Inserted,
    /// The key already held an answer; nothing changed
    AlreadyCached,
}

/// Raw cache backend.
///
/// Implementations must make [`insert_answer`](CacheStore::insert_answer)
/// atomic per key: of two concurrent writers to the same key, exactly one
/// succeeds and the other gets [`StoreError::DuplicateKey`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the entry stored under a key
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert a reserved slot unless the key exists. Returns whether a slot was created.
    async fn reserve(&self, key: &CacheKey) -> Result<bool>;

    /// Store an answer under a reserved or absent key.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the key already holds an answer.
    async fn insert_answer(&self, key: &CacheKey, answer: &CachedAnswer) -> Result<()>;

    /// Add `delta` to the stored score of one document of a documents answer.
    ///
    /// Returns `false` if the key holds no documents answer containing `doc_id`.
    async fn adjust_score(&self, key: &CacheKey, doc_id: &str, delta: i64) -> Result<bool>;

    /// Remove every entry. Returns the number of keys removed.
    async fn clear(&self) -> Result<u64>;

    /// Number of keys, reserved ones included
    async fn len(&self) -> Result<usize>;
}

/// Idempotent cache protocol used by the resolver.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache").finish_non_exhaustive()
    }
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cache backed by a fresh [`MemoryCacheStore`](memory::MemoryCacheStore).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(memory::MemoryCacheStore::new()))
    }

    /// Exact-match lookup on the normalized query.
    pub async fn lookup(&self, query: &str) -> Result<Option<CacheEntry>> {
        self.store.get(&CacheKey::normalize(query)).await
    }

    /// Mark a query as in flight. Reserving an existing key is a silent no-op.
    pub async fn reserve(&self, query: &str) -> Result<()> {
        let key = CacheKey::normalize(query);
        if self.store.reserve(&key).await? {
            debug!("Reserved cache slot for {key:?}");
        }
        Ok(())
    }

    /// Store a documents answer unless the key is already answered.
    pub async fn write_documents(
        &self,
        query: &str,
        documents: &[CachedDocument],
    ) -> Result<WriteOutcome> {
        self.write(query, CachedAnswer::Documents(documents.to_vec()))
            .await
    }

    /// Store a conversational answer unless the key is already answered.
    pub async fn write_conversational(&self, query: &str, text: &str) -> Result<WriteOutcome> {
        self.write(query, CachedAnswer::Conversational(text.to_string()))
            .await
    }

    /// Record that the query was resolved without any document above the floor.
    pub async fn write_empty(&self, query: &str) -> Result<WriteOutcome> {
        self.write(query, CachedAnswer::Empty).await
    }

    /// Feedback hook: shift one stored document score for this exact key.
    pub async fn adjust_score(&self, query: &str, doc_id: &str, delta: i64) -> Result<bool> {
        let key = CacheKey::normalize(query);
        let adjusted = self.store.adjust_score(&key, doc_id, delta).await?;
        if adjusted {
            debug!("Adjusted score of {doc_id} under {key:?} by {delta}");
        }
        Ok(adjusted)
    }

    /// Drop every cached entry.
    pub async fn clear(&self) -> Result<u64> {
        self.store.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    async fn write(&self, query: &str, answer: CachedAnswer) -> Result<WriteOutcome> {
        let key = CacheKey::normalize(query);
        match self.store.insert_answer(&key, &answer).await {
            Ok(()) => {
                debug!("Cached {} answer under {key:?}", answer.kind());
                Ok(WriteOutcome::Inserted)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                debug!("Cache key {key:?} already answered, keeping the first answer");
                Ok(WriteOutcome::AlreadyCached)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_key_normalization() {
        assert_eq!(
            CacheKey::normalize("  Capital   of\tFrance ").as_str(),
            "capital of france"
        );
        assert_eq!(
            CacheKey::normalize("capital of france"),
            CacheKey::normalize("CAPITAL OF FRANCE")
        );
        assert_ne!(
            CacheKey::normalize("capital of France"),
            CacheKey::normalize("France's capital")
        );
    }

    #[tokio::test]
    async fn test_lookup_uses_normalized_key() -> Result<()> {
        let cache = ResponseCache::in_memory();
        cache
            .write_conversational("Capital of France", "Paris.")
            .await?;

        let entry = cache.lookup("  capital OF france").await?;
        assert_eq!(
            entry,
            Some(CacheEntry::Answered(CachedAnswer::Conversational(
                "Paris.".to_string()
            )))
        );
        assert_eq!(cache.lookup("France's capital").await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_then_write() -> Result<()> {
        let cache = ResponseCache::in_memory();

        cache.reserve("capital of France").await?;
        cache.reserve("capital of France").await?;
        assert_eq!(
            cache.lookup("capital of France").await?,
            Some(CacheEntry::Reserved)
        );
        assert_eq!(cache.len().await?, 1);

        let docs = vec![CachedDocument::new("paris", 320)];
        let outcome = cache.write_documents("capital of France", &docs).await?;
        assert_eq!(outcome, WriteOutcome::Inserted);
        assert_eq!(
            cache.lookup("capital of France").await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(docs)))
        );

        // Reserving an answered key leaves the answer alone
        cache.reserve("capital of France").await?;
        assert_eq!(
            cache.lookup("capital of France").await?.map(|e| e.kind()),
            Some("documents")
        );

        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_duplicate_write_is_swallowed() -> Result<()> {
        let cache = ResponseCache::in_memory();

        let first = vec![CachedDocument::new("paris", 320)];
        let second = vec![CachedDocument::new("berlin", 999)];

        assert_eq!(
            cache.write_documents("capital of France", &first).await?,
            WriteOutcome::Inserted
        );
        assert_eq!(
            cache.write_documents("capital of France", &second).await?,
            WriteOutcome::AlreadyCached
        );
        assert_eq!(
            cache
                .write_conversational("capital of France", "Paris.")
                .await?,
            WriteOutcome::AlreadyCached
        );

        assert_eq!(
            cache.lookup("capital of France").await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(first)))
        );
        assert!(logs_contain("already answered"));

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_score_only_touches_exact_key() -> Result<()> {
        let cache = ResponseCache::in_memory();
        let docs = vec![
            CachedDocument::new("paris", 320),
            CachedDocument::new("lyon", 300),
        ];
        cache.write_documents("capital of France", &docs).await?;
        cache.write_documents("France's capital", &docs).await?;

        assert!(cache.adjust_score("capital of France", "lyon", 50).await?);
        assert!(!cache.adjust_score("capital of France", "berlin", 50).await?);
        assert!(!cache.adjust_score("unknown query", "lyon", 50).await?);

        assert_eq!(
            cache.lookup("capital of France").await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(vec![
                CachedDocument::new("paris", 320),
                CachedDocument::new("lyon", 350),
            ])))
        );
        assert_eq!(
            cache.lookup("France's capital").await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(docs)))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_answer_is_distinct_from_reservation() -> Result<()> {
        let cache = ResponseCache::in_memory();
        cache.reserve("capital of Atlantis").await?;

        let reserved = cache.lookup("capital of Atlantis").await?;
        assert_eq!(reserved, Some(CacheEntry::Reserved));
        assert_eq!(reserved.and_then(CacheEntry::answer), None);

        assert_eq!(
            cache.write_empty("capital of Atlantis").await?,
            WriteOutcome::Inserted
        );
        let answered = cache.lookup("capital of Atlantis").await?;
        assert_eq!(answered.clone().map(|e| e.kind()), Some("empty"));
        assert_eq!(answered.and_then(CacheEntry::answer), Some(CachedAnswer::Empty));

        // An empty answer is final like any other
        let docs = vec![CachedDocument::new("paris", 320)];
        assert_eq!(
            cache.write_documents("capital of Atlantis", &docs).await?,
            WriteOutcome::AlreadyCached
        );
        assert!(!cache.adjust_score("capital of Atlantis", "paris", 10).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_clear() -> Result<()> {
        let cache = ResponseCache::in_memory();
        cache.reserve("one").await?;
        cache.write_conversational("two", "answer").await?;

        assert_eq!(cache.clear().await?, 2);
        assert!(cache.is_empty().await?);
        assert_eq!(cache.lookup("two").await?, None);

        Ok(())
    }
}
