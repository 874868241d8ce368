//! SQLite implementation of the response cache.
//!
//! This is the durable backend: answers written here survive process
//! restarts, so a paraphrase answered yesterday is still a cache hit today.
//!
//! ## Database Schema
//!
//! ```sql
//! -- One row per normalized query key
//! CREATE TABLE cached_queries (
//!     query TEXT PRIMARY KEY,          -- normalized query text
//!     kind TEXT NOT NULL,              -- 'reserved' | 'conversational' | 'documents' | 'empty'
//!     answer_text TEXT,                -- generated answer for 'conversational'
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
//!     answered_at TIMESTAMP
//! );
//!
//! -- Ranked document references of a 'documents' answer
//! CREATE TABLE cached_documents (
//!     query TEXT REFERENCES cached_queries(query) ON DELETE CASCADE,
//!     doc_id TEXT,
//!     score INTEGER,                   -- mutable through adjust_score
//!     position INTEGER,                -- order the answer was written in
//!     PRIMARY KEY (query, doc_id)
//! );
//! ```
//!
//! ## Idempotent writes
//!
//! Answers are written with an upsert whose update arm only fires while the
//! row is still `reserved`. An answered row therefore reports zero affected
//! rows, which is surfaced as [`StoreError::DuplicateKey`]. SQLite serializes
//! writers, so two racing writers to one key see exactly one success.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{CacheEntry, CacheKey, CacheStore, CachedAnswer, CachedDocument};
use crate::error::{Result, StoreError};

const KIND_RESERVED: &str = "reserved";
const KIND_CONVERSATIONAL: &str = "conversational";
const KIND_DOCUMENTS: &str = "documents";
const KIND_EMPTY: &str = "empty";

/// SQLite-backed cache store.
#[derive(Clone, Debug)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) a persistent cache database at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;

        info!("Opened response cache at {}", db_path.display());
        Self::new_with_pool(pool).await
    }

    /// Open a cache that lives only as long as this store, for tests.
    ///
    /// The pool holds a single connection: every `sqlite::memory:` connection
    /// is its own database.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::new()
                    .in_memory(true)
                    .foreign_keys(true),
            )
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cached_queries (
                query TEXT PRIMARY KEY,
                kind TEXT NOT NULL CHECK (kind IN ('reserved', 'conversational', 'documents', 'empty')),
                answer_text TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                answered_at TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cached_documents (
                query TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                score INTEGER NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (query, doc_id),
                FOREIGN KEY (query) REFERENCES cached_queries(query) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn documents_for(&self, key: &CacheKey) -> Result<Vec<CachedDocument>> {
        let rows = sqlx::query(
            "SELECT doc_id, score FROM cached_documents WHERE query = ?1 ORDER BY position",
        )
        .bind(key.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CachedDocument {
                id: row.get("doc_id"),
                score: row.get("score"),
            })
            .collect())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let row = sqlx::query("SELECT kind, answer_text FROM cached_queries WHERE query = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let kind: String = row.get("kind");
        let answer_text: Option<String> = row.get("answer_text");

        let entry = match kind.as_str() {
            KIND_RESERVED => CacheEntry::Reserved,
            KIND_CONVERSATIONAL => {
                let text = answer_text
                    .ok_or_else(|| StoreError::corrupt(key.as_str(), "missing answer text"))?;
                CacheEntry::Answered(CachedAnswer::Conversational(text))
            }
            KIND_DOCUMENTS => {
                CacheEntry::Answered(CachedAnswer::Documents(self.documents_for(key).await?))
            }
            KIND_EMPTY => CacheEntry::Answered(CachedAnswer::Empty),
            other => {
                return Err(StoreError::corrupt(
                    key.as_str(),
                    format!("unknown entry kind {other:?}"),
                ));
            }
        };
        Ok(Some(entry))
    }

    async fn reserve(&self, key: &CacheKey) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO cached_queries (query, kind) VALUES (?1, ?2) ON CONFLICT(query) DO NOTHING",
        )
        .bind(key.as_str())
        .bind(KIND_RESERVED)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_answer(&self, key: &CacheKey, answer: &CachedAnswer) -> Result<()> {
        let answer_text = match answer {
            CachedAnswer::Conversational(text) => Some(text.as_str()),
            CachedAnswer::Documents(_) | CachedAnswer::Empty => None,
        };

        let mut tx = self.pool.begin().await?;

        // Write first so the transaction takes the write lock before reading anything
        let result = sqlx::query(
            r#"
            INSERT INTO cached_queries (query, kind, answer_text, answered_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(query) DO UPDATE SET
                kind = excluded.kind,
                answer_text = excluded.answer_text,
                answered_at = excluded.answered_at
            WHERE cached_queries.kind = 'reserved'
            "#,
        )
        .bind(key.as_str())
        .bind(answer.kind())
        .bind(answer_text)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::DuplicateKey {
                key: key.to_string(),
            });
        }

        if let CachedAnswer::Documents(documents) = answer {
            for (position, document) in documents.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO cached_documents (query, doc_id, score, position)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(query, doc_id) DO NOTHING
                    "#,
                )
                .bind(key.as_str())
                .bind(&document.id)
                .bind(document.score)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn adjust_score(&self, key: &CacheKey, doc_id: &str, delta: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE cached_documents SET score = score + ?3 WHERE query = ?1 AND doc_id = ?2",
        )
        .bind(key.as_str())
        .bind(doc_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cached_documents")
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM cached_queries")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn len(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_queries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ResponseCache, WriteOutcome};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reserve_and_answer() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("capital of France");

        assert_eq!(store.get(&key).await?, None);
        assert!(store.reserve(&key).await?);
        assert!(!store.reserve(&key).await?);
        assert_eq!(store.get(&key).await?, Some(CacheEntry::Reserved));

        let docs = vec![
            CachedDocument::new("paris", 320),
            CachedDocument::new("berlin", 305),
            CachedDocument::new("lyon", 305),
        ];
        store
            .insert_answer(&key, &CachedAnswer::Documents(docs.clone()))
            .await?;
        assert_eq!(
            store.get(&key).await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(docs)))
        );
        assert_eq!(store.len().await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_answer_without_reservation() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("France's capital");

        store
            .insert_answer(&key, &CachedAnswer::Conversational("Paris.".into()))
            .await?;
        assert_eq!(
            store.get(&key).await?,
            Some(CacheEntry::Answered(CachedAnswer::Conversational(
                "Paris.".into()
            )))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_answer_round_trip() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("capital of Atlantis");

        store.reserve(&key).await?;
        store.insert_answer(&key, &CachedAnswer::Empty).await?;
        assert_eq!(
            store.get(&key).await?,
            Some(CacheEntry::Answered(CachedAnswer::Empty))
        );

        let err = store
            .insert_answer(&key, &CachedAnswer::Conversational("Atlantis.".into()))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());

        Ok(())
    }

    #[tokio::test]
    async fn test_answered_key_is_never_overwritten() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("capital of France");

        store
            .insert_answer(
                &key,
                &CachedAnswer::Documents(vec![CachedDocument::new("paris", 320)]),
            )
            .await?;

        let err = store
            .insert_answer(&key, &CachedAnswer::Conversational("Lyon.".into()))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());

        // Reserving does not downgrade the answer either
        assert!(!store.reserve(&key).await?);
        assert_eq!(
            store.get(&key).await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(vec![
                CachedDocument::new("paris", 320)
            ])))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_score() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("capital of France");
        store
            .insert_answer(
                &key,
                &CachedAnswer::Documents(vec![
                    CachedDocument::new("paris", 320),
                    CachedDocument::new("lyon", 300),
                ]),
            )
            .await?;

        assert!(store.adjust_score(&key, "lyon", 40).await?);
        assert!(store.adjust_score(&key, "paris", -20).await?);
        assert!(!store.adjust_score(&key, "berlin", 10).await?);

        assert_eq!(
            store.get(&key).await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(vec![
                CachedDocument::new("paris", 300),
                CachedDocument::new("lyon", 340),
            ])))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_clear_removes_documents() -> Result<()> {
        let store = SqliteCacheStore::open_memory().await?;
        let key = CacheKey::normalize("capital of France");
        store.reserve(&CacheKey::normalize("other")).await?;
        store
            .insert_answer(
                &key,
                &CachedAnswer::Documents(vec![CachedDocument::new("paris", 320)]),
            )
            .await?;

        assert_eq!(store.clear().await?, 2);
        assert_eq!(store.len().await?, 0);

        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_documents")
            .fetch_one(store.pool())
            .await?;
        assert_eq!(leftover, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_answers_survive_reopen() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("cache").join("responses.db");

        {
            let cache = ResponseCache::new(Arc::new(SqliteCacheStore::open(&db_path).await?));
            cache
                .write_conversational("capital of France", "Paris.")
                .await?;
            cache.reserve("unanswered question").await?;
        }

        let cache = ResponseCache::new(Arc::new(SqliteCacheStore::open(&db_path).await?));
        assert_eq!(
            cache.lookup("capital of france").await?,
            Some(CacheEntry::Answered(CachedAnswer::Conversational(
                "Paris.".into()
            )))
        );
        assert_eq!(
            cache.lookup("unanswered question").await?,
            Some(CacheEntry::Reserved)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_writes_leave_one_entry() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("responses.db");
        let cache = ResponseCache::new(Arc::new(SqliteCacheStore::open(&db_path).await?));
        cache.reserve("capital of France").await?;

        let docs = vec![
            CachedDocument::new("paris", 320),
            CachedDocument::new("lyon", 305),
        ];
        let mut handles = Vec::new();
        for _ in 0..2 {
            let cache = cache.clone();
            let docs = docs.clone();
            handles.push(tokio::spawn(async move {
                cache.write_documents("capital of France", &docs).await
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.expect("writer task panicked")?);
        }
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == WriteOutcome::Inserted)
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == WriteOutcome::AlreadyCached)
                .count(),
            1
        );

        assert_eq!(cache.len().await?, 1);
        assert_eq!(
            cache.lookup("capital of France").await?,
            Some(CacheEntry::Answered(CachedAnswer::Documents(docs)))
        );

        Ok(())
    }
}
