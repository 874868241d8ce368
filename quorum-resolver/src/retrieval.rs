//! Semantic retrieval over the chunk index.

use std::sync::Arc;

use quorum_store::ChunkIndex;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::scoring::ScoredChunk;

/// Score gap between two adjacent semantic ranks.
pub const BASELINE_STEP: i64 = 5;

/// Baseline score of the chunk at 0-based `rank` among `n` results.
///
/// The best match gets `5 * (n - 1)` and the last one gets 0.
pub fn baseline_score(n: usize, rank: usize) -> i64 {
    BASELINE_STEP * (n as i64 - rank as i64 - 1)
}

/// Retrieves the whole collection ranked by similarity to one query variant.
#[derive(Clone)]
pub struct SemanticRetriever {
    index: Arc<dyn ChunkIndex>,
}

impl std::fmt::Debug for SemanticRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRetriever").finish_non_exhaustive()
    }
}

impl SemanticRetriever {
    pub fn new(index: Arc<dyn ChunkIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<dyn ChunkIndex> {
        &self.index
    }

    /// Search with `k` equal to the collection size and seed baseline scores.
    ///
    /// An empty result means the index was never built. The same chunk at
    /// positions 0 and 1 means the index is corrupted. Both are errors.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let k = self
            .index
            .count()
            .await
            .map_err(|source| ResolveError::Index { source })?;
        let chunks = self
            .index
            .search(query, k)
            .await
            .map_err(|source| ResolveError::Index { source })?;

        if chunks.is_empty() {
            return Err(ResolveError::EmptyIndex {
                query: query.to_string(),
            });
        }
        if let [first, second, ..] = chunks.as_slice()
            && first.id == second.id
        {
            return Err(ResolveError::DuplicateChunk {
                id: first.id.clone(),
            });
        }

        let n = chunks.len();
        debug!("Retrieved {n} chunks for {query:?}");

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(rank, chunk)| ScoredChunk::new(chunk, baseline_score(n, rank)))
            .collect())
    }
}
