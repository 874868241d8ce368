//! Re-ranking passes over retrieved chunks.
//!
//! A [`RankerChain`] runs its [`Ranker`]s in configured order. Rankers may
//! rewrite [`ScoredChunk::score`] and reorder the list however they like; the
//! chain always finishes with a stable descending sort on the fused score, so
//! its output never increases in score from one position to the next.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::scoring::ScoredChunk;

/// One re-scoring pass.
#[async_trait]
pub trait Ranker: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite fused scores (and optionally the order) of `chunks` for `query`.
    async fn rank_action(&self, query: &str, chunks: &mut Vec<ScoredChunk>) -> anyhow::Result<()>;
}

/// Ordered list of rankers followed by the mandatory final sort.
#[derive(Clone, Default)]
pub struct RankerChain {
    rankers: Vec<Arc<dyn Ranker>>,
}

impl std::fmt::Debug for RankerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankerChain")
            .field(
                "rankers",
                &self.rankers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl RankerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.rankers.push(ranker);
        self
    }

    pub fn push(&mut self, ranker: Arc<dyn Ranker>) {
        self.rankers.push(ranker);
    }

    pub fn len(&self) -> usize {
        self.rankers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rankers.is_empty()
    }

    pub async fn rank(&self, query: &str, mut chunks: Vec<ScoredChunk>) -> Result<Vec<ScoredChunk>> {
        for ranker in &self.rankers {
            ranker
                .rank_action(query, &mut chunks)
                .await
                .map_err(|source| ResolveError::Ranking {
                    ranker: ranker.name().to_string(),
                    source,
                })?;
            debug!("Ranker '{}' done for {query:?}", ranker.name());
        }

        // stable: equal scores keep the order the last ranker left them in
        chunks.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(chunks)
    }
}

/// Adds `boost` to a chunk's score for every distinct query term it contains.
///
/// Terms are lowercased alphanumeric runs of at least three characters, which
/// keeps short function words like "of" from counting.
#[derive(Debug, Clone, Copy)]
pub struct KeywordBoostRanker {
    boost: i64,
}

impl KeywordBoostRanker {
    pub const MIN_TERM_LEN: usize = 3;

    pub fn new(boost: i64) -> Self {
        Self { boost }
    }

    pub fn boost(&self) -> i64 {
        self.boost
    }
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= KeywordBoostRanker::MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Ranker for KeywordBoostRanker {
    fn name(&self) -> &str {
        "keyword-boost"
    }

    async fn rank_action(&self, query: &str, chunks: &mut Vec<ScoredChunk>) -> anyhow::Result<()> {
        let query_terms = keywords(query);
        if query_terms.is_empty() {
            return Ok(());
        }
        for scored in chunks.iter_mut() {
            let content_terms = keywords(&scored.chunk.content);
            let hits = query_terms.intersection(&content_terms).count() as i64;
            scored.score += hits * self.boost;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_store::Chunk;

    fn scored(id: &str, content: &str, score: i64) -> ScoredChunk {
        ScoredChunk::new(Chunk::new(id, content), score)
    }

    /// Reverses the list and drops every score to the same value.
    struct Flatten;

    #[async_trait]
    impl Ranker for Flatten {
        fn name(&self) -> &str {
            "flatten"
        }

        async fn rank_action(&self, _query: &str, chunks: &mut Vec<ScoredChunk>) -> anyhow::Result<()> {
            chunks.reverse();
            for c in chunks.iter_mut() {
                c.score = 1;
            }
            Ok(())
        }
    }

    /// Scores by content length, leaving the list unsorted.
    struct ByLength;

    #[async_trait]
    impl Ranker for ByLength {
        fn name(&self) -> &str {
            "by-length"
        }

        async fn rank_action(&self, _query: &str, chunks: &mut Vec<ScoredChunk>) -> anyhow::Result<()> {
            for c in chunks.iter_mut() {
                c.score = c.chunk.content.len() as i64;
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Ranker for Failing {
        fn name(&self) -> &str {
            "cross-encoder"
        }

        async fn rank_action(&self, _query: &str, _chunks: &mut Vec<ScoredChunk>) -> anyhow::Result<()> {
            anyhow::bail!("model not loaded")
        }
    }

    #[tokio::test]
    async fn test_empty_chain_sorts() {
        let chunks = vec![scored("a", "", 5), scored("b", "", 15), scored("c", "", 10)];
        let ranked = RankerChain::new().rank("q", chunks).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_final_sort_runs_after_rankers() {
        let chain = RankerChain::new().with_ranker(Arc::new(ByLength));
        let chunks = vec![
            scored("short", "ab", 100),
            scored("long", "abcdefgh", 0),
            scored("mid", "abcd", 50),
        ];

        let ranked = chain.rank("q", chunks).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["long", "mid", "short"]);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        // semantic rank is untouched
        assert_eq!(ranked[2].semantic_rank, 100);
    }

    #[tokio::test]
    async fn test_final_sort_is_stable() {
        let chain = RankerChain::new().with_ranker(Arc::new(Flatten));
        let chunks = vec![scored("a", "", 3), scored("b", "", 2), scored("c", "", 1)];

        let ranked = chain.rank("q", chunks).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_ranker_failure_propagates() {
        let chain = RankerChain::new()
            .with_ranker(Arc::new(KeywordBoostRanker::new(1)))
            .with_ranker(Arc::new(Failing));

        let err = chain.rank("q", vec![scored("a", "", 1)]).await.unwrap_err();
        match err {
            ResolveError::Ranking { ranker, .. } => assert_eq!(ranker, "cross-encoder"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keyword_boost() {
        let chain = RankerChain::new().with_ranker(Arc::new(KeywordBoostRanker::new(10)));
        let chunks = vec![
            scored("berlin", "Berlin is the capital of Germany.", 10),
            scored("paris", "Paris is the capital of France.", 5),
            scored("tomato", "Tomatoes like warmth.", 0),
        ];

        let ranked = chain.rank("Capital of France", chunks).await.unwrap();
        let got: Vec<_> = ranked.iter().map(|c| (c.id(), c.score)).collect();
        // "of" is too short to count
        assert_eq!(got, vec![("paris", 25), ("berlin", 20), ("tomato", 0)]);
    }
}
