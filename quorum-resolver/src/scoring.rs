//! Per-call scoring state attached to retrieved chunks.

use quorum_store::Chunk;

/// A retrieved chunk together with the scores computed for one query variant.
///
/// `score` is the running fused score: the retriever seeds it with the
/// semantic baseline and every ranker may rewrite it. `semantic_rank` keeps
/// the untouched baseline for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub semantic_rank: i64,
    pub score: i64,
}

impl ScoredChunk {
    /// Seed both scores with the same baseline.
    pub fn new(chunk: Chunk, baseline: i64) -> Self {
        Self {
            chunk,
            semantic_rank: baseline,
            score: baseline,
        }
    }

    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    /// One-line summary: id, scores and a content preview.
    pub fn brief(&self) -> String {
        format!(
            "[{}] score={} semantic={} {}",
            self.chunk.id,
            self.score,
            self.semantic_rank,
            self.chunk.preview(60)
        )
    }
}
