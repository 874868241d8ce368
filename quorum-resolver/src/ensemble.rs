//! Cross-variant consensus.
//!
//! Each query variant contributes its top-K ranked chunks. Per chunk id the
//! aggregator counts in how many variants the chunk appeared and sums its
//! fused scores. Candidates are ordered by occurrence count first and summed
//! score second, so agreement between variants beats a single strong score.
//! The score floor is applied after ordering.

use std::collections::HashMap;

use quorum_store::Chunk;

use crate::config::ResolverConfig;
use crate::scoring::ScoredChunk;

/// A chunk with its consensus statistics across variants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleCandidate {
    pub chunk: Chunk,
    /// Number of variants whose top-K contained the chunk
    pub occurrences: usize,
    /// Sum of the chunk's fused scores over those variants
    pub ensemble_score: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsembleAggregator {
    per_variant_top_k: usize,
    score_threshold: i64,
}

impl EnsembleAggregator {
    pub fn new(per_variant_top_k: usize, score_threshold: i64) -> Self {
        Self {
            per_variant_top_k,
            score_threshold,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.per_variant_top_k, config.score_threshold)
    }

    pub fn per_variant_top_k(&self) -> usize {
        self.per_variant_top_k
    }

    pub fn score_threshold(&self) -> i64 {
        self.score_threshold
    }

    /// Fuse ranked per-variant lists into one consensus ordering.
    ///
    /// Only the first `per_variant_top_k` entries of each list count. Ties on
    /// `(occurrences, ensemble_score)` keep the order of first appearance.
    pub fn aggregate(&self, variant_results: &[Vec<ScoredChunk>]) -> Vec<EnsembleCandidate> {
        let mut candidates: Vec<EnsembleCandidate> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for ranked in variant_results {
            for scored in ranked.iter().take(self.per_variant_top_k) {
                match positions.get(scored.id()) {
                    Some(&pos) => {
                        let candidate = &mut candidates[pos];
                        candidate.occurrences += 1;
                        candidate.ensemble_score += scored.score;
                    }
                    None => {
                        positions.insert(scored.id(), candidates.len());
                        candidates.push(EnsembleCandidate {
                            chunk: scored.chunk.clone(),
                            occurrences: 1,
                            ensemble_score: scored.score,
                        });
                    }
                }
            }
        }

        candidates.sort_by(|a, b| {
            (b.occurrences, b.ensemble_score).cmp(&(a.occurrences, a.ensemble_score))
        });
        candidates
    }

    /// Drop candidates whose ensemble score is not strictly above the floor.
    pub fn apply_floor(&self, candidates: Vec<EnsembleCandidate>) -> Vec<EnsembleCandidate> {
        candidates
            .into_iter()
            .filter(|c| c.ensemble_score > self.score_threshold)
            .collect()
    }
}
