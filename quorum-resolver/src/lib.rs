//! quorum-resolver: consensus query resolution over a semantic index
//!
//! A user question is expanded into equivalent variants, each variant is
//! retrieved and re-ranked independently, and the per-variant results are
//! fused by cross-variant agreement. Answers are cached under every variant
//! so repeated or paraphrased questions replay without retrieval.
//!
//! ## Key Modules
//!
//! - **[`expansion`]**: Query actions and the expander that chains them
//! - **[`retrieval`]**: Full-collection semantic retrieval with baseline scores
//! - **[`ranking`]**: Ranker trait and the chain that runs rankers in order
//! - **[`ensemble`]**: Occurrence-then-score aggregation and the score floor
//! - **[`conversation`]**: Decision and generation collaborators
//! - **[`resolver`]**: The controller tying everything to the response cache
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use quorum_resolver::{Resolver, ResolverConfig};
//! use quorum_store::{Chunk, MemoryIndex, ResponseCache};
//!
//! # async fn run() -> quorum_resolver::Result<()> {
//! let index = Arc::new(MemoryIndex::from_chunks([
//!     Chunk::new("paris", "Paris is the capital of France."),
//! ]));
//! let config = ResolverConfig::default()
//!     .with_synonym_group(["capital of France", "France's capital"]);
//! let resolver = Resolver::new(config, index, ResponseCache::in_memory())?;
//!
//! let answer = resolver.resolve("capital of France").await?;
//! println!("{}", answer.brief());
//! # Ok(())
//! # }
//! ```

pub mod answer;
pub mod config;
pub mod conversation;
pub mod ensemble;
pub mod error;
pub mod expansion;
pub mod ranking;
pub mod resolver;
pub mod retrieval;
pub mod scoring;

pub use answer::{AnswerDocument, AnswerOrigin, AssistantAnswer};
pub use config::ResolverConfig;
pub use conversation::{AnswerGenerator, FixedDecider, ResponseDecider};
pub use ensemble::{EnsembleAggregator, EnsembleCandidate};
pub use error::{ResolveError, Result};
pub use expansion::{IdentityAction, QueryAction, QueryExpander, QueryVariants, SynonymAction};
pub use ranking::{KeywordBoostRanker, Ranker, RankerChain};
pub use resolver::Resolver;
pub use retrieval::{SemanticRetriever, baseline_score};
pub use scoring::ScoredChunk;
