//! The resolution controller.
//!
//! ```text
//! query ─▶ expand ─▶ cache lookup per variant ─┬─ hit ──▶ replay
//!                                              └─ miss ─▶ reserve, retrieve, rank (per variant)
//!                                                          ─▶ aggregate ─▶ floor
//!                                                          ─┬─ nothing left ─▶ empty answer
//!                                                           │                  ─▶ write every variant key
//!                                                           └─ decide ─▶ generate or list
//!                                                                      ─▶ write every variant key
//! ```
//!
//! Every collaborator call is awaited before the next one starts and nothing
//! is retried. A reservation only marks a call in flight: lookups skip reserved
//! keys, so a failed call leaves nothing behind that a later call would replay,
//! and a concurrent call for the same query computes its own answer. An empty
//! result is cached explicitly as [`CachedAnswer::Empty`].

use std::sync::Arc;

use quorum_store::{CacheEntry, CachedAnswer, CachedDocument, ChunkIndex, ResponseCache};
use tracing::{debug, info};

use crate::answer::{AnswerDocument, AnswerOrigin, AssistantAnswer};
use crate::config::ResolverConfig;
use crate::conversation::{AnswerGenerator, ResponseDecider};
use crate::ensemble::{EnsembleAggregator, EnsembleCandidate};
use crate::error::{ResolveError, Result};
use crate::expansion::{QueryAction, QueryExpander, QueryVariants, SynonymAction};
use crate::ranking::{Ranker, RankerChain};
use crate::retrieval::SemanticRetriever;

struct Conversation {
    decider: Arc<dyn ResponseDecider>,
    generator: Arc<dyn AnswerGenerator>,
}

/// Resolves user queries to answers, consulting and populating the cache.
pub struct Resolver {
    config: ResolverConfig,
    expander: QueryExpander,
    retriever: SemanticRetriever,
    rankers: RankerChain,
    aggregator: EnsembleAggregator,
    cache: ResponseCache,
    conversation: Option<Conversation>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("expander", &self.expander)
            .field("rankers", &self.rankers)
            .field("conversational", &self.conversation.is_some())
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Build a resolver. Configured synonym groups become the first query action.
    ///
    /// Without [`with_conversation`](Self::with_conversation) every answer is a
    /// document list.
    pub fn new(
        config: ResolverConfig,
        index: Arc<dyn ChunkIndex>,
        cache: ResponseCache,
    ) -> Result<Self> {
        config.validate()?;

        let mut expander = QueryExpander::new();
        if !config.synonyms.is_empty() {
            let synonyms = SynonymAction::new(config.synonyms.iter().cloned()).map_err(|e| {
                ResolveError::invalid_config(format!("unusable synonym phrase: {e}"))
            })?;
            debug!("Loaded {} synonym groups", synonyms.group_count());
            expander.push(Arc::new(synonyms));
        }

        Ok(Self {
            aggregator: EnsembleAggregator::from_config(&config),
            retriever: SemanticRetriever::new(index),
            rankers: RankerChain::new(),
            conversation: None,
            expander,
            cache,
            config,
        })
    }

    pub fn with_action(mut self, action: Arc<dyn QueryAction>) -> Self {
        self.expander.push(action);
        self
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.rankers.push(ranker);
        self
    }

    pub fn with_conversation(
        mut self,
        decider: Arc<dyn ResponseDecider>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        self.conversation = Some(Conversation { decider, generator });
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Resolve one user query.
    pub async fn resolve(&self, query: &str) -> Result<AssistantAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        let variants = self.expander.expand(query).await?;
        info!("Resolving {query:?} as {} variants", variants.len());

        for variant in variants.iter() {
            match self.cache.lookup(variant).await? {
                Some(CacheEntry::Answered(answer)) => {
                    info!("Cache hit for {variant:?} ({})", answer.kind());
                    return self.replay(variant, answer).await;
                }
                Some(CacheEntry::Reserved) => {
                    debug!("Cache miss for {variant:?}: reserved but not answered");
                }
                None => debug!("Cache miss for {variant:?}"),
            }
        }

        self.compute(&variants).await
    }

    /// Human-in-the-loop feedback: shift the stored score of one document in
    /// the cached answer for this exact query. Returns whether anything changed.
    pub async fn adjust_score(&self, query: &str, doc_id: &str, delta: i64) -> Result<bool> {
        Ok(self.cache.adjust_score(query, doc_id, delta).await?)
    }

    async fn replay(&self, variant: &str, answer: CachedAnswer) -> Result<AssistantAnswer> {
        let documents = match answer {
            CachedAnswer::Empty => {
                return Ok(AssistantAnswer::empty(variant, AnswerOrigin::Cache));
            }
            CachedAnswer::Conversational(text) => vec![AnswerDocument::conversational(text)],
            CachedAnswer::Documents(stored) if stored.is_empty() => {
                return Ok(AssistantAnswer::empty(variant, AnswerOrigin::Cache));
            }
            CachedAnswer::Documents(mut stored) => {
                stored.sort_by(|a, b| b.score.cmp(&a.score));
                let mut documents = Vec::with_capacity(stored.len());
                for cached in stored {
                    let chunk = self
                        .retriever
                        .index()
                        .get(&cached.id)
                        .await
                        .map_err(|source| ResolveError::Index { source })?
                        .ok_or_else(|| ResolveError::StaleReference {
                            query: variant.to_string(),
                            id: cached.id.clone(),
                        })?;
                    documents.push(AnswerDocument::scored(chunk, cached.score));
                }
                documents
            }
        };
        package(variant, documents, AnswerOrigin::Cache)
    }

    async fn compute(&self, variants: &QueryVariants) -> Result<AssistantAnswer> {
        let mut per_variant = Vec::with_capacity(variants.len());
        for variant in variants.iter() {
            self.cache.reserve(variant).await?;
            let retrieved = self.retriever.retrieve(variant).await?;
            let mut ranked = self.rankers.rank(variant, retrieved).await?;
            ranked.truncate(self.aggregator.per_variant_top_k());
            debug!(
                "Top documents for {variant:?}: {:?}",
                ranked.iter().map(|c| (c.id(), c.score)).collect::<Vec<_>>()
            );
            per_variant.push(ranked);
        }

        let fused = self.aggregator.aggregate(&per_variant);
        let survivors = self.aggregator.apply_floor(fused);
        let primary = variants.primary();
        if survivors.is_empty() {
            info!(
                "No document scored above {} for {primary:?}",
                self.aggregator.score_threshold()
            );
            for variant in variants.iter() {
                self.cache.write_empty(variant).await?;
            }
            return Ok(AssistantAnswer::empty(primary, AnswerOrigin::Computed));
        }

        let selected: Vec<EnsembleCandidate> = survivors
            .into_iter()
            .take(self.config.documents_to_return)
            .collect();
        debug!(
            "Selected {:?}",
            selected
                .iter()
                .map(|c| (c.chunk.id.as_str(), c.occurrences, c.ensemble_score))
                .collect::<Vec<_>>()
        );

        let documents = match self.conversational_answer(primary, &selected).await? {
            Some(text) => {
                for variant in variants.iter() {
                    self.cache.write_conversational(variant, &text).await?;
                }
                vec![AnswerDocument::conversational(text)]
            }
            None => {
                let cached: Vec<CachedDocument> = selected
                    .iter()
                    .map(|c| CachedDocument::new(c.chunk.id.clone(), c.ensemble_score))
                    .collect();
                for variant in variants.iter() {
                    self.cache.write_documents(variant, &cached).await?;
                }
                selected
                    .into_iter()
                    .map(|c| AnswerDocument::scored(c.chunk, c.ensemble_score))
                    .collect()
            }
        };

        let answer = package(primary, documents, AnswerOrigin::Computed)?;
        info!("Resolved {primary:?} to {} documents", answer.documents.len());
        Ok(answer)
    }

    /// Ask the decider and, if it wants one, generate an answer from the
    /// selected documents. `None` means answer with the documents themselves.
    async fn conversational_answer(
        &self,
        query: &str,
        selected: &[EnsembleCandidate],
    ) -> Result<Option<String>> {
        let Some(conversation) = &self.conversation else {
            return Ok(None);
        };

        let wanted = conversation
            .decider
            .needs_conversational_response(query)
            .await
            .map_err(|source| ResolveError::Decision { source })?;
        debug!("Conversational response wanted for {query:?}: {wanted}");
        if !wanted {
            return Ok(None);
        }

        let context: Vec<String> = selected.iter().map(|c| c.chunk.content.clone()).collect();
        let text = conversation
            .generator
            .generate(query, &context)
            .await
            .map_err(|source| ResolveError::Generation { source })?;
        Ok(Some(text))
    }
}

/// Build a success answer, checking it carries a query and documents.
fn package(
    query: &str,
    documents: Vec<AnswerDocument>,
    origin: AnswerOrigin,
) -> Result<AssistantAnswer> {
    if query.is_empty() {
        return Err(ResolveError::MalformedAnswer {
            message: "answer has no query",
        });
    }
    if documents.is_empty() {
        return Err(ResolveError::MalformedAnswer {
            message: "answer has no documents",
        });
    }
    Ok(AssistantAnswer {
        query: query.to_string(),
        documents,
        origin,
    })
}
