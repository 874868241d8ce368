//! Query expansion: one user query in, a set of equivalent variants out.
//!
//! A [`QueryExpander`] holds an ordered list of [`QueryAction`]s. Each action
//! is applied to every variant produced so far and the outputs are
//! concatenated, so actions compose left to right. Duplicates are collapsed
//! keeping the first occurrence, which makes the first variant produced the
//! primary one.
//!
//! ```text
//! "capital of France"
//!     │ IdentityAction
//!     ▼
//! ["capital of France"]
//!     │ SynonymAction [["capital of France", "France's capital"]]
//!     ▼
//! ["capital of France", "France's capital"]
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use regex::{NoExpand, Regex, RegexBuilder};
use tracing::debug;

use crate::error::{ResolveError, Result};

/// One transformation step of the expansion chain.
#[async_trait]
pub trait QueryAction: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Produce the variants of a single query.
    async fn act(&self, query: &str) -> anyhow::Result<Vec<String>>;
}

/// Returns the query unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAction;

#[async_trait]
impl QueryAction for IdentityAction {
    fn name(&self) -> &str {
        "identity"
    }

    async fn act(&self, query: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![query.to_string()])
    }
}

/// Phrase-level synonym substitution.
///
/// Each group lists interchangeable phrases. For every phrase found in the
/// query (case-insensitively, on word boundaries), the action emits the query
/// with that phrase replaced by each other phrase of its group. The original
/// query is always emitted first.
#[derive(Debug, Clone)]
pub struct SynonymAction {
    groups: Vec<Vec<(String, Regex)>>,
}

impl SynonymAction {
    pub fn new<G, P>(groups: G) -> std::result::Result<Self, regex::Error>
    where
        G: IntoIterator<Item = P>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let groups = groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|phrase| {
                        let phrase: String = phrase.into();
                        let pattern = phrase_pattern(&phrase);
                        RegexBuilder::new(&pattern)
                            .case_insensitive(true)
                            .build()
                            .map(|re| (phrase.trim().to_string(), re))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Escape a phrase and anchor it on word boundaries where it starts or ends
/// with a word character.
fn phrase_pattern(phrase: &str) -> String {
    let phrase = phrase.trim();
    let mut pattern = regex::escape(phrase);
    if phrase.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        pattern.insert_str(0, r"\b");
    }
    if phrase.ends_with(|c: char| c.is_alphanumeric() || c == '_') {
        pattern.push_str(r"\b");
    }
    pattern
}

#[async_trait]
impl QueryAction for SynonymAction {
    fn name(&self) -> &str {
        "synonyms"
    }

    async fn act(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let mut variants = vec![query.to_string()];
        for group in &self.groups {
            for (i, (_, pattern)) in group.iter().enumerate() {
                if !pattern.is_match(query) {
                    continue;
                }
                for (j, (replacement, _)) in group.iter().enumerate() {
                    if i != j {
                        let rewritten = pattern.replace_all(query, NoExpand(replacement));
                        variants.push(rewritten.into_owned());
                    }
                }
            }
        }
        Ok(variants)
    }
}

/// The expanded variants of one user query.
///
/// Never empty; the first variant is the primary one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariants {
    variants: Vec<String>,
}

impl QueryVariants {
    /// The first variant produced, used to label the answer
    pub fn primary(&self) -> &str {
        &self.variants[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn contains(&self, query: &str) -> bool {
        self.variants.iter().any(|v| v == query)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.variants
    }
}

/// Ordered chain of query actions.
#[derive(Clone, Default)]
pub struct QueryExpander {
    actions: Vec<Arc<dyn QueryAction>>,
}

impl std::fmt::Debug for QueryExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExpander")
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl QueryExpander {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: Arc<dyn QueryAction>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn push(&mut self, action: Arc<dyn QueryAction>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every action in order and collapse duplicate variants.
    ///
    /// With no actions the result is the query itself. A failing action, or a
    /// chain that leaves no variant, is an error.
    pub async fn expand(&self, query: &str) -> Result<QueryVariants> {
        let mut current = vec![query.to_string()];

        for action in &self.actions {
            let mut next = Vec::new();
            for variant in &current {
                let produced =
                    action
                        .act(variant)
                        .await
                        .map_err(|source| ResolveError::Expansion {
                            action: action.name().to_string(),
                            source,
                        })?;
                next.extend(produced);
            }
            debug!(
                "Action '{}' produced {} variants",
                action.name(),
                next.len()
            );
            current = next;
        }

        let variants: Vec<String> = current.into_iter().unique().collect();
        if variants.is_empty() {
            return Err(ResolveError::EmptyExpansion {
                query: query.to_string(),
            });
        }
        Ok(QueryVariants { variants })
    }
}
