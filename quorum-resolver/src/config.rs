//! Resolver configuration

use std::path::Path;

use serde::Deserialize;

use crate::error::{ResolveError, Result};

/// Tuning knobs for the resolution pipeline.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration:
///
/// ```toml
/// score_threshold = 250
/// per_variant_top_k = 4
/// documents_to_return = 4
/// synonyms = [["capital of France", "France's capital"]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Ensemble scores must be strictly greater than this to survive
    pub score_threshold: i64,
    /// How many ranked chunks of each query variant enter the ensemble
    pub per_variant_top_k: usize,
    /// How many surviving documents make up an answer
    pub documents_to_return: usize,
    /// Groups of interchangeable phrases for the built-in synonym action
    pub synonyms: Vec<Vec<String>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            score_threshold: 250,
            per_variant_top_k: 4,
            documents_to_return: 4,
            synonyms: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_score_threshold(mut self, threshold: i64) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_per_variant_top_k(mut self, k: usize) -> Self {
        self.per_variant_top_k = k;
        self
    }

    pub fn with_documents_to_return(mut self, n: usize) -> Self {
        self.documents_to_return = n;
        self
    }

    /// Add a group of interchangeable phrases.
    pub fn with_synonym_group<I, S>(mut self, group: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.push(group.into_iter().map(Into::into).collect());
        self
    }

    /// Check that the cutoffs can produce an answer and synonym groups are usable.
    pub fn validate(&self) -> Result<()> {
        if self.per_variant_top_k == 0 {
            return Err(ResolveError::invalid_config(
                "per_variant_top_k must be at least 1",
            ));
        }
        if self.documents_to_return == 0 {
            return Err(ResolveError::invalid_config(
                "documents_to_return must be at least 1",
            ));
        }
        for group in &self.synonyms {
            if group.len() < 2 {
                return Err(ResolveError::invalid_config(format!(
                    "synonym group {group:?} needs at least two phrases"
                )));
            }
            if group.iter().any(|phrase| phrase.trim().is_empty()) {
                return Err(ResolveError::invalid_config(format!(
                    "synonym group {group:?} contains an empty phrase"
                )));
            }
        }
        Ok(())
    }
}
