//! Conversational escalation collaborators.
//!
//! After ranking, the resolver asks a [`ResponseDecider`] whether the query
//! wants a synthesized answer instead of raw documents. If it does, an
//! [`AnswerGenerator`] writes that answer from the selected documents' text.

use async_trait::async_trait;

/// Decides between a generated answer and a document list.
#[async_trait]
pub trait ResponseDecider: Send + Sync {
    async fn needs_conversational_response(&self, query: &str) -> anyhow::Result<bool>;
}

/// Generative backend.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `query` using `context` as the only source material.
    async fn generate(&self, query: &str, context: &[String]) -> anyhow::Result<String>;
}

/// Decider that always returns the same choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDecider(pub bool);

#[async_trait]
impl ResponseDecider for FixedDecider {
    async fn needs_conversational_response(&self, _query: &str) -> anyhow::Result<bool> {
        Ok(self.0)
    }
}
