//! Resolution output.

use quorum_store::Chunk;

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOrigin {
    /// Replayed from the response cache
    Cache,
    /// Computed by retrieval, ranking and aggregation
    Computed,
}

/// One output document.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerDocument {
    pub chunk: Chunk,
    /// Ensemble score, or `None` for a generated answer
    pub score: Option<i64>,
}

impl AnswerDocument {
    pub fn scored(chunk: Chunk, score: i64) -> Self {
        Self {
            chunk,
            score: Some(score),
        }
    }

    pub fn conversational(text: impl Into<String>) -> Self {
        Self {
            chunk: Chunk::conversational(text),
            score: None,
        }
    }

    pub fn is_conversational(&self) -> bool {
        self.chunk.is_conversational()
    }

    /// One line: id, score, source if known, then a content preview.
    pub fn brief(&self) -> String {
        let mut line = format!("[{}]", self.chunk.id);
        if let Some(score) = self.score {
            line.push_str(&format!(" {score}"));
        }
        if let Some(source) = &self.chunk.source {
            line.push_str(&format!(" ({source})"));
        }
        line.push(' ');
        line.push_str(&self.chunk.preview(80));
        line
    }
}

/// The answer to one resolution call.
///
/// An empty document list is a valid outcome: nothing cleared the score
/// floor, or the query was cached without an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantAnswer {
    /// The query variant the answer is labelled with
    pub query: String,
    pub documents: Vec<AnswerDocument>,
    pub origin: AnswerOrigin,
}

impl AssistantAnswer {
    pub fn empty(query: impl Into<String>, origin: AnswerOrigin) -> Self {
        Self {
            query: query.into(),
            documents: Vec::new(),
            origin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_conversational(&self) -> bool {
        matches!(self.documents.as_slice(), [doc] if doc.is_conversational())
    }

    pub fn from_cache(&self) -> bool {
        self.origin == AnswerOrigin::Cache
    }

    pub fn document_ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.chunk.id.as_str()).collect()
    }

    /// Multi-line summary: the query, then one line per document.
    pub fn brief(&self) -> String {
        let origin = match self.origin {
            AnswerOrigin::Cache => "cache",
            AnswerOrigin::Computed => "computed",
        };
        let mut out = format!("{:?} ({origin})", self.query);
        if self.documents.is_empty() {
            out.push_str("\n  (no documents)");
        }
        for doc in &self.documents {
            out.push_str("\n  ");
            out.push_str(&doc.brief());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brief() {
        let answer = AssistantAnswer {
            query: "capital of France".to_string(),
            documents: vec![
                AnswerDocument::scored(Chunk::new("paris", "Paris is the capital of France."), 320),
                AnswerDocument::scored(Chunk::new("lyon", "Lyon is a city\nin France."), 280),
            ],
            origin: AnswerOrigin::Computed,
        };

        assert_eq!(
            answer.brief(),
            "\"capital of France\" (computed)\n  \
             [paris] 320 Paris is the capital of France.\n  \
             [lyon] 280 Lyon is a city in France."
        );
        assert_eq!(answer.document_ids(), vec!["paris", "lyon"]);
        assert!(!answer.is_conversational());
    }

    #[test]
    fn test_empty_and_conversational() {
        let empty = AssistantAnswer::empty("capital of Atlantis", AnswerOrigin::Cache);
        assert!(empty.is_empty());
        assert!(empty.from_cache());
        assert!(empty.brief().ends_with("(no documents)"));

        let generated = AssistantAnswer {
            query: "capital of France".to_string(),
            documents: vec![AnswerDocument::conversational("It is Paris.")],
            origin: AnswerOrigin::Computed,
        };
        assert!(generated.is_conversational());
        assert_eq!(generated.documents[0].brief(), "[@conversational] It is Paris.");
    }

    #[test]
    fn test_brief_shows_source() {
        let doc = AnswerDocument::scored(
            Chunk::new("paris", "Paris is the capital of France.").with_source("geo/france.md"),
            320,
        );
        assert_eq!(
            doc.brief(),
            "[paris] 320 (geo/france.md) Paris is the capital of France."
        );
    }
}
