//! Indexed document chunks.

/// Stable identifier of an indexed chunk.
pub type ChunkId = String;

/// Id of the synthetic chunk that carries a generated answer.
pub const CONVERSATIONAL_CHUNK_ID: &str = "@conversational";

/// A document chunk as stored in the index.
///
/// Chunks are created once at index-build time and are read-only while
/// queries are resolved. Two chunks are equal when their ids are equal;
/// content is never compared.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    /// Where the chunk came from (file path, URL, ...), if known
    pub source: Option<String>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Wrap a generated answer so it can travel through the same output path
    /// as retrieved chunks.
    pub fn conversational(text: impl Into<String>) -> Self {
        Self::new(CONVERSATIONAL_CHUNK_ID, text)
    }

    pub fn is_conversational(&self) -> bool {
        self.id == CONVERSATIONAL_CHUNK_ID
    }

    /// First `max_chars` characters of the content on a single line.
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let mut cut: String = flat.chars().take(max_chars).collect();
            cut.push('…');
            cut
        }
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Chunk {}
