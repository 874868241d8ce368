//! Error types for query resolution

use quorum_store::StoreError;

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Everything that can make a resolution call fail.
///
/// Empty results are not errors: a query with no document above the score
/// floor resolves to an answer with an empty document list.
///
/// # Error Categories
///
/// - **Expansion**: a query action failed or produced nothing
/// - **Index integrity**: the index is empty or holds duplicate chunks; these
///   point at a broken index build and are never retried
/// - **Cache drift**: a cached answer references a chunk the index no longer has
/// - **Collaborators**: index, ranker, decision, generator or cache store
///   failures, carried with their source error
/// - **Configuration**: invalid or unreadable settings
/// - **Invariant**: a malformed success answer, which indicates a bug
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The query was blank after trimming
    #[error("Query is empty")]
    EmptyQuery,

    /// A query action failed
    #[error("Query action '{action}' failed: {source}")]
    Expansion {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// The action chain produced no variants at all
    #[error("Query expansion produced no variants for {query:?}")]
    EmptyExpansion { query: String },

    /// The index returned nothing; it is probably not built
    #[error("Index returned no chunks for {query:?}; make sure the index has been built")]
    EmptyIndex { query: String },

    /// The two best results are the same chunk; the index is corrupted
    #[error("Index returned chunk {id} twice at the top of the results; rebuild the index")]
    DuplicateChunk { id: String },

    /// A cached answer points at a chunk that is no longer indexed
    #[error("Cached answer for {query:?} references chunk {id}, which is no longer indexed")]
    StaleReference { query: String, id: String },

    /// Index search or lookup failed
    #[error("Index error: {source}")]
    Index {
        #[source]
        source: anyhow::Error,
    },

    /// A ranker failed
    #[error("Ranker '{ranker}' failed: {source}")]
    Ranking {
        ranker: String,
        #[source]
        source: anyhow::Error,
    },

    /// The conversational decision function failed
    #[error("Conversational decision failed: {source}")]
    Decision {
        #[source]
        source: anyhow::Error,
    },

    /// The generative backend failed
    #[error("Answer generation failed: {source}")]
    Generation {
        #[source]
        source: anyhow::Error,
    },

    /// The cache store failed for a reason other than an already-answered key
    #[error("Cache error: {source}")]
    Cache {
        #[from]
        source: StoreError,
    },

    /// Configuration values are out of range
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file is not valid TOML for [`ResolverConfig`](crate::ResolverConfig)
    #[error("Configuration parse error: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// IO errors when reading configuration
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A success answer without a query or without documents. This is a bug.
    #[error("Resolved answer is malformed: {message}")]
    MalformedAnswer { message: &'static str },
}

impl ResolveError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error means the index itself needs rebuilding.
    pub fn is_index_integrity(&self) -> bool {
        matches!(self, Self::EmptyIndex { .. } | Self::DuplicateChunk { .. })
    }
}
