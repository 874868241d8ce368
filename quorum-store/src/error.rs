//! Error types for the store crate

/// Result type for cache store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by cache store backends.
///
/// [`StoreError::DuplicateKey`] is the one expected failure: it reports that a
/// key already holds an answer, which the [`ResponseCache`](crate::ResponseCache)
/// protocol treats as a no-op. Every other variant is a genuine store fault.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An answer is already stored under this key
    #[error("Cache key already holds an answer: {key}")]
    DuplicateKey { key: String },

    /// A stored row could not be decoded into a cache entry
    #[error("Corrupt cache entry for {key}: {message}")]
    CorruptEntry { key: String, message: String },

    /// Errors from the SQLite backend
    #[error("Database error: {source}")]
    Database {
        #[from]
        source: sqlx::Error,
    },

    /// IO errors when preparing the database location
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a corrupt entry error for a key.
    pub fn corrupt<S: Into<String>>(key: &str, message: S) -> Self {
        Self::CorruptEntry {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error only reports an already-answered key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}
