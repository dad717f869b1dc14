//! Error types shared by every store operation and service.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while talking to the document store.
#[derive(Debug, Error)]
pub enum Error {
    /// A server-side condition did not hold for the current stored value.
    ///
    /// This is an expected outcome of optimistic concurrency, not a failure of the store.
    #[error("conditional check failed")]
    ConditionFailed,

    /// The identifier allocator ran out of attempts.
    #[error("could not allocate a new identifier in {collection} after {attempts} attempts")]
    AllocationExhausted {
        /// The collection the identifier was requested for.
        collection: String,
        /// Number of attempts that were made.
        attempts: usize,
    },

    /// The requested item does not exist (or is not visible to the caller).
    #[error("item not found")]
    NotFound,

    /// The collection is not known to the store.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A record lacks one of its collection's key attributes.
    #[error("record in {collection} is missing key attribute {attribute}")]
    MissingKey {
        /// The collection the record belongs to.
        collection: String,
        /// The missing key attribute.
        attribute: String,
    },

    /// A required input field is absent or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An attribute value the record model cannot represent.
    #[error("unsupported attribute value: {0}")]
    UnsupportedValue(String),

    /// An update that cannot be applied to the stored item.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// No authenticated subject in the claims.
    #[error("missing authentication claims")]
    Unauthenticated,

    /// The caller is authenticated but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Conversion between typed values and store items failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_dynamo::Error),

    /// The store itself failed (network, throttling, service error).
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(err))
    }

    /// Whether a fresh invocation of the same request may succeed.
    ///
    /// Exhausted allocations and store outages are transient; not-found and
    /// validation failures are terminal for the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AllocationExhausted { .. } | Self::Store(_))
    }
}
