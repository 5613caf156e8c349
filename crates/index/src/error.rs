use thiserror::Error;

use crate::retry::Transient;

/// Errors raised inside the vector index client.
///
/// Only [`VectorStore::upsert`](crate::VectorStore::upsert) surfaces these to
/// callers; every other trait method degrades to an empty or `false` result and
/// logs the error instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    /// TCP connect failed (nothing listening, host down).
    #[error("vector service refused the connection: {0}")]
    ConnectionRefused(String),
    /// The request was sent but did not complete (timeout, reset, TLS).
    #[error("request to vector service failed: {0}")]
    Request(String),
    /// The configured collection does not exist.
    #[error("collection `{0}` not found")]
    CollectionNotFound(String),
    /// Any other non-success HTTP status.
    #[error("vector service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body did not have the expected shape.
    #[error("malformed vector service response: {0}")]
    Decode(String),
    /// The record violates a data-model invariant.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// The collection descriptor is unusable.
    #[error("invalid collection schema: {0}")]
    InvalidSchema(String),
    /// The service is known to be down.
    #[error("vector service unavailable: {0}")]
    Unavailable(String),
    /// Client construction or other local failures.
    #[error("backend error: {0}")]
    Backend(String),
}

impl IndexError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        IndexError::Backend(err.to_string())
    }

    /// True when the service itself is unreachable, as opposed to rejecting a request.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            IndexError::ConnectionRefused(_) | IndexError::Unavailable(_)
        )
    }
}

impl Transient for IndexError {
    fn is_transient(&self) -> bool {
        match self {
            IndexError::ConnectionRefused(_) | IndexError::Request(_) => true,
            IndexError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            IndexError::ConnectionRefused(err.to_string())
        } else if err.is_decode() {
            IndexError::Decode(err.to_string())
        } else {
            IndexError::Request(err.to_string())
        }
    }
}
