//! Record fetcher implementations
//!
//! A fetcher turns one [`Identifier`] into one [`RawDocument`] with exactly one
//! network request. Failures come back as [`FetcherError`] values so the batch
//! scheduler can leave the record incomplete and move on; fetchers never retry.

use crate::Identifier;
use async_trait::async_trait;
use std::time::Duration;

pub mod faa_http;

pub use faa_http::FaaRegistryFetcher;

/// Fetcher errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetcherError {
    /// Request exceeded the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Could not connect to the remote host
    #[error("connection error: {0}")]
    Connect(String),

    /// Remote answered with a non-success status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),

    /// Any other transport failure
    #[error("network error: {0}")]
    Network(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Document body returned by a fetch. Consumed by the extractor and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    body: String,
}

impl RawDocument {
    /// Wrap a decoded response body.
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Build a document from raw bytes, replacing invalid UTF-8 sequences.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            body: String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Document text.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Fetches the registry document for one identifier
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Issue one request for `identifier`.
    ///
    /// # Errors
    /// Returns a [`FetcherError`] on timeout, connection failure, non-success
    /// status or unreadable body. Implementations must not retry.
    async fn fetch(&self, identifier: &Identifier) -> FetcherResult<RawDocument>;

    /// Endpoint the fetcher talks to, for logging.
    fn endpoint(&self) -> &str;
}
