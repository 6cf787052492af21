//! FAA aircraft inquiry fetcher
//!
//! Posts the N-number search form and returns the result page. One request
//! per identifier; status and transport failures are mapped to
//! [`FetcherError`] and handed back to the caller.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{FetcherError, FetcherResult, RawDocument, RecordFetcher};
use crate::Identifier;

/// N-number search endpoint of the FAA registry
pub const FAA_NNUMBER_URL: &str = "https://registry.faa.gov/aircraftinquiry/Search/NNumberResult";

/// Origin header the search form is submitted with
const FAA_ORIGIN: &str = "https://registry.faa.gov";

/// Form field carrying the N-number
const NNUMBER_FORM_FIELD: &str = "NNumbertxt";

/// The registry rejects requests without a browser user agent
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// HTTP connect timeout (seconds)
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fetcher for the FAA N-number inquiry page
#[derive(Debug, Clone)]
pub struct FaaRegistryFetcher {
    client: Client,
    endpoint: String,
    request_timeout: Option<Duration>,
}

impl FaaRegistryFetcher {
    /// Create a fetcher against the public FAA endpoint.
    ///
    /// `request_timeout` bounds each whole request; `None` leaves it unbounded.
    ///
    /// # Errors
    /// Returns [`FetcherError::Client`] if the TLS backend cannot be initialized.
    pub fn new(request_timeout: Option<Duration>) -> FetcherResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .user_agent(BROWSER_USER_AGENT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetcherError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: FAA_NNUMBER_URL.to_string(),
            request_timeout,
        })
    }

    /// Point the fetcher at a different URL (mirror or test server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn map_error(&self, error: reqwest::Error) -> FetcherError {
        if error.is_timeout() {
            FetcherError::Timeout(self.request_timeout.unwrap_or_default())
        } else if error.is_connect() {
            FetcherError::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            FetcherError::Body(error.to_string())
        } else {
            FetcherError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl RecordFetcher for FaaRegistryFetcher {
    async fn fetch(&self, identifier: &Identifier) -> FetcherResult<RawDocument> {
        debug!(identifier = %identifier, endpoint = %self.endpoint, "Fetching registry page");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ORIGIN, FAA_ORIGIN)
            .form(&[(NNUMBER_FORM_FIELD, identifier.as_str())])
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetcherError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| self.map_error(e))?;
        debug!(identifier = %identifier, bytes = body.len(), "Registry page received");
        Ok(RawDocument::new(body))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
