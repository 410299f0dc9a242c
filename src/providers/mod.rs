//! Upstream collaborator interfaces and HTTP implementations
//!
//! The core pipeline only ever talks to the three traits below; production
//! implementations live in the sibling modules and tests inject mocks.

pub mod generative;
pub mod geocoding;
pub mod places;

pub use generative::OpenAiGenerator;
pub use geocoding::GoogleGeocoding;
pub use places::GooglePlaces;

use crate::models::{GeocodeCandidate, PlaceCandidate};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by upstream collaborators
///
/// Deliberately coarse: the pipeline only distinguishes "try the fallback"
/// from "this reply cannot be trusted", so finer HTTP detail stays in the
/// message.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The collaborator was unreachable, errored, or is not configured
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The call exceeded its time budget
    #[error("provider call timed out")]
    Timeout,

    /// The collaborator answered with something unparseable
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

impl From<reqwest_middleware::Error> for ProviderError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(inner) => inner.into(),
            reqwest_middleware::Error::Middleware(inner) => {
                ProviderError::Unavailable(inner.to_string())
            }
        }
    }
}

/// Geocoding/disambiguation collaborator
///
/// Implementations return every plausible administrative match; deciding
/// whether the set is ambiguous is the resolver's job, not the provider's.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Geocode a free-text (city, country) pair into candidate identities
    ///
    /// An empty vector means the provider answered but found nothing.
    async fn geocode(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Vec<GeocodeCandidate>, ProviderError>;
}

/// Places-search collaborator
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Run one text search, biased toward the given locale
    async fn search_text(
        &self,
        query: &str,
        language: &str,
    ) -> Result<Vec<PlaceCandidate>, ProviderError>;
}

/// Generative text collaborator (LLM)
///
/// Callers must validate that the returned text parses as the structure
/// they expect before trusting it.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt into free text
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Build the shared retrying HTTP client used by all provider impls
///
/// Transient failures are retried with exponential backoff; the inner
/// request timeout bounds every attempt individually.
pub(crate) fn build_http_client(
    timeout_seconds: u32,
    max_retries: u32,
) -> Result<ClientWithMiddleware, ProviderError> {
    let inner = reqwest::Client::builder()
        .timeout(Duration::from_secs(u64::from(timeout_seconds)))
        .user_agent(concat!("tripweaver/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| ProviderError::Unavailable(err.to_string()))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    Ok(ClientBuilder::new(inner)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}
