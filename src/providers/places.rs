//! Google Places text-search client (Places API v1)

use crate::config::PlacesConfig;
use crate::models::PlaceCandidate;
use crate::providers::{PlacesProvider, ProviderError, build_http_client};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use tracing::{debug, instrument};

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.location,places.rating,places.userRatingCount,places.types";

/// Places-search client for `places:searchText`
pub struct GooglePlaces {
    client: ClientWithMiddleware,
    config: PlacesConfig,
}

impl GooglePlaces {
    /// Create a new places-search client
    pub fn new(config: PlacesConfig) -> Result<Self, ProviderError> {
        let client = build_http_client(config.timeout_seconds, config.max_retries)?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::Unavailable("places API key not configured".into()))
    }

    /// Extract one candidate from a raw place object, keeping the payload
    /// verbatim for the cache
    fn parse_place(place: &Value) -> Option<PlaceCandidate> {
        let external_id = place.get("id")?.as_str()?.to_string();
        let name = place
            .pointer("/displayName/text")
            .and_then(Value::as_str)?
            .to_string();

        Some(PlaceCandidate {
            external_id,
            name,
            address: place
                .get("formattedAddress")
                .and_then(Value::as_str)
                .map(str::to_string),
            latitude: place.pointer("/location/latitude").and_then(Value::as_f64),
            longitude: place.pointer("/location/longitude").and_then(Value::as_f64),
            rating: place.get("rating").and_then(Value::as_f64),
            review_count: place
                .get("userRatingCount")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            raw_payload: place.clone(),
        })
    }
}

#[async_trait]
impl PlacesProvider for GooglePlaces {
    #[instrument(skip(self))]
    async fn search_text(
        &self,
        query: &str,
        language: &str,
    ) -> Result<Vec<PlaceCandidate>, ProviderError> {
        let key = self.api_key()?;
        let url = format!(
            "{}/v1/places:searchText",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "textQuery": query,
            "languageCode": language,
            "maxResultCount": self.config.max_per_category,
        });

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Api-Key", key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "places search returned HTTP {status}"
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        let places = parsed
            .get("places")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Self::parse_place)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        debug!("'{query}' matched {} places", places.len());
        Ok(places)
    }
}
