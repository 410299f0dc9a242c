//! Google Geocoding API client
//!
//! Resolves free-text locations into administrative identity chains. Names
//! are requested in English so they are stable enough to use as storage
//! keys downstream.

use crate::config::GeocodingConfig;
use crate::models::GeocodeCandidate;
use crate::providers::{GeocodingProvider, ProviderError, build_http_client};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Geocoding client for the Google Geocoding API
pub struct GoogleGeocoding {
    client: ClientWithMiddleware,
    config: GeocodingConfig,
}

impl GoogleGeocoding {
    /// Create a new geocoding client
    pub fn new(config: GeocodingConfig) -> Result<Self, ProviderError> {
        let client = build_http_client(config.timeout_seconds, config.max_retries)?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::Unavailable("geocoding API key not configured".into()))
    }
}

#[async_trait]
impl GeocodingProvider for GoogleGeocoding {
    #[instrument(skip(self))]
    async fn geocode(
        &self,
        city: &str,
        country: &str,
    ) -> Result<Vec<GeocodeCandidate>, ProviderError> {
        let key = self.api_key()?;
        let address = format!("{city}, {country}");
        let url = format!(
            "{}/geocode/json?address={}&language=en&key={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&address),
            key
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "geocoding returned HTTP {status}"
            )));
        }

        let body: GeocodeResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))?;

        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => {
                debug!("geocoding found nothing for '{address}'");
                return Ok(Vec::new());
            }
            other => {
                return Err(ProviderError::Unavailable(format!(
                    "geocoding status {other}"
                )));
            }
        }

        let candidates = body
            .results
            .into_iter()
            .map(GeocodeCandidate::from)
            .collect::<Vec<_>>();
        debug!("geocoding produced {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    place_id: Option<String>,
    formatted_address: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&str> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .map(|c| c.long_name.as_str())
    }

    /// Confidence weight derived from the result's type tags
    ///
    /// The Geocoding API reports no numeric score; locality-level matches
    /// are what the resolver wants, broader or narrower matches rank lower.
    fn confidence(&self) -> f32 {
        if self.types.iter().any(|t| t == "locality") {
            0.9
        } else if self
            .types
            .iter()
            .any(|t| t.starts_with("administrative_area_level"))
        {
            0.7
        } else if self.types.iter().any(|t| t == "sublocality") {
            0.5
        } else {
            0.3
        }
    }
}

impl From<GeocodeResult> for GeocodeCandidate {
    fn from(result: GeocodeResult) -> Self {
        let (latitude, longitude) = result
            .geometry
            .as_ref()
            .and_then(|g| g.location.as_ref())
            .map_or((0.0, 0.0), |loc| (loc.lat, loc.lng));

        let confidence = result.confidence();
        let country = result.component("country").map(str::to_string);
        let region = result
            .component("administrative_area_level_1")
            .map(str::to_string);
        let city = result
            .component("locality")
            .or_else(|| result.component("administrative_area_level_2"))
            .or_else(|| result.component("sublocality"))
            .map(str::to_string);

        GeocodeCandidate {
            place_id: result.place_id,
            formatted_address: result.formatted_address.unwrap_or_default(),
            country,
            region,
            city,
            latitude,
            longitude,
            kinds: result.types,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "place_id": "ChIJz0Q",
                "formatted_address": "Gwangju, South Korea",
                "types": ["locality", "political"],
                "geometry": {"location": {"lat": 35.1595, "lng": 126.8526}},
                "address_components": [
                    {"long_name": "Gwangju", "types": ["locality", "political"]},
                    {"long_name": "Gwangju", "types": ["administrative_area_level_1", "political"]},
                    {"long_name": "South Korea", "types": ["country", "political"]}
                ]
            }]
        })
    }

    fn client_for(server: &Server) -> GoogleGeocoding {
        let config = GeocodingConfig {
            api_key: Some("test-key".into()),
            base_url: server.url_str(""),
            timeout_seconds: 5,
            max_retries: 0,
        };
        GoogleGeocoding::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_parses_candidates() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/geocode/json"))
                .respond_with(json_encoded(sample_body())),
        );

        let client = client_for(&server);
        let candidates = client.geocode("Gwangju", "South Korea").await.unwrap();
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.city.as_deref(), Some("Gwangju"));
        assert_eq!(candidate.country.as_deref(), Some("South Korea"));
        assert!(candidate.confidence > 0.8);
        assert!((candidate.latitude - 35.1595).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_zero_results_is_empty_not_error() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/geocode/json")).respond_with(
                json_encoded(serde_json::json!({"status": "ZERO_RESULTS", "results": []})),
            ),
        );

        let client = client_for(&server);
        let candidates = client.geocode("Nowhere", "Atlantis").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let config = GeocodingConfig {
            api_key: None,
            ..GeocodingConfig::default()
        };
        let client = GoogleGeocoding::new(config).unwrap();
        let err = client.geocode("Seoul", "South Korea").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
