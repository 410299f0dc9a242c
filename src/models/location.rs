//! Canonical administrative identities and disambiguation types

use serde::{Deserialize, Serialize};

/// A (country, region, city) triple standardized to English naming,
/// used as the durable storage key for the cache
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CanonicalLocation {
    /// Canonical city name
    pub city: String,
    /// Administrative region (province, state), when one disambiguates the city
    pub region: Option<String>,
    /// Canonical country name
    pub country: String,
}

impl CanonicalLocation {
    /// Create a canonical identity without a region qualifier
    #[must_use]
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            region: None,
            country: country.into(),
        }
    }

    /// Create a region-qualified canonical identity
    #[must_use]
    pub fn with_region(
        city: impl Into<String>,
        region: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            region: Some(region.into()),
            country: country.into(),
        }
    }

    /// Human-readable one-line rendering, region-qualified when present
    #[must_use]
    pub fn display_label(&self) -> String {
        match &self.region {
            Some(region) if region != &self.city => {
                format!("{}, {}, {}", self.city, region, self.country)
            }
            _ => format!("{}, {}", self.city, self.country),
        }
    }
}

/// One geocoding result, as reported by the geocoding collaborator
///
/// `kinds` carries the provider's type tags (e.g. `locality`,
/// `administrative_area_level_1`); the resolver uses them to drop
/// street-level and point-of-interest matches.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeocodeCandidate {
    /// Provider's stable identifier for this match, when available
    pub place_id: Option<String>,
    /// Full formatted address
    pub formatted_address: String,
    /// Country name from the administrative chain
    pub country: Option<String>,
    /// First-level administrative division (province, state)
    pub region: Option<String>,
    /// Locality (city) name
    pub city: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Provider type tags
    pub kinds: Vec<String>,
    /// Match confidence (0.0-1.0)
    pub confidence: f32,
}

/// One choice presented to the caller when the input maps to two or more
/// administratively distinct places
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DisambiguationOption {
    /// Label shown to the end user
    pub display_label: String,
    /// Canonical identity to resubmit with
    pub location: CanonicalLocation,
}

/// A successfully resolved city, with its storage row already ensured
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCity {
    /// Row id of the city in the cache store
    pub city_id: i64,
    /// Canonical identity
    pub location: CanonicalLocation,
    /// Latitude of the resolved locality
    pub latitude: Option<f64>,
    /// Longitude of the resolved locality
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label_with_region() {
        let loc = CanonicalLocation::with_region("Gwangju", "Gyeonggi-do", "South Korea");
        assert_eq!(loc.display_label(), "Gwangju, Gyeonggi-do, South Korea");
    }

    #[test]
    fn test_display_label_skips_region_equal_to_city() {
        let loc = CanonicalLocation::with_region("Seoul", "Seoul", "South Korea");
        assert_eq!(loc.display_label(), "Seoul, South Korea");
    }

    #[test]
    fn test_display_label_without_region() {
        let loc = CanonicalLocation::new("Lisbon", "Portugal");
        assert_eq!(loc.display_label(), "Lisbon, Portugal");
    }
}
