//! Recommendation categories and place records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four fixed recommendation buckets
///
/// Responses always present categories in the declaration order below,
/// regardless of which search completed first.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tourism,
    Food,
    Activity,
    Accommodation,
}

impl Category {
    /// All categories in canonical response order
    pub const ALL: [Category; 4] = [
        Category::Tourism,
        Category::Food,
        Category::Activity,
        Category::Accommodation,
    ];

    /// Stable lowercase identifier, used in storage and templates
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Tourism => "tourism",
            Category::Food => "food",
            Category::Activity => "activity",
            Category::Accommodation => "accommodation",
        }
    }

    /// Parse a stored identifier back into a category
    #[must_use]
    pub fn from_str_opt(value: &str) -> Option<Self> {
        match value {
            "tourism" => Some(Category::Tourism),
            "food" => Some(Category::Food),
            "activity" => Some(Category::Activity),
            "accommodation" => Some(Category::Accommodation),
            _ => None,
        }
    }

    /// Alias terms accepted when normalizing LLM replies
    #[must_use]
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Category::Tourism => &["tourism", "sightseeing", "attractions", "tourist", "sights"],
            Category::Food => &["food", "restaurants", "dining", "eateries", "cuisine"],
            Category::Activity => &["activity", "activities", "entertainment", "experiences"],
            Category::Accommodation => &["accommodation", "hotels", "lodging", "stay"],
        }
    }

    /// Keyword seed used by the deterministic fallback query template
    #[must_use]
    pub fn fallback_keywords(&self) -> &'static str {
        match self {
            Category::Tourism => "top rated tourist attractions",
            Category::Food => "popular local restaurants",
            Category::Activity => "fun activities and experiences",
            Category::Accommodation => "well located highly rated hotels",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One place as returned by the places-search collaborator
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlaceCandidate {
    /// Provider's stable place identifier
    pub external_id: String,
    /// Display name
    pub name: String,
    /// Formatted address
    pub address: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Average rating reported by the provider
    pub rating: Option<f64>,
    /// Number of ratings behind the average
    pub review_count: Option<u32>,
    /// Raw provider payload, persisted verbatim for later enrichment
    pub raw_payload: serde_json::Value,
}

/// A place accepted into a response, tagged with its category
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecommendedPlace {
    /// Category the place was recommended under
    pub category: Category,
    /// Provider's stable place identifier
    pub external_id: String,
    /// Display name
    pub name: String,
    /// Formatted address
    pub address: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Average rating reported by the provider
    pub rating: Option<f64>,
    /// Number of ratings behind the average
    pub review_count: Option<u32>,
}

impl RecommendedPlace {
    /// Tag a search candidate with its category
    #[must_use]
    pub fn from_candidate(category: Category, candidate: &PlaceCandidate) -> Self {
        Self {
            category,
            external_id: candidate.external_id.clone(),
            name: candidate.name.clone(),
            address: candidate.address.clone(),
            latitude: candidate.latitude,
            longitude: candidate.longitude,
            rating: candidate.rating,
            review_count: candidate.review_count,
        }
    }
}

/// A persisted cache row for a previously recommended place
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedPlace {
    /// Cache row id
    pub id: i64,
    /// Owning city row id
    pub city_id: i64,
    /// Provider's stable place identifier; unique per city
    pub external_place_id: String,
    /// Display name
    pub name: String,
    /// Category the place was first recommended under
    pub category: Category,
    /// Formatted address
    pub address: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Average rating; updated in place on re-sighting
    pub rating: Option<f64>,
    /// Review count; updated in place on re-sighting
    pub review_count: Option<u32>,
    /// When the row was first created
    pub created_at: DateTime<Utc>,
}
