//! Request and outcome types for the recommendation orchestrator

use crate::TripweaverError;
use crate::models::{
    CanonicalLocation, Category, DisambiguationOption, RecommendedPlace,
};
use serde::{Deserialize, Serialize};

/// Budget tier for a trip
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Budget,
    #[default]
    Standard,
    Luxury,
}

impl BudgetTier {
    /// Stable lowercase identifier, used in prompt templates
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetTier::Budget => "budget",
            BudgetTier::Standard => "standard",
            BudgetTier::Luxury => "luxury",
        }
    }
}

/// One recommendation request; lives only for the duration of a single
/// orchestration call
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecommendationRequest {
    /// Free-text city name, any script
    pub city: String,
    /// Free-text country name, any script
    pub country: String,
    /// Region choice from an earlier disambiguation round, if any
    #[serde(default)]
    pub region: Option<String>,
    /// Trip length in days
    #[serde(default = "default_duration_days")]
    pub duration_days: u32,
    /// Number of travelers
    #[serde(default = "default_traveler_count")]
    pub traveler_count: u32,
    /// Budget tier
    #[serde(default)]
    pub budget: BudgetTier,
    /// Travel styles (e.g. "foodie", "outdoors")
    #[serde(default)]
    pub styles: Vec<String>,
    /// Free-text preferences forwarded to the query planner
    #[serde(default)]
    pub preferences: Option<String>,
    /// Locale bias for places search (BCP-47-ish, e.g. "ko", "en")
    #[serde(default)]
    pub language: Option<String>,
}

fn default_duration_days() -> u32 {
    3
}

fn default_traveler_count() -> u32 {
    1
}

impl RecommendationRequest {
    /// Minimal request for a city/country pair
    #[must_use]
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
            region: None,
            duration_days: default_duration_days(),
            traveler_count: default_traveler_count(),
            budget: BudgetTier::default(),
            styles: Vec::new(),
            preferences: None,
            language: None,
        }
    }

    /// Check request invariants before any upstream call is made
    pub fn validate(&self) -> Result<(), TripweaverError> {
        if self.city.trim().is_empty() {
            return Err(TripweaverError::validation("city must not be empty"));
        }
        if self.country.trim().is_empty() {
            return Err(TripweaverError::validation("country must not be empty"));
        }
        if self.duration_days == 0 || self.duration_days > 90 {
            return Err(TripweaverError::validation(
                "duration_days must be between 1 and 90",
            ));
        }
        if self.traveler_count == 0 {
            return Err(TripweaverError::validation(
                "traveler_count must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Per-category slice of one response
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CategoryRecommendations {
    /// Category this slice belongs to
    pub category: Category,
    /// Accepted places, already deduplicated
    pub places: Vec<RecommendedPlace>,
    /// True when the category's search failed or timed out and the empty
    /// list is a degradation rather than a genuine absence
    pub failed: bool,
}

/// Degradations that occurred while producing an otherwise successful result
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ResultFlags {
    /// Geocoding was unavailable; raw input was treated as canonical
    pub resolution_degraded: bool,
    /// LLM planning failed; deterministic query templates were used
    pub planning_degraded: bool,
    /// Cache write failed after the result was assembled
    pub persistence_failed: bool,
}

impl ResultFlags {
    /// True when any degradation occurred
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.resolution_degraded || self.planning_degraded || self.persistence_failed
    }
}

/// A completed recommendation response
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecommendationResult {
    /// Canonical identity the recommendations were produced for
    pub location: CanonicalLocation,
    /// Cache row id of the city, when the store was reachable
    pub city_id: Option<i64>,
    /// Per-category recommendations in fixed order
    /// {tourism, food, activity, accommodation}
    pub categories: Vec<CategoryRecommendations>,
    /// Degradations that occurred along the way
    pub flags: ResultFlags,
    /// Size of the exclusion set that was applied
    pub previously_recommended: usize,
    /// Number of places newly accepted in this response
    pub newly_recommended: usize,
}

impl RecommendationResult {
    /// Iterate all accepted places across categories, in category order
    pub fn places(&self) -> impl Iterator<Item = &RecommendedPlace> {
        self.categories.iter().flat_map(|c| c.places.iter())
    }
}

/// Terminal outcome of one orchestration call
///
/// Ambiguity is an expected outcome, not an error: the caller picks one of
/// the options and resubmits with `region` set.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    /// Recommendations were produced (possibly degraded; see flags)
    Completed(RecommendationResult),
    /// The input maps to several administratively distinct places
    AmbiguousLocation {
        /// Ordered, deduplicated choices
        options: Vec<DisambiguationOption>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        assert!(RecommendationRequest::new("Seoul", "South Korea")
            .validate()
            .is_ok());

        let empty_city = RecommendationRequest::new("  ", "South Korea");
        assert!(empty_city.validate().is_err());

        let mut bad_duration = RecommendationRequest::new("Seoul", "South Korea");
        bad_duration.duration_days = 0;
        assert!(bad_duration.validate().is_err());
    }

    #[test]
    fn test_flags_degraded() {
        let mut flags = ResultFlags::default();
        assert!(!flags.degraded());
        flags.planning_degraded = true;
        assert!(flags.degraded());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = RecommendationOutcome::AmbiguousLocation { options: vec![] };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "ambiguous_location");
    }
}
