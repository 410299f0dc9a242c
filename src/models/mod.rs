//! Data models for the `TripWeaver` application
//!
//! This module contains the core domain models organized by concern:
//! - Location: canonical administrative identities and disambiguation
//! - Place: recommendation categories and place records
//! - Recommendation: request and outcome types for the orchestrator

pub mod location;
pub mod place;
pub mod recommendation;

// Re-export all public types for convenient access
pub use location::{CanonicalLocation, DisambiguationOption, GeocodeCandidate, ResolvedCity};
pub use place::{CachedPlace, Category, PlaceCandidate, RecommendedPlace};
pub use recommendation::{
    BudgetTier, CategoryRecommendations, RecommendationOutcome, RecommendationRequest,
    RecommendationResult, ResultFlags,
};
