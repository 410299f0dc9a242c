//! HTTP API surface over the recommendation core
//!
//! Thin by design: handlers validate transport concerns, delegate to the
//! core services, and map outcomes onto status codes. Partial degradation
//! is a 200 with flags, not an error.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::TripweaverError;
use crate::models::{
    CachedPlace, CanonicalLocation, Category, DisambiguationOption, RecommendationOutcome,
    RecommendationRequest,
};
use crate::orchestrator::RecommendationOrchestrator;
use crate::resolver::{LocationResolver, Resolution};
use crate::store::PlaceStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<RecommendationOrchestrator>,
    pub resolver: Arc<LocationResolver>,
    pub store: PlaceStore,
}

/// Build the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/recommendations", post(create_recommendations))
        .route("/locations/resolve", post(resolve_location))
        .route("/cities/{city_id}/places", get(list_cached_places))
        .route("/admin/cities/{city_id}/places", delete(purge_city_places))
        .with_state(state)
}

/// Liveness probe, mounted outside the `/api` nest
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": crate::VERSION,
    }))
}

async fn create_recommendations(
    State(state): State<ApiState>,
    Json(request): Json<RecommendationRequest>,
) -> Result<Json<RecommendationOutcome>, ApiError> {
    let outcome = state.orchestrator.recommend(request).await?;
    Ok(Json(outcome))
}

/// Request body for standalone location resolution
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub region: Option<String>,
}

/// Response body for standalone location resolution
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolveResponse {
    Resolved {
        city_id: i64,
        location: CanonicalLocation,
    },
    Ambiguous {
        options: Vec<DisambiguationOption>,
    },
}

async fn resolve_location(
    State(state): State<ApiState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
    if request.city.trim().is_empty() || request.country.trim().is_empty() {
        return Err(TripweaverError::validation("city and country are required").into());
    }

    let resolution = state
        .resolver
        .resolve(&request.city, &request.country, request.region.as_deref())
        .await?;

    let response = match resolution {
        Resolution::Resolved(resolved) => ResolveResponse::Resolved {
            city_id: resolved.city_id,
            location: resolved.location,
        },
        Resolution::Ambiguous(options) => ResolveResponse::Ambiguous { options },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct PlacesQuery {
    category: Option<String>,
}

async fn list_cached_places(
    State(state): State<ApiState>,
    Path(city_id): Path<i64>,
    Query(query): Query<PlacesQuery>,
) -> Result<Json<Vec<CachedPlace>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(|raw| {
            Category::from_str_opt(raw).ok_or_else(|| {
                TripweaverError::validation(format!("unknown category '{raw}'"))
            })
        })
        .transpose()?;

    let places = state.store.cached_places(city_id, category).await?;
    Ok(Json(places))
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    purged: usize,
}

async fn purge_city_places(
    State(state): State<ApiState>,
    Path(city_id): Path<i64>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let purged = state.store.purge_city_places(city_id).await?;
    Ok(Json(PurgeResponse { purged }))
}

/// Transport-level wrapper that maps core errors onto status codes
#[derive(Debug)]
pub struct ApiError(TripweaverError);

impl From<TripweaverError> for ApiError {
    fn from(err: TripweaverError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TripweaverError::Validation { .. } => StatusCode::BAD_REQUEST,
            TripweaverError::AllCategoriesFailed { .. } => StatusCode::BAD_GATEWAY,
            TripweaverError::ResolutionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "message": self.0.user_message(),
        }));
        (status, body).into_response()
    }
}
