//! End-to-end recommendation orchestration
//!
//! Drives resolve → plan → search → dedup → persist with a fallback at
//! every stage. Expected outcomes (ambiguity, degraded modes) are tagged
//! result variants; only a request that cannot produce anything meaningful
//! surfaces as an error.

use crate::config::PlacesConfig;
use crate::error::{Result, TripweaverError};
use crate::models::{
    CanonicalLocation, Category, CategoryRecommendations, PlaceCandidate, RecommendationOutcome,
    RecommendationRequest, RecommendationResult, RecommendedPlace, ResultFlags,
};
use crate::planner::SearchQueryPlanner;
use crate::providers::{PlacesProvider, ProviderError};
use crate::resolver::{LocationResolver, Resolution};
use crate::store::PlaceStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Orchestrates one recommendation request end to end
pub struct RecommendationOrchestrator {
    resolver: Arc<LocationResolver>,
    planner: SearchQueryPlanner,
    places: Arc<dyn PlacesProvider>,
    store: PlaceStore,
    config: PlacesConfig,
}

impl RecommendationOrchestrator {
    /// Create a new orchestrator
    pub fn new(
        resolver: Arc<LocationResolver>,
        planner: SearchQueryPlanner,
        places: Arc<dyn PlacesProvider>,
        store: PlaceStore,
        config: PlacesConfig,
    ) -> Self {
        Self {
            resolver,
            planner,
            places,
            store,
            config,
        }
    }

    /// Produce recommendations for one request
    ///
    /// Returns `AmbiguousLocation` without searching when the input needs a
    /// disambiguation round trip. Degradations (resolution, planning,
    /// persistence, single categories) are absorbed into result flags; the
    /// only hard failures are invalid input and a fully failed search fan-out.
    #[instrument(skip(self), fields(city = %request.city, country = %request.country))]
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationOutcome> {
        request.validate()?;

        let mut flags = ResultFlags::default();

        // RESOLVING
        let (location, city_id) = match self
            .resolver
            .resolve(
                &request.city,
                &request.country,
                request.region.as_deref(),
            )
            .await
        {
            Ok(Resolution::Resolved(resolved)) => (resolved.location, Some(resolved.city_id)),
            Ok(Resolution::Ambiguous(options)) => {
                return Ok(RecommendationOutcome::AmbiguousLocation { options });
            }
            Err(err) => {
                // Degraded fallback: the raw input is treated as already
                // canonical so the trip is still served.
                warn!("resolution degraded: {err}");
                flags.resolution_degraded = true;
                let location = canonical_from_raw(&request);
                let city_id = match self.store.ensure_city(&location).await {
                    Ok(id) => Some(id),
                    Err(store_err) => {
                        warn!("city row unavailable in degraded mode: {store_err}");
                        None
                    }
                };
                (location, city_id)
            }
        };

        // Exclusion set read is best-effort; an unreadable cache must not
        // block recommendations.
        let exclusion_set = match city_id {
            Some(id) => self.store.exclusion_set(id).await.unwrap_or_else(|err| {
                warn!("exclusion set unavailable: {err}");
                HashSet::new()
            }),
            None => HashSet::new(),
        };

        // PLANNING
        let plan = self.planner.plan(&location, &request, &exclusion_set).await;
        if plan.degraded {
            flags.planning_degraded = true;
        }

        // SEARCHING: all four categories concurrently, each under its own
        // timeout so a slow category cannot starve a fast one.
        let language = request
            .language
            .clone()
            .unwrap_or_else(|| self.config.language.clone());
        let search_timeout = Duration::from_secs(u64::from(self.config.timeout_seconds));

        let searches = plan.queries.iter().map(|(category, query)| {
            let places = Arc::clone(&self.places);
            let category = *category;
            let query = query.clone();
            let language = language.clone();
            async move {
                let outcome =
                    tokio::time::timeout(search_timeout, places.search_text(&query, &language))
                        .await;
                let result = match outcome {
                    Ok(Ok(list)) => Ok(list),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(ProviderError::Timeout),
                };
                (category, result)
            }
        });
        let search_results: Vec<(Category, std::result::Result<Vec<PlaceCandidate>, ProviderError>)> =
            futures::future::join_all(searches).await;

        // A request where nothing at all came back is meaningless; report
        // one aggregate failure instead of four redundant ones.
        let nothing_found = search_results
            .iter()
            .all(|(_, result)| !matches!(result, Ok(list) if !list.is_empty()));
        if nothing_found {
            return Err(TripweaverError::all_categories_failed(format!(
                "no places found for '{}'",
                location.display_label()
            )));
        }

        // DEDUPING: fixed category order; a place may appear once per
        // response and never again for this city.
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        let mut accepted: Vec<(Category, PlaceCandidate)> = Vec::new();
        let mut categories: Vec<CategoryRecommendations> = Vec::new();

        for (category, result) in search_results {
            match result {
                Ok(candidates) => {
                    let mut kept = Vec::new();
                    for candidate in candidates {
                        if kept.len() >= self.config.max_per_category {
                            break;
                        }
                        let name_key = candidate.name.trim().to_lowercase();
                        if seen_ids.contains(&candidate.external_id)
                            || seen_names.contains(&name_key)
                            || exclusion_set.contains(&name_key)
                        {
                            debug!("dropping duplicate '{}'", candidate.name);
                            continue;
                        }
                        seen_ids.insert(candidate.external_id.clone());
                        seen_names.insert(name_key);
                        kept.push(RecommendedPlace::from_candidate(category, &candidate));
                        accepted.push((category, candidate));
                    }
                    categories.push(CategoryRecommendations {
                        category,
                        places: kept,
                        failed: false,
                    });
                }
                Err(err) => {
                    let failure = TripweaverError::category_search_failed(category, err.to_string());
                    warn!("{failure}");
                    categories.push(CategoryRecommendations {
                        category,
                        places: Vec::new(),
                        failed: true,
                    });
                }
            }
        }

        // PERSISTING: spawned so a caller that disconnects cannot cancel
        // the cache write mid-flight; the write stays valuable either way.
        let newly_recommended = accepted.len();
        match city_id {
            Some(id) if !accepted.is_empty() => {
                let store = self.store.clone();
                let persist = tokio::spawn(async move { store.upsert_places(id, accepted).await });
                match persist.await {
                    Ok(Ok(written)) => debug!("persisted {written} places for city {id}"),
                    Ok(Err(err)) => {
                        warn!(
                            "{}",
                            TripweaverError::persistence(format!("city {id}: {err}"))
                        );
                        flags.persistence_failed = true;
                    }
                    Err(join_err) => {
                        warn!("persistence task failed: {join_err}");
                        flags.persistence_failed = true;
                    }
                }
            }
            None if !accepted.is_empty() => {
                // No city row to attach the batch to; nothing was written.
                flags.persistence_failed = true;
            }
            _ => {}
        }

        info!(
            city = %location.city,
            new = newly_recommended,
            excluded = exclusion_set.len(),
            degraded = flags.degraded(),
            "recommendation completed"
        );

        Ok(RecommendationOutcome::Completed(RecommendationResult {
            location,
            city_id,
            categories,
            flags,
            previously_recommended: exclusion_set.len(),
            newly_recommended,
        }))
    }
}

/// Canonical identity assembled from raw input when resolution is down
fn canonical_from_raw(request: &RecommendationRequest) -> CanonicalLocation {
    match request.region.as_deref().map(str::trim) {
        Some(region) if !region.is_empty() => CanonicalLocation::with_region(
            request.city.trim(),
            region,
            request.country.trim(),
        ),
        _ => CanonicalLocation::new(request.city.trim(), request.country.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::models::GeocodeCandidate;
    use crate::prompts::PromptLibrary;
    use crate::providers::{GeocodingProvider, TextGenerator};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- mock collaborators ------------------------------------------------

    struct MockGeocoder {
        candidates: Vec<GeocodeCandidate>,
        fail: bool,
    }

    #[async_trait]
    impl GeocodingProvider for MockGeocoder {
        async fn geocode(
            &self,
            _city: &str,
            _country: &str,
        ) -> std::result::Result<Vec<GeocodeCandidate>, ProviderError> {
            if self.fail {
                Err(ProviderError::Unavailable("mock outage".into()))
            } else {
                Ok(self.candidates.clone())
            }
        }
    }

    /// Generator that plans one marker query per category so the mock
    /// places provider can dispatch on the query text
    struct MarkerGenerator;

    #[async_trait]
    impl TextGenerator for MarkerGenerator {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
            Ok(r#"{"tourism": "tourism probe query", "food": "food probe query",
                   "activity": "activity probe query", "accommodation": "accommodation probe query"}"#
                .to_string())
        }
    }

    #[derive(Clone)]
    enum Behavior {
        Return(Vec<PlaceCandidate>),
        Empty,
        Fail,
    }

    struct MockPlaces {
        tourism: Behavior,
        food: Behavior,
        activity: Behavior,
        accommodation: Behavior,
        calls: AtomicUsize,
    }

    impl MockPlaces {
        fn uniform(behavior: Behavior) -> Self {
            Self {
                tourism: behavior.clone(),
                food: behavior.clone(),
                activity: behavior.clone(),
                accommodation: behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PlacesProvider for MockPlaces {
        async fn search_text(
            &self,
            query: &str,
            _language: &str,
        ) -> std::result::Result<Vec<PlaceCandidate>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = if query.contains("tourism") {
                &self.tourism
            } else if query.contains("food") || query.contains("restaurants") {
                &self.food
            } else if query.contains("activit") {
                &self.activity
            } else {
                &self.accommodation
            };
            match behavior {
                Behavior::Return(list) => Ok(list.clone()),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Fail => Err(ProviderError::Unavailable("mock category outage".into())),
            }
        }
    }

    // -- fixtures ----------------------------------------------------------

    fn candidate(id: &str, name: &str) -> PlaceCandidate {
        PlaceCandidate {
            external_id: id.to_string(),
            name: name.to_string(),
            address: None,
            latitude: Some(37.5),
            longitude: Some(127.0),
            rating: Some(4.5),
            review_count: Some(10),
            raw_payload: serde_json::json!({"id": id}),
        }
    }

    fn seoul_candidate() -> GeocodeCandidate {
        GeocodeCandidate {
            place_id: Some("pid-seoul".into()),
            formatted_address: "Seoul, South Korea".into(),
            country: Some("South Korea".into()),
            region: Some("Seoul".into()),
            city: Some("Seoul".into()),
            latitude: 37.56,
            longitude: 126.97,
            kinds: vec!["locality".into()],
            confidence: 0.9,
        }
    }

    fn gwangju_candidates() -> Vec<GeocodeCandidate> {
        let metro = GeocodeCandidate {
            place_id: Some("pid-metro".into()),
            formatted_address: "Gwangju, South Korea".into(),
            country: Some("South Korea".into()),
            region: Some("Gwangju".into()),
            city: Some("Gwangju".into()),
            latitude: 35.16,
            longitude: 126.85,
            kinds: vec!["locality".into()],
            confidence: 0.9,
        };
        let county = GeocodeCandidate {
            place_id: Some("pid-county".into()),
            formatted_address: "Gwangju-si, Gyeonggi-do, South Korea".into(),
            region: Some("Gyeonggi-do".into()),
            city: Some("Gwangju-si".into()),
            latitude: 37.41,
            longitude: 127.26,
            kinds: vec!["locality".into()],
            confidence: 0.85,
            ..metro.clone()
        };
        vec![metro, county]
    }

    fn orchestrator(
        geocoder: MockGeocoder,
        places: MockPlaces,
        store: PlaceStore,
        max_per_category: usize,
    ) -> RecommendationOrchestrator {
        let config = PlacesConfig {
            max_per_category,
            timeout_seconds: 2,
            ..PlacesConfig::default()
        };
        let resolver = Arc::new(LocationResolver::new(
            Arc::new(geocoder),
            store.clone(),
            ResolverConfig::default(),
        ));
        let planner = SearchQueryPlanner::new(
            Arc::new(MarkerGenerator),
            PromptLibrary::new(store.clone()),
            Duration::from_millis(500),
        );
        RecommendationOrchestrator::new(resolver, planner, Arc::new(places), store, config)
    }

    fn completed(outcome: RecommendationOutcome) -> RecommendationResult {
        match outcome {
            RecommendationOutcome::Completed(result) => result,
            RecommendationOutcome::AmbiguousLocation { .. } => {
                panic!("expected completed outcome")
            }
        }
    }

    // -- tests -------------------------------------------------------------

    #[tokio::test]
    async fn test_happy_path_fixed_category_order() {
        let places = MockPlaces {
            tourism: Behavior::Return(vec![candidate("t1", "Palace")]),
            food: Behavior::Return(vec![candidate("f1", "Market")]),
            activity: Behavior::Return(vec![candidate("a1", "River Walk")]),
            accommodation: Behavior::Return(vec![candidate("h1", "Hanok Stay")]),
            calls: AtomicUsize::new(0),
        };
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            places,
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let result = completed(
            engine
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );

        let order: Vec<Category> = result.categories.iter().map(|c| c.category).collect();
        assert_eq!(order, Category::ALL.to_vec());
        assert!(!result.flags.degraded());
        assert_eq!(result.newly_recommended, 4);
        assert_eq!(result.previously_recommended, 0);
        assert!(result.city_id.is_some());
    }

    #[tokio::test]
    async fn test_partial_category_failure_is_success() {
        let places = MockPlaces {
            tourism: Behavior::Return(vec![candidate("t1", "Palace")]),
            food: Behavior::Fail,
            activity: Behavior::Return(vec![candidate("a1", "River Walk")]),
            accommodation: Behavior::Return(vec![candidate("h1", "Hanok Stay")]),
            calls: AtomicUsize::new(0),
        };
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            places,
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let result = completed(
            engine
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );

        let food = &result.categories[1];
        assert_eq!(food.category, Category::Food);
        assert!(food.failed);
        assert!(food.places.is_empty());
        assert_eq!(result.categories[0].places.len(), 1);
        assert_eq!(result.categories[2].places.len(), 1);
        assert_eq!(result.categories[3].places.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_category_dedup_within_one_response() {
        // The same market comes back for tourism and food; only the
        // earlier category may keep it.
        let market = candidate("m1", "Gwangjang Market");
        let places = MockPlaces {
            tourism: Behavior::Return(vec![market.clone(), candidate("t2", "Palace")]),
            food: Behavior::Return(vec![market]),
            activity: Behavior::Empty,
            accommodation: Behavior::Return(vec![candidate("h1", "Hanok Stay")]),
            calls: AtomicUsize::new(0),
        };
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            places,
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let result = completed(
            engine
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );

        let mut names_seen = HashSet::new();
        for category in &result.categories {
            for place in &category.places {
                assert!(
                    names_seen.insert(place.name.to_lowercase()),
                    "'{}' appeared twice",
                    place.name
                );
            }
        }
        assert_eq!(result.categories[0].places.len(), 2);
        assert!(result.categories[1].places.is_empty());
        assert!(!result.categories[1].failed);
    }

    #[tokio::test]
    async fn test_repeat_requests_return_disjoint_places() {
        let catalogue = vec![
            candidate("t1", "Palace"),
            candidate("t2", "Old Gate"),
            candidate("t3", "City Wall"),
            candidate("t4", "Folk Village"),
        ];
        let store = PlaceStore::open_in_memory().unwrap();
        let make_engine = |store: &PlaceStore| {
            orchestrator(
                MockGeocoder {
                    candidates: vec![seoul_candidate()],
                    fail: false,
                },
                MockPlaces {
                    tourism: Behavior::Return(catalogue.clone()),
                    food: Behavior::Empty,
                    activity: Behavior::Empty,
                    accommodation: Behavior::Empty,
                    calls: AtomicUsize::new(0),
                },
                store.clone(),
                2,
            )
        };

        let first = completed(
            make_engine(&store)
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );
        let second = completed(
            make_engine(&store)
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );

        let first_names: HashSet<String> =
            first.places().map(|p| p.name.to_lowercase()).collect();
        let second_names: HashSet<String> =
            second.places().map(|p| p.name.to_lowercase()).collect();

        assert_eq!(first_names.len(), 2);
        assert_eq!(second_names.len(), 2);
        assert!(first_names.is_disjoint(&second_names));
        assert_eq!(second.previously_recommended, 2);
    }

    #[tokio::test]
    async fn test_ambiguous_input_short_circuits_before_search() {
        let store = PlaceStore::open_in_memory().unwrap();
        let places = Arc::new(MockPlaces::uniform(Behavior::Return(vec![candidate(
            "t1", "Palace",
        )])));
        let resolver = Arc::new(LocationResolver::new(
            Arc::new(MockGeocoder {
                candidates: gwangju_candidates(),
                fail: false,
            }),
            store.clone(),
            ResolverConfig::default(),
        ));
        let planner = SearchQueryPlanner::new(
            Arc::new(MarkerGenerator),
            PromptLibrary::new(store.clone()),
            Duration::from_millis(500),
        );
        let engine = RecommendationOrchestrator::new(
            resolver,
            planner,
            Arc::clone(&places) as Arc<dyn PlacesProvider>,
            store,
            PlacesConfig::default(),
        );

        let outcome = engine
            .recommend(RecommendationRequest::new("Gwangju", "South Korea"))
            .await
            .unwrap();

        match outcome {
            RecommendationOutcome::AmbiguousLocation { options } => {
                assert_eq!(options.len(), 2);
            }
            RecommendationOutcome::Completed(_) => panic!("expected ambiguity"),
        }
        // No search ran before the caller's disambiguation choice.
        assert_eq!(places.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_region_choice_resubmission_completes() {
        let engine = orchestrator(
            MockGeocoder {
                candidates: gwangju_candidates(),
                fail: false,
            },
            MockPlaces::uniform(Behavior::Return(vec![candidate("t1", "Namhansanseong")])),
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let mut request = RecommendationRequest::new("Gwangju", "South Korea");
        request.region = Some("Gyeonggi-do".into());
        let result = completed(engine.recommend(request).await.unwrap());
        assert_eq!(result.location.region.as_deref(), Some("Gyeonggi-do"));
    }

    #[tokio::test]
    async fn test_degraded_resolution_still_serves() {
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![],
                fail: true,
            },
            MockPlaces::uniform(Behavior::Return(vec![candidate("t1", "Palace")])),
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let result = completed(
            engine
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );

        assert!(result.flags.resolution_degraded);
        assert!(result.flags.degraded());
        assert!(result.newly_recommended > 0);
        // Raw input was treated as canonical and still earned a city row.
        assert!(result.city_id.is_some());
        assert_eq!(result.location.city, "Seoul");
    }

    #[tokio::test]
    async fn test_all_categories_failing_is_aggregate_error() {
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            MockPlaces::uniform(Behavior::Fail),
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let err = engine
            .recommend(RecommendationRequest::new("Seoul", "South Korea"))
            .await
            .unwrap_err();
        assert!(matches!(err, TripweaverError::AllCategoriesFailed { .. }));
    }

    #[tokio::test]
    async fn test_all_categories_empty_is_aggregate_error() {
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            MockPlaces::uniform(Behavior::Empty),
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let err = engine
            .recommend(RecommendationRequest::new("Seoul", "South Korea"))
            .await
            .unwrap_err();
        assert!(matches!(err, TripweaverError::AllCategoriesFailed { .. }));
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_any_call() {
        let places = MockPlaces::uniform(Behavior::Return(vec![candidate("t1", "Palace")]));
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            places,
            PlaceStore::open_in_memory().unwrap(),
            10,
        );

        let err = engine
            .recommend(RecommendationRequest::new("", "South Korea"))
            .await
            .unwrap_err();
        assert!(matches!(err, TripweaverError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_short_category_is_returned_short() {
        // Only one tourism place is available but three were asked for:
        // return the one, no padding, no error.
        let engine = orchestrator(
            MockGeocoder {
                candidates: vec![seoul_candidate()],
                fail: false,
            },
            MockPlaces {
                tourism: Behavior::Return(vec![candidate("t1", "Palace")]),
                food: Behavior::Empty,
                activity: Behavior::Empty,
                accommodation: Behavior::Empty,
                calls: AtomicUsize::new(0),
            },
            PlaceStore::open_in_memory().unwrap(),
            3,
        );

        let result = completed(
            engine
                .recommend(RecommendationRequest::new("Seoul", "South Korea"))
                .await
                .unwrap(),
        );
        assert_eq!(result.categories[0].places.len(), 1);
        assert!(result.categories[1].places.is_empty());
    }
}
