use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tripweaver::api::ApiState;
use tripweaver::config::LoggingConfig;
use tripweaver::planner::SearchQueryPlanner;
use tripweaver::prompts::PromptLibrary;
use tripweaver::providers::{GoogleGeocoding, GooglePlaces, OpenAiGenerator};
use tripweaver::resolver::LocationResolver;
use tripweaver::store::PlaceStore;
use tripweaver::web;
use tripweaver::{RecommendationOrchestrator, TripweaverConfig};

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = TripweaverConfig::load().with_context(|| "Failed to load configuration")?;
    init_tracing(&config.logging);
    tracing::info!(version = tripweaver::VERSION, "starting tripweaver");

    let store = PlaceStore::open(&config.database.path)
        .with_context(|| format!("Failed to open place store at {}", config.database.path))?;

    let prompts = PromptLibrary::new(store.clone());
    prompts
        .seed_defaults()
        .await
        .with_context(|| "Failed to seed prompt templates")?;

    let geocoder = Arc::new(GoogleGeocoding::new(config.geocoding.clone())?);
    let places = Arc::new(GooglePlaces::new(config.places.clone())?);
    let generator = Arc::new(OpenAiGenerator::new(config.generative.clone())?);

    let resolver = Arc::new(LocationResolver::new(
        geocoder,
        store.clone(),
        config.resolver.clone(),
    ));
    let planner = SearchQueryPlanner::new(
        generator,
        prompts,
        Duration::from_secs(u64::from(config.generative.timeout_seconds)),
    );
    let orchestrator = Arc::new(RecommendationOrchestrator::new(
        Arc::clone(&resolver),
        planner,
        places,
        store.clone(),
        config.places.clone(),
    ));

    let state = ApiState {
        orchestrator,
        resolver,
        store,
    };
    web::run(&config.server, state).await
}
