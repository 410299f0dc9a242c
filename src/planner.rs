//! Category-scoped search query planning
//!
//! For each of the four fixed categories the planner produces one short,
//! specific places-search query. The LLM is asked to diversify against the
//! places already recommended for the city; when it is unavailable, slow,
//! or returns something unusable, a deterministic template takes over so
//! the pipeline never stalls on planning.

use crate::models::{CanonicalLocation, Category, RecommendationRequest};
use crate::prompts::{self, PromptLibrary};
use crate::providers::TextGenerator;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Exclusion names included in the prompt, at most
const PROMPT_EXCLUSION_SAMPLE: usize = 20;
/// Accepted word-count range for one query
const QUERY_WORDS_MIN: usize = 2;
const QUERY_WORDS_MAX: usize = 12;
/// Accepted byte length for one query
const QUERY_LEN_MAX: usize = 120;

/// Search queries for one request, in fixed category order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQueries {
    /// One query per category, in `Category::ALL` order
    pub queries: Vec<(Category, String)>,
    /// True when any query came from the deterministic fallback
    pub degraded: bool,
}

impl PlannedQueries {
    /// Query planned for a category
    #[must_use]
    pub fn query(&self, category: Category) -> Option<&str> {
        self.queries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, q)| q.as_str())
    }
}

/// Service that plans category search queries
pub struct SearchQueryPlanner {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptLibrary,
    timeout: Duration,
}

impl SearchQueryPlanner {
    /// Create a new planner
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        prompts: PromptLibrary,
        timeout: Duration,
    ) -> Self {
        Self {
            generator,
            prompts,
            timeout,
        }
    }

    /// Plan one query per category
    ///
    /// Never fails: every category that cannot be planned generatively
    /// falls back to its deterministic template, and the result records
    /// that the plan is degraded.
    #[instrument(skip_all, fields(city = %location.city))]
    pub async fn plan(
        &self,
        location: &CanonicalLocation,
        request: &RecommendationRequest,
        exclusion_set: &HashSet<String>,
    ) -> PlannedQueries {
        let generated = match self.generate(location, request, exclusion_set).await {
            Ok(map) => map,
            Err(reason) => {
                warn!("query planning degraded: {reason}");
                Vec::new()
            }
        };

        let mut degraded = false;
        let queries = Category::ALL
            .iter()
            .map(|&category| {
                let query = generated
                    .iter()
                    .find(|(c, _)| *c == category)
                    .map(|(_, q)| q.clone())
                    .unwrap_or_else(|| {
                        degraded = true;
                        fallback_query(category, location)
                    });
                (category, query)
            })
            .collect();

        PlannedQueries { queries, degraded }
    }

    /// Ask the LLM for queries and keep the ones that validate
    async fn generate(
        &self,
        location: &CanonicalLocation,
        request: &RecommendationRequest,
        exclusion_set: &HashSet<String>,
    ) -> Result<Vec<(Category, String)>, String> {
        let prompt = self.build_prompt(location, request, exclusion_set).await;

        let reply = tokio::time::timeout(self.timeout, self.generator.complete(&prompt))
            .await
            .map_err(|_| "completion timed out".to_string())?
            .map_err(|err| err.to_string())?;

        let json = extract_json(&reply).ok_or("reply contained no JSON object")?;
        let parsed: Value =
            serde_json::from_str(&json).map_err(|err| format!("reply is not valid JSON: {err}"))?;
        let object = parsed.as_object().ok_or("reply JSON is not an object")?;

        let mut queries = Vec::new();
        for &category in &Category::ALL {
            let matched = object.iter().find(|(key, _)| {
                let key = key.to_lowercase();
                category.aliases().iter().any(|alias| key.contains(alias))
            });
            let Some((_, value)) = matched else {
                debug!("no {category} query in reply");
                continue;
            };
            match value.as_str() {
                Some(raw) if validate_query(raw) => {
                    queries.push((category, raw.trim().to_string()));
                }
                _ => debug!("rejected unusable {category} query: {value}"),
            }
        }

        if queries.is_empty() {
            return Err("no usable queries in reply".to_string());
        }
        Ok(queries)
    }

    async fn build_prompt(
        &self,
        location: &CanonicalLocation,
        request: &RecommendationRequest,
        exclusion_set: &HashSet<String>,
    ) -> String {
        let mut excluded: Vec<&str> = exclusion_set
            .iter()
            .map(String::as_str)
            .take(PROMPT_EXCLUSION_SAMPLE)
            .collect();
        excluded.sort_unstable();
        let excluded = if excluded.is_empty() {
            "none yet".to_string()
        } else {
            excluded.join(", ")
        };

        let styles = if request.styles.is_empty() {
            "general sightseeing".to_string()
        } else {
            request.styles.join(", ")
        };

        let template = self.prompts.search_strategy().await;
        prompts::render(
            &template,
            &[
                ("city", location.city.as_str()),
                ("region", location.region.as_deref().unwrap_or("-")),
                ("country", location.country.as_str()),
                ("duration_days", &request.duration_days.to_string()),
                ("traveler_count", &request.traveler_count.to_string()),
                ("budget", request.budget.as_str()),
                ("styles", &styles),
                (
                    "preferences",
                    request.preferences.as_deref().unwrap_or("none"),
                ),
                ("excluded_places", &excluded),
            ],
        )
    }
}

/// Deterministic template used when generative planning is unavailable
fn fallback_query(category: Category, location: &CanonicalLocation) -> String {
    format!(
        "{} in {} {}",
        category.fallback_keywords(),
        location.city,
        location.country
    )
}

/// A usable query is short, specific and multi-word, never a generic
/// single term the places search would answer with noise
fn validate_query(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > QUERY_LEN_MAX {
        return false;
    }
    let words = trimmed.split_whitespace().count();
    (QUERY_WORDS_MIN..=QUERY_WORDS_MAX).contains(&words)
}

/// Pull the first JSON object out of an LLM reply
///
/// Accepts fenced ```json blocks and bare objects with balanced braces.
fn extract_json(reply: &str) -> Option<String> {
    if let Some(start) = reply.find("```json") {
        let body = &reply[start + 7..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim().to_string());
        }
    }

    let start = reply.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in reply[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(reply[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
