//! Versioned prompt templates for the query planner
//!
//! Prompt wording is operational data, not code: templates live in the
//! `prompts` table and can be edited without a redeploy. The crate ships a
//! default that is seeded once and never overwrites operator edits.

use crate::error::Result;
use crate::store::PlaceStore;
use tracing::warn;

/// Name of the search-strategy template consumed by the planner
pub const SEARCH_STRATEGY: &str = "search_strategy_v1";

/// Built-in default for the search-strategy template
pub const DEFAULT_SEARCH_STRATEGY: &str = include_str!("templates/search_strategy_v1.txt");

/// Store-backed prompt templates with built-in fallbacks
#[derive(Clone)]
pub struct PromptLibrary {
    store: PlaceStore,
}

impl PromptLibrary {
    /// Create a library over the given store
    #[must_use]
    pub fn new(store: PlaceStore) -> Self {
        Self { store }
    }

    /// Seed built-in templates that are not present yet
    pub async fn seed_defaults(&self) -> Result<()> {
        self.store
            .seed_prompt(SEARCH_STRATEGY, DEFAULT_SEARCH_STRATEGY)
            .await
    }

    /// Fetch the search-strategy template, falling back to the built-in
    /// default when the store row is missing or unreadable
    pub async fn search_strategy(&self) -> String {
        match self.store.get_prompt(SEARCH_STRATEGY).await {
            Ok(Some(content)) => content,
            Ok(None) => DEFAULT_SEARCH_STRATEGY.to_string(),
            Err(err) => {
                warn!("prompt lookup failed, using built-in default: {err}");
                DEFAULT_SEARCH_STRATEGY.to_string()
            }
        }
    }
}

/// Render a template by substituting `{placeholder}` tokens
///
/// Unknown placeholders are left in place; the templates are trusted
/// operator data, not user input.
#[must_use]
pub fn render(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in substitutions {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}
