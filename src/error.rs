//! Error types and handling for the `TripWeaver` recommendation pipeline

use crate::models::Category;
use thiserror::Error;

/// Main error type for the `TripWeaver` application
///
/// Ambiguous locations are deliberately *not* represented here: callers
/// receive them as an outcome variant, since a disambiguation round trip is
/// an expected, frequent result rather than a fault.
#[derive(Error, Debug)]
pub enum TripweaverError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Request input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The geocoding collaborator was unreachable or returned nothing usable
    #[error("Location resolution unavailable: {message}")]
    ResolutionUnavailable { message: String },

    /// One category's places search failed or timed out
    ///
    /// Absorbed by the orchestrator (the category degrades to an empty
    /// list); surfaces as an `Err` only from direct provider use.
    #[error("Places search failed for {category}: {message}")]
    CategorySearchFailed { category: Category, message: String },

    /// Every category search failed or came back empty
    #[error("All category searches failed: {message}")]
    AllCategoriesFailed { message: String },

    /// LLM output did not parse as the required structure
    #[error("Generative output invalid: {message}")]
    InvalidGenerativeOutput { message: String },

    /// Cache write failed; logged by the orchestrator, never fatal
    #[error("Persistence failed: {message}")]
    PersistenceFailed { message: String },

    /// Relational store errors (schema, query, connection)
    #[error("Store error: {source}")]
    Store {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TripweaverError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new resolution-unavailable error
    pub fn resolution_unavailable<S: Into<String>>(message: S) -> Self {
        Self::ResolutionUnavailable {
            message: message.into(),
        }
    }

    /// Create a new per-category search failure
    pub fn category_search_failed<S: Into<String>>(category: Category, message: S) -> Self {
        Self::CategorySearchFailed {
            category,
            message: message.into(),
        }
    }

    /// Create a new aggregate search failure
    pub fn all_categories_failed<S: Into<String>>(message: S) -> Self {
        Self::AllCategoriesFailed {
            message: message.into(),
        }
    }

    /// Create a new invalid-generative-output error
    pub fn invalid_generative_output<S: Into<String>>(message: S) -> Self {
        Self::InvalidGenerativeOutput {
            message: message.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::PersistenceFailed {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TripweaverError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            TripweaverError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            TripweaverError::ResolutionUnavailable { .. } => {
                "Location lookup is temporarily unavailable. Recommendations will use your input as given."
                    .to_string()
            }
            TripweaverError::CategorySearchFailed { category, .. } => {
                format!("Search for {category} places failed. Other categories are unaffected.")
            }
            TripweaverError::AllCategoriesFailed { .. } => {
                "No place search succeeded. Please try again in a moment.".to_string()
            }
            TripweaverError::InvalidGenerativeOutput { .. } => {
                "The planning service returned an unusable reply.".to_string()
            }
            TripweaverError::PersistenceFailed { .. } => {
                "Saving recommendations to the cache failed. Results are still available."
                    .to_string()
            }
            TripweaverError::Store { .. } => {
                "Database operation failed. Please check the data directory.".to_string()
            }
            TripweaverError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TripweaverError>;
