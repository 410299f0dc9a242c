//! Location resolution and disambiguation
//!
//! Turns a free-text (city, country) pair into a canonical administrative
//! identity, or into a list of choices when the pair denotes two or more
//! administratively distinct places (same-named cities in different
//! regions). Ambiguity is detected structurally from the geocoder's
//! candidates; the only tunable data is the configured suffix list used to
//! compare locality names across administrative naming conventions.

use crate::config::ResolverConfig;
use crate::error::{Result, TripweaverError};
use crate::models::{CanonicalLocation, DisambiguationOption, GeocodeCandidate, ResolvedCity};
use crate::providers::GeocodingProvider;
use crate::store::PlaceStore;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of one resolution attempt
#[derive(Debug)]
pub enum Resolution {
    /// Exactly one identity matched; storage rows are ensured
    Resolved(ResolvedCity),
    /// Two or more administratively distinct identities share the name
    Ambiguous(Vec<DisambiguationOption>),
}

/// Service for resolving raw location inputs
pub struct LocationResolver {
    geocoder: Arc<dyn GeocodingProvider>,
    store: PlaceStore,
    config: ResolverConfig,
}

/// One deduplicated administrative identity derived from geocoder output
#[derive(Debug, Clone)]
struct CandidateIdentity {
    country: String,
    region: Option<String>,
    city: String,
    base: String,
    display: String,
    latitude: f64,
    longitude: f64,
    confidence: f32,
}

impl LocationResolver {
    /// Create a new resolver
    pub fn new(
        geocoder: Arc<dyn GeocodingProvider>,
        store: PlaceStore,
        config: ResolverConfig,
    ) -> Self {
        Self {
            geocoder,
            store,
            config,
        }
    }

    /// Resolve a raw (city, country) pair
    ///
    /// `region_hint` comes from an earlier disambiguation round and picks
    /// the matching branch instead of re-asking the caller.
    ///
    /// Fails with `ResolutionUnavailable` when the geocoding collaborator
    /// is unreachable or returns nothing usable; callers are expected to
    /// fall back to treating the raw input as already canonical.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        raw_city: &str,
        raw_country: &str,
        region_hint: Option<&str>,
    ) -> Result<Resolution> {
        let candidates = self
            .geocoder
            .geocode(raw_city.trim(), raw_country.trim())
            .await
            .map_err(|err| {
                warn!("geocoding unavailable: {err}");
                TripweaverError::resolution_unavailable(err.to_string())
            })?;

        if candidates.is_empty() {
            return Err(TripweaverError::resolution_unavailable(format!(
                "no geocoding match for '{raw_city}, {raw_country}'"
            )));
        }

        let mut identities = self.collect_identities(raw_city, raw_country, candidates);
        if identities.is_empty() {
            return Err(TripweaverError::resolution_unavailable(format!(
                "no administrative match for '{raw_city}, {raw_country}'"
            )));
        }

        if let Some(hint) = region_hint {
            let hinted: Vec<CandidateIdentity> = identities
                .iter()
                .filter(|identity| {
                    identity
                        .region
                        .as_deref()
                        .is_some_and(|region| region.eq_ignore_ascii_case(hint.trim()))
                })
                .cloned()
                .collect();
            if hinted.is_empty() {
                debug!("region hint '{hint}' matched no candidate, ignoring");
            } else {
                identities = hinted;
            }
        }

        // Identities sharing the best match's base name compete for it; two
        // or more distinct survivors mean the input is genuinely ambiguous.
        let primary_base = identities[0].base.clone();
        let contenders: Vec<CandidateIdentity> = identities
            .into_iter()
            .filter(|identity| identity.base == primary_base)
            .collect();

        if contenders.len() >= 2 {
            info!(
                "'{raw_city}, {raw_country}' is ambiguous across {} identities",
                contenders.len()
            );
            let options = contenders
                .into_iter()
                .map(|identity| DisambiguationOption {
                    display_label: identity.display_label(),
                    location: identity.into_location(),
                })
                .collect();
            return Ok(Resolution::Ambiguous(options));
        }

        let Some(identity) = contenders.into_iter().next() else {
            return Err(TripweaverError::resolution_unavailable(format!(
                "no usable match for '{raw_city}, {raw_country}'"
            )));
        };
        let location = identity.clone().into_location();
        let city_id = self.store.ensure_city(&location).await?;
        info!(city_id, city = %location.city, "location resolved");

        Ok(Resolution::Resolved(ResolvedCity {
            city_id,
            location,
            latitude: Some(identity.latitude),
            longitude: Some(identity.longitude),
        }))
    }

    /// Filter, canonicalize and deduplicate geocoder candidates
    ///
    /// Returned identities are sorted by confidence, best first, and unique
    /// per (country, region, base name).
    fn collect_identities(
        &self,
        raw_city: &str,
        raw_country: &str,
        candidates: Vec<GeocodeCandidate>,
    ) -> Vec<CandidateIdentity> {
        let mut identities: Vec<CandidateIdentity> = Vec::new();

        for candidate in candidates {
            if candidate.confidence < self.config.min_confidence {
                debug!(
                    "dropping low-confidence candidate '{}'",
                    candidate.formatted_address
                );
                continue;
            }
            if !is_administrative(&candidate) {
                debug!(
                    "dropping non-administrative candidate '{}'",
                    candidate.formatted_address
                );
                continue;
            }

            let city = candidate
                .city
                .clone()
                .unwrap_or_else(|| raw_city.trim().to_string());
            let country = candidate
                .country
                .clone()
                .unwrap_or_else(|| raw_country.trim().to_string());
            let base = strip_admin_suffixes(&city, &self.config.admin_suffixes);

            let identity = CandidateIdentity {
                country,
                region: candidate.region.clone(),
                city,
                base,
                display: candidate.formatted_address.clone(),
                latitude: candidate.latitude,
                longitude: candidate.longitude,
                confidence: candidate.confidence,
            };

            let duplicate = identities.iter().any(|existing| {
                existing.base == identity.base
                    && existing.country.eq_ignore_ascii_case(&identity.country)
                    && normalized_region(existing.region.as_deref())
                        == normalized_region(identity.region.as_deref())
            });
            if !duplicate {
                identities.push(identity);
            }
        }

        identities.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        identities
    }
}

impl CandidateIdentity {
    fn into_location(self) -> CanonicalLocation {
        match self.region {
            Some(region) => CanonicalLocation::with_region(self.city, region, self.country),
            None => CanonicalLocation::new(self.city, self.country),
        }
    }

    fn display_label(&self) -> String {
        if self.display.is_empty() {
            match &self.region {
                Some(region) => format!("{}, {}, {}", self.city, region, self.country),
                None => format!("{}, {}", self.city, self.country),
            }
        } else {
            self.display.clone()
        }
    }
}

/// Keep only candidates that denote an administrative unit, not a street
/// address or point of interest
fn is_administrative(candidate: &GeocodeCandidate) -> bool {
    candidate.kinds.iter().any(|kind| {
        kind == "locality"
            || kind == "sublocality"
            || kind.starts_with("administrative_area_level")
    })
}

/// Strip configured administrative suffixes from a locality name
///
/// Longest suffix wins so " metropolitan city" is removed before " city".
fn strip_admin_suffixes(name: &str, suffixes: &[String]) -> String {
    let lowered = name.trim().to_lowercase();
    let mut ordered: Vec<&String> = suffixes.iter().collect();
    ordered.sort_by_key(|suffix| std::cmp::Reverse(suffix.chars().count()));

    for suffix in ordered {
        let suffix_lowered = suffix.to_lowercase();
        if lowered.len() > suffix_lowered.len() {
            if let Some(stripped) = lowered.strip_suffix(&suffix_lowered) {
                return stripped.trim().to_string();
            }
        }
    }
    lowered
}

fn normalized_region(region: Option<&str>) -> String {
    region.unwrap_or_default().trim().to_lowercase()
}
