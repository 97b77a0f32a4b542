//! The tiered geocoding cascade.
//!
//! Providers run strictly in order. A tier that errors, finds nothing, or
//! fails the quality check hands over to the next tier. A result scored
//! `low` is held and only returned when no later tier does better.

use async_trait::async_trait;
use boothdb_core::{
    AppConfig, GeocodeConfidence, GeocodeLookup, GeocodeProviderKind, GeocodeQuery, GeocodeResult,
};

use crate::error::GeocodeError;
use crate::providers::{GeocodeProvider, GoogleClient, MapboxClient, NominatimClient};
use crate::retry::retry_with_backoff;
use crate::validation::{check_completeness, check_quality, score, IncompleteAddress};

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// What happened at one tier.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Accepted(GeocodeConfidence),
    HeldAsFallback,
    NoResult,
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierAttempt {
    pub provider: GeocodeProviderKind,
    pub outcome: TierOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    pub result: Option<GeocodeResult>,
    /// Set when the address failed the completeness check and no tier ran.
    pub input_rejected: Option<IncompleteAddress>,
    pub attempts: Vec<TierAttempt>,
}

pub struct GeocodeCascade {
    providers: Vec<Box<dyn GeocodeProvider>>,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl GeocodeCascade {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn GeocodeProvider>>) -> Self {
        Self {
            providers,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Builds the cascade from application config. Nominatim is always
    /// tier 1; Mapbox and Google are added only when their keys are set.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if a provider client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, GeocodeError> {
        let agent = config.geocode_user_agent.as_str();
        let timeout = config.geocode_timeout_secs;

        let mut providers: Vec<Box<dyn GeocodeProvider>> = vec![Box::new(
            NominatimClient::with_base_url(agent, timeout, &config.nominatim_url)?,
        )];
        if let Some(token) = &config.mapbox_access_token {
            providers.push(Box::new(MapboxClient::new(token, agent, timeout)?));
        }
        if let Some(key) = &config.google_maps_api_key {
            providers.push(Box::new(GoogleClient::new(key, agent, timeout)?));
        }

        Ok(Self::new(providers)
            .with_retry(config.geocode_max_retries, config.geocode_backoff_base_ms))
    }

    #[must_use]
    pub fn tiers(&self) -> Vec<GeocodeProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    /// Runs the cascade and reports every tier attempted.
    pub async fn resolve(&self, query: &GeocodeQuery) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();

        let completeness = match check_completeness(query) {
            Ok(c) => c,
            Err(reason) => {
                tracing::debug!(address = %query.address, %reason, "address refused before geocoding");
                outcome.input_rejected = Some(reason);
                return outcome;
            }
        };

        let mut held: Option<GeocodeResult> = None;
        for provider in &self.providers {
            let kind = provider.kind();
            let lookup = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                provider.lookup(query)
            })
            .await;

            let tier_outcome = match lookup {
                Err(e) => {
                    tracing::warn!(provider = %kind, error = %e, "geocoding tier failed");
                    TierOutcome::Failed(e.to_string())
                }
                Ok(None) => {
                    tracing::debug!(provider = %kind, address = %query.address, "no geocoding result");
                    TierOutcome::NoResult
                }
                Ok(Some(raw)) => match check_quality(&raw) {
                    Err(reason) => {
                        tracing::debug!(provider = %kind, %reason, "geocoding result rejected");
                        TierOutcome::Rejected(reason)
                    }
                    Ok(()) => {
                        let result = score(kind, raw, completeness, query.prior);
                        if result.confidence >= GeocodeConfidence::Medium {
                            tracing::debug!(
                                provider = %kind,
                                confidence = %result.confidence,
                                "geocoding result accepted"
                            );
                            outcome.attempts.push(TierAttempt {
                                provider: kind,
                                outcome: TierOutcome::Accepted(result.confidence),
                            });
                            outcome.result = Some(result);
                            return outcome;
                        }
                        if held.is_none() {
                            held = Some(result);
                        }
                        TierOutcome::HeldAsFallback
                    }
                },
            };
            outcome.attempts.push(TierAttempt {
                provider: kind,
                outcome: tier_outcome,
            });
        }

        if held.is_none() {
            tracing::info!(address = %query.address, "could not geocode address");
        }
        outcome.result = held;
        outcome
    }
}

#[async_trait]
impl GeocodeLookup for GeocodeCascade {
    async fn geocode(&self, query: &GeocodeQuery) -> Option<GeocodeResult> {
        self.resolve(query).await.result
    }
}
