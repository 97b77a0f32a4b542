//! Provider clients, one per cascade tier.
//!
//! Each client wraps `reqwest`, builds its provider's request from a
//! [`GeocodeQuery`], and reduces the first result to a [`RawGeocode`]. Zero
//! results is `Ok(None)`, not an error. Use `with_base_url` constructors to
//! point a client at a mock server in tests.

mod google;
mod mapbox;
mod nominatim;

use std::time::Duration;

use async_trait::async_trait;
use boothdb_core::{GeocodeProviderKind, GeocodeQuery};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::GeocodeError;

pub use google::GoogleClient;
pub use mapbox::MapboxClient;
pub use nominatim::NominatimClient;

/// How precisely a provider located the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPrecision {
    /// Building, house number, or named point of interest.
    Address,
    Street,
    /// City, postcode, or neighbourhood centroid.
    Locality,
    Region,
    Country,
}

impl ResultPrecision {
    /// Baseline match score for a result at this precision.
    #[must_use]
    pub fn base_score(self) -> f64 {
        match self {
            ResultPrecision::Address => 1.0,
            ResultPrecision::Street => 0.75,
            ResultPrecision::Locality => 0.45,
            ResultPrecision::Region => 0.15,
            ResultPrecision::Country => 0.0,
        }
    }
}

/// A provider's best result before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGeocode {
    pub latitude: f64,
    pub longitude: f64,
    pub display_address: String,
    /// Provider match quality normalized to 0-1.
    pub match_score: f64,
    pub precision: ResultPrecision,
}

#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn kind(&self) -> GeocodeProviderKind;

    /// Look up the query. `Ok(None)` means the provider found nothing.
    async fn lookup(&self, query: &GeocodeQuery) -> Result<Option<RawGeocode>, GeocodeError>;
}

fn build_client(user_agent: &str, timeout_secs: u64) -> Result<Client, GeocodeError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

/// Parse a base URL, normalised to end in exactly one slash so that
/// [`Url::join`] appends to it rather than replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, GeocodeError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| GeocodeError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn endpoint(base: &Url, path: &str) -> Result<Url, GeocodeError> {
    base.join(path).map_err(|e| GeocodeError::InvalidBaseUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// GET `url` and decode the JSON body.
///
/// HTTP 429 maps to [`GeocodeError::RateLimited`]. Request URLs carry API
/// keys, so they are stripped from errors and only the path is used as
/// deserialization context.
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: GeocodeProviderKind,
    url: Url,
) -> Result<T, GeocodeError> {
    let context = format!("{provider} {}", url.path());
    let response = client
        .get(url)
        .send()
        .await
        .map_err(reqwest::Error::without_url)?;
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited { provider });
    }
    let response = response
        .error_for_status()
        .map_err(reqwest::Error::without_url)?;
    let body = response.text().await.map_err(reqwest::Error::without_url)?;
    serde_json::from_str(&body).map_err(|source| GeocodeError::Deserialize { context, source })
}

/// First comma-separated part of an address, the street line.
fn street_line(address: &str) -> &str {
    address.split(',').next().unwrap_or(address).trim()
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}
