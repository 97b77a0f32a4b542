//! Tier 3: Google Geocoding API. Paid, and treated as ground truth when
//! the free tiers cannot resolve an address.

use async_trait::async_trait;
use boothdb_core::{GeocodeProviderKind, GeocodeQuery};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{
    build_client, endpoint, get_json, non_blank, parse_base_url, GeocodeProvider, RawGeocode,
    ResultPrecision,
};
use crate::error::GeocodeError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: Geometry,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    partial_match: bool,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    location_type: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

pub struct GoogleClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl GoogleClient {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(api_key: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, user_agent, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`GeocodeError::InvalidBaseUrl`] if `base_url` is invalid.
    pub fn with_base_url(
        api_key: &str,
        user_agent: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            api_key: api_key.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }

    fn build_url(&self, query: &GeocodeQuery) -> Result<Url, GeocodeError> {
        let mut url = endpoint(&self.base_url, "maps/api/geocode/json")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("address", &query.full_address());
            if let Some(country) = non_blank(query.country.as_ref()) {
                pairs.append_pair("components", &format!("country:{country}"));
            }
            pairs.append_pair("key", &self.api_key);
        }
        Ok(url)
    }
}

#[async_trait]
impl GeocodeProvider for GoogleClient {
    fn kind(&self) -> GeocodeProviderKind {
        GeocodeProviderKind::Google
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Option<RawGeocode>, GeocodeError> {
        let url = self.build_url(query)?;
        let response: GeocodeResponse = get_json(&self.client, self.kind(), url).await?;
        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(None),
            "OVER_QUERY_LIMIT" => {
                return Err(GeocodeError::RateLimited {
                    provider: self.kind(),
                })
            }
            other => {
                return Err(GeocodeError::Provider {
                    provider: self.kind(),
                    message: response
                        .error_message
                        .map_or_else(|| other.to_string(), |m| format!("{other}: {m}")),
                })
            }
        }
        let Some(result) = response.results.into_iter().next() else {
            return Ok(None);
        };

        let precision = precision_of(&result.geometry.location_type, &result.types);
        let mut match_score = match result.geometry.location_type.as_str() {
            "RANGE_INTERPOLATED" => 0.9,
            _ => precision.base_score(),
        };
        if result.partial_match {
            match_score -= 0.2;
        }

        Ok(Some(RawGeocode {
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
            display_address: result.formatted_address,
            match_score: match_score.clamp(0.0, 1.0),
            precision,
        }))
    }
}

fn precision_of(location_type: &str, types: &[String]) -> ResultPrecision {
    let has = |t: &str| types.iter().any(|x| x == t);
    if has("country") {
        return ResultPrecision::Country;
    }
    if has("administrative_area_level_1") {
        return ResultPrecision::Region;
    }
    match location_type {
        "ROOFTOP" | "RANGE_INTERPOLATED" => ResultPrecision::Address,
        "GEOMETRIC_CENTER" if has("route") => ResultPrecision::Street,
        "GEOMETRIC_CENTER" if has("establishment") || has("point_of_interest") => {
            ResultPrecision::Address
        }
        _ => ResultPrecision::Locality,
    }
}
