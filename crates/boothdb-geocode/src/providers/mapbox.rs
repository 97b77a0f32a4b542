//! Tier 2: Mapbox. Generous free tier and tolerant of venue-name queries,
//! so the venue name is prepended to the address text.

use async_trait::async_trait;
use boothdb_core::{GeocodeProviderKind, GeocodeQuery};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{
    build_client, endpoint, get_json, non_blank, parse_base_url, GeocodeProvider, RawGeocode,
    ResultPrecision,
};
use crate::error::GeocodeError;

const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: [f64; 2],
    place_name: String,
    #[serde(default)]
    relevance: f64,
    #[serde(default)]
    place_type: Vec<String>,
}

pub struct MapboxClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl MapboxClient {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        access_token: &str,
        user_agent: &str,
        timeout_secs: u64,
    ) -> Result<Self, GeocodeError> {
        Self::with_base_url(access_token, user_agent, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`GeocodeError::InvalidBaseUrl`] if `base_url` is invalid.
    pub fn with_base_url(
        access_token: &str,
        user_agent: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            access_token: access_token.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }

    fn build_url(&self, query: &GeocodeQuery) -> Result<Url, GeocodeError> {
        let mut url = endpoint(&self.base_url, "geocoding/v5/mapbox.places/")?;
        url.path_segments_mut()
            .map_err(|()| GeocodeError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(&format!("{}.json", search_text(query)));
        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token)
            .append_pair("limit", "1")
            .append_pair("types", "address,poi,place,postcode,region,country");
        Ok(url)
    }
}

/// Venue name plus the full address, unless the address already names it.
fn search_text(query: &GeocodeQuery) -> String {
    let address = query.full_address();
    match non_blank(query.name.as_ref()) {
        Some(name) if !address.to_lowercase().contains(&name.to_lowercase()) => {
            format!("{name}, {address}")
        }
        _ => address,
    }
}

#[async_trait]
impl GeocodeProvider for MapboxClient {
    fn kind(&self) -> GeocodeProviderKind {
        GeocodeProviderKind::Mapbox
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Option<RawGeocode>, GeocodeError> {
        let url = self.build_url(query)?;
        let collection: FeatureCollection = get_json(&self.client, self.kind(), url).await?;
        let Some(feature) = collection.features.into_iter().next() else {
            return Ok(None);
        };

        let precision = precision_of(&feature.place_type);
        Ok(Some(RawGeocode {
            latitude: feature.center[1],
            longitude: feature.center[0],
            display_address: feature.place_name,
            match_score: (feature.relevance * precision.base_score()).clamp(0.0, 1.0),
            precision,
        }))
    }
}

fn precision_of(place_type: &[String]) -> ResultPrecision {
    match place_type.first().map(String::as_str) {
        Some("address" | "poi") => ResultPrecision::Address,
        Some("street") => ResultPrecision::Street,
        Some("region") => ResultPrecision::Region,
        Some("country") => ResultPrecision::Country,
        _ => ResultPrecision::Locality,
    }
}
