//! Tier 1: Nominatim (OpenStreetMap). Free and strict; queried with a
//! structured address whenever a city or country is known.

use async_trait::async_trait;
use boothdb_core::{GeocodeProviderKind, GeocodeQuery};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{
    build_client, endpoint, get_json, non_blank, parse_base_url, street_line, GeocodeProvider,
    RawGeocode, ResultPrecision,
};
use crate::error::GeocodeError;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    place_rank: Option<u32>,
    #[serde(default)]
    addresstype: Option<String>,
}

pub struct NominatimClient {
    client: Client,
    base_url: Url,
}

impl NominatimClient {
    /// Creates a client pointed at the public Nominatim instance.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, GeocodeError> {
        Self::with_base_url(user_agent, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (self-hosted instance or a
    /// wiremock server).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`GeocodeError::InvalidBaseUrl`] if `base_url` is invalid.
    pub fn with_base_url(
        user_agent: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    fn build_url(&self, query: &GeocodeQuery) -> Result<Url, GeocodeError> {
        let mut url = endpoint(&self.base_url, "search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("format", "jsonv2");
            pairs.append_pair("limit", "1");
            let city = non_blank(query.city.as_ref());
            let country = non_blank(query.country.as_ref());
            if city.is_some() || country.is_some() {
                pairs.append_pair("street", street_line(&query.address));
                if let Some(city) = city {
                    pairs.append_pair("city", city);
                }
                if let Some(state) = non_blank(query.state.as_ref()) {
                    pairs.append_pair("state", state);
                }
                if let Some(country) = country {
                    pairs.append_pair("country", country);
                }
            } else {
                pairs.append_pair("q", &query.full_address());
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    fn kind(&self) -> GeocodeProviderKind {
        GeocodeProviderKind::Nominatim
    }

    async fn lookup(&self, query: &GeocodeQuery) -> Result<Option<RawGeocode>, GeocodeError> {
        let url = self.build_url(query)?;
        let places: Vec<NominatimPlace> = get_json(&self.client, self.kind(), url).await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let parse = |raw: &str, axis: &str| {
            raw.parse::<f64>().map_err(|e| GeocodeError::Provider {
                provider: GeocodeProviderKind::Nominatim,
                message: format!("invalid {axis} '{raw}': {e}"),
            })
        };
        let latitude = parse(&place.lat, "latitude")?;
        let longitude = parse(&place.lon, "longitude")?;
        let precision = precision_of(place.place_rank, place.addresstype.as_deref());

        Ok(Some(RawGeocode {
            latitude,
            longitude,
            display_address: place.display_name,
            match_score: precision.base_score(),
            precision,
        }))
    }
}

/// Nominatim place ranks: 4 country, 5-12 region, 13-25 city and
/// suburb, 26-29 street, 30 building or POI.
fn precision_of(place_rank: Option<u32>, addresstype: Option<&str>) -> ResultPrecision {
    match place_rank {
        Some(rank) if rank >= 30 => ResultPrecision::Address,
        Some(26..=29) => ResultPrecision::Street,
        Some(13..=25) => ResultPrecision::Locality,
        Some(5..=12) => ResultPrecision::Region,
        Some(_) => ResultPrecision::Country,
        None => match addresstype {
            Some("country") => ResultPrecision::Country,
            Some("state" | "region" | "province") => ResultPrecision::Region,
            Some("city" | "town" | "village" | "suburb" | "postcode" | "municipality") => {
                ResultPrecision::Locality
            }
            Some("road") => ResultPrecision::Street,
            _ => ResultPrecision::Address,
        },
    }
}
