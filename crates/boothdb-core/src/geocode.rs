//! Geocoding request and result types shared by the cascade and its callers.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::records::CandidateRecord;

/// Address to resolve, plus whatever context helps a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodeQuery {
    pub address: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Previously known coordinate, used for distance validation.
    pub prior: Option<Coordinates>,
}

impl GeocodeQuery {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_record(record: &CandidateRecord) -> Self {
        Self {
            address: record.address.clone(),
            name: Some(record.name.clone()).filter(|n| !n.trim().is_empty()),
            city: record.city.clone(),
            state: record.state.clone(),
            country: record.country.clone(),
            prior: record.coordinates(),
        }
    }

    /// Address joined with city, state, and country, skipping blanks and
    /// parts the address already contains.
    #[must_use]
    pub fn full_address(&self) -> String {
        let lower = self.address.to_lowercase();
        let mut parts = vec![self.address.trim().to_string()];
        for part in [&self.city, &self.state, &self.country]
            .into_iter()
            .flatten()
        {
            let part = part.trim();
            if !part.is_empty() && !lower.contains(&part.to_lowercase()) {
                parts.push(part.to_string());
            }
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeConfidence {
    Low,
    Medium,
    High,
}

impl GeocodeConfidence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GeocodeConfidence::Low => "low",
            GeocodeConfidence::Medium => "medium",
            GeocodeConfidence::High => "high",
        }
    }
}

impl std::fmt::Display for GeocodeConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cascade tier resolved a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeProviderKind {
    Nominatim,
    Mapbox,
    Google,
}

impl GeocodeProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GeocodeProviderKind::Nominatim => "nominatim",
            GeocodeProviderKind::Mapbox => "mapbox",
            GeocodeProviderKind::Google => "google",
        }
    }
}

impl std::fmt::Display for GeocodeProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated output of the cascade.
///
/// `needs_review` is true whenever `confidence` is not `High`, and `High`
/// is never assigned while `validation_issues` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_address: String,
    pub provider: GeocodeProviderKind,
    pub confidence: GeocodeConfidence,
    /// Provider-reported match quality normalized to 0-1.
    pub match_score: f64,
    pub validation_issues: Vec<String>,
    pub needs_review: bool,
}

impl GeocodeResult {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}
