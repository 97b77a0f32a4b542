//! Candidate booth records produced by extractors.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::similarity::normalize_text;

/// Operational status reported for a booth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoothStatus {
    Active,
    Inactive,
    Unverified,
    Closed,
}

impl BoothStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BoothStatus::Active => "active",
            BoothStatus::Inactive => "inactive",
            BoothStatus::Unverified => "unverified",
            BoothStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for BoothStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BoothStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "operational" | "working" => Ok(BoothStatus::Active),
            "inactive" | "broken" | "out_of_order" => Ok(BoothStatus::Inactive),
            "unverified" | "unknown" => Ok(BoothStatus::Unverified),
            "closed" | "removed" => Ok(BoothStatus::Closed),
            other => Err(format!("unknown booth status '{other}'")),
        }
    }
}

/// A provisional venue entity extracted from one page.
///
/// `name` and `address` are required; see [`CandidateRecord::is_valid`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    pub name: String,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub machine_model: Option<String>,
    pub machine_manufacturer: Option<String>,
    /// Analog (chemical) or digital.
    pub booth_type: Option<String>,
    /// Strip format, e.g. "4-strip black & white".
    pub photo_type: Option<String>,
    pub status: Option<BoothStatus>,
    pub accepts_cash: Option<bool>,
    pub accepts_card: Option<bool>,
    pub cost: Option<String>,
    pub hours: Option<String>,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Provenance: the slug of the source that produced this record.
    pub source_name: String,
    pub source_url: String,
}

impl CandidateRecord {
    /// A record is valid only when both `name` and `address` are non-blank.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.address.trim().is_empty()
    }

    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    pub fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = Some(coordinates.latitude);
        self.longitude = Some(coordinates.longitude);
    }

    /// Country in canonical form, see [`canonical_country`].
    #[must_use]
    pub fn canonical_country(&self) -> Option<String> {
        self.country.as_deref().and_then(canonical_country)
    }

    /// Trim every string, collapse inner whitespace, drop blank optionals,
    /// keep only http(s) photo URLs (deduplicated, order preserved), and
    /// discard coordinates that are not plausible.
    ///
    /// Returns `None` when the record lacks a name or address afterwards.
    #[must_use]
    pub fn sanitized(mut self) -> Option<Self> {
        self.name = collapse_whitespace(&self.name);
        self.address = collapse_whitespace(&self.address);
        for field in [
            &mut self.city,
            &mut self.state,
            &mut self.country,
            &mut self.postal_code,
            &mut self.machine_model,
            &mut self.machine_manufacturer,
            &mut self.booth_type,
            &mut self.photo_type,
            &mut self.cost,
            &mut self.hours,
            &mut self.phone,
            &mut self.website,
        ] {
            *field = field
                .take()
                .map(|v| collapse_whitespace(&v))
                .filter(|v| !v.is_empty());
        }
        self.description = self
            .description
            .take()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut seen = std::collections::HashSet::new();
        self.photos = std::mem::take(&mut self.photos)
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| p.starts_with("http://") || p.starts_with("https://"))
            .filter(|p| seen.insert(p.clone()))
            .collect();

        if !self.coordinates().is_some_and(|c| c.is_plausible()) {
            self.latitude = None;
            self.longitude = None;
        }

        self.is_valid().then_some(self)
    }

    /// Stable catalog key.
    ///
    /// SHA-256 over normalized `name || address || city || country`,
    /// hex-encoded. Two records describing the same booth with cosmetic
    /// differences (case, punctuation) share a key.
    #[must_use]
    pub fn booth_key(&self) -> String {
        use sha2::{Digest, Sha256};
        let input = format!(
            "{}\x00{}\x00{}\x00{}",
            normalize_text(&self.name),
            normalize_text(&self.address),
            normalize_text(self.city.as_deref().unwrap_or("")),
            self.canonical_country().unwrap_or_default(),
        );
        format!("{:x}", Sha256::digest(input.as_bytes()))
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map common country spellings to one canonical form.
///
/// Known aliases map to ISO-style codes (`US`, `GB`, `DE`, ...). Anything
/// else is returned normalized (lowercase, punctuation stripped) so two
/// spellings of an unknown country still compare equal when identical.
#[must_use]
pub fn canonical_country(raw: &str) -> Option<String> {
    let normalized = normalize_text(raw).replace(' ', "");
    if normalized.is_empty() {
        return None;
    }
    let code = match normalized.as_str() {
        "us" | "usa" | "unitedstates" | "unitedstatesofamerica" | "america" => "US",
        "uk" | "gb" | "unitedkingdom" | "greatbritain" | "england" | "scotland" | "wales" => "GB",
        "de" | "germany" | "deutschland" => "DE",
        "fr" | "france" => "FR",
        "ca" | "canada" => "CA",
        "au" | "australia" => "AU",
        "it" | "italy" | "italia" => "IT",
        "es" | "spain" | "espana" | "españa" => "ES",
        "nl" | "netherlands" | "thenetherlands" | "holland" => "NL",
        "at" | "austria" | "österreich" | "osterreich" => "AT",
        "jp" | "japan" => "JP",
        _ => return Some(normalized),
    };
    Some(code.to_string())
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;
