//! Tiered geocoding: provider clients, result validation, and the cascade
//! that ties them together behind [`boothdb_core::GeocodeLookup`].

pub mod cascade;
pub mod error;
pub mod providers;
pub(crate) mod retry;
pub mod validation;

pub use cascade::{CascadeOutcome, GeocodeCascade, TierAttempt, TierOutcome};
pub use error::GeocodeError;
pub use providers::{
    GeocodeProvider, GoogleClient, MapboxClient, NominatimClient, RawGeocode, ResultPrecision,
};
pub use validation::IncompleteAddress;
