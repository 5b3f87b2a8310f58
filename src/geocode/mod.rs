use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod google;

pub use cache::{GeocodeCache, GeocodeLimits};
pub use google::GoogleGeocoder;

#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeResult {
    pub lat: f64,
    pub lng: f64,
    pub formatted_address: String,
}

impl GeocodeResult {
    pub fn location(&self) -> Location {
        Location {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Failures talking to a geocoding provider. These never reach API callers;
/// the cache logs them and reports no location.
#[derive(Debug)]
pub enum GeocodeError {
    Transport(reqwest::Error),
    Status(reqwest::StatusCode),
    Provider { status: String },
    Decode(String),
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            GeocodeError::Transport(err) => write!(f, "geocoding request failed: {err}"),
            GeocodeError::Status(status) => write!(f, "geocoding provider responded {status}"),
            GeocodeError::Provider { status } => {
                write!(f, "geocoding provider reported status {status}")
            }
            GeocodeError::Decode(message) => {
                write!(f, "geocoding response could not be decoded: {message}")
            }
        }
    }
}

impl std::error::Error for GeocodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeocodeError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves a free-form address. `Ok(None)` means the provider had no
    /// match.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, GeocodeError>;
}

/// Used when no provider is configured. Every address is unresolvable.
#[derive(Copy, Clone, Debug, Default)]
pub struct DisabledGeocoder;

#[async_trait]
impl Geocoder for DisabledGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        Ok(None)
    }
}
