use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::contractor::StaticTokenAuthenticator;
use crate::error::Error;
use crate::geocode::google::DEFAULT_ENDPOINT;
use crate::geocode::{DisabledGeocoder, GeocodeLimits, Geocoder, GoogleGeocoder};
use crate::lead::dedup::DedupPolicy;

/// Server configuration. Every option can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "leadgen_server", about = "Contractor lead generation API")]
pub struct Config {
    #[arg(long, default_value = "mongodb://localhost:27017", env = "MONGODB_URI")]
    pub mongodb_uri: String,

    #[arg(long, default_value = "leadgen", env = "DATABASE_NAME")]
    pub database_name: String,

    #[arg(long, default_value = "127.0.0.1:8080", env = "BIND_ADDRESS")]
    pub bind_address: String,

    /// Accepted bearer tokens as `token=contractor-id` pairs, comma separated
    #[arg(long, default_value = "", env = "AUTH_TOKENS", hide_env_values = true)]
    pub auth_tokens: String,

    /// Without a key addresses are never geocoded
    #[arg(long, env = "GEOCODING_API_KEY", hide_env_values = true)]
    pub geocoding_api_key: Option<String>,

    #[arg(long, default_value = DEFAULT_ENDPOINT, env = "GEOCODING_ENDPOINT")]
    pub geocoding_endpoint: Url,

    #[arg(long, default_value_t = 10, env = "GEOCODING_TIMEOUT_SECS")]
    pub geocoding_timeout_secs: u64,

    #[arg(long, default_value_t = 4, env = "GEOCODE_MAX_CONCURRENT")]
    pub geocode_max_concurrent: usize,

    /// Pause after each provider call before its slot is released
    #[arg(long, default_value_t = 100, env = "GEOCODE_REQUEST_SPACING_MS")]
    pub geocode_request_spacing_ms: u64,

    /// Between one minute and one year
    #[arg(
        long,
        default_value_t = 60,
        env = "LEAD_DEDUP_WINDOW_MINUTES",
        value_parser = clap::value_parser!(i64).range(1..=525_600)
    )]
    pub lead_dedup_window_minutes: i64,

    /// Between one hour and one year
    #[arg(
        long,
        default_value_t = 24,
        env = "MARKETING_DEDUP_WINDOW_HOURS",
        value_parser = clap::value_parser!(i64).range(1..=8_760)
    )]
    pub marketing_dedup_window_hours: i64,

    /// Drop the database and fill it with demo data before serving
    #[arg(long, default_value_t = false)]
    pub seed: bool,
}

impl Config {
    pub fn dedup_policy(&self) -> DedupPolicy {
        DedupPolicy {
            lead_window: chrono::Duration::minutes(self.lead_dedup_window_minutes),
            marketing_window: chrono::Duration::hours(self.marketing_dedup_window_hours),
        }
    }

    pub fn geocode_limits(&self) -> GeocodeLimits {
        GeocodeLimits {
            max_concurrent: self.geocode_max_concurrent,
            request_spacing: Duration::from_millis(self.geocode_request_spacing_ms),
        }
    }

    pub fn authenticator(&self) -> StaticTokenAuthenticator {
        StaticTokenAuthenticator::parse(&self.auth_tokens)
    }

    pub fn geocoder(&self) -> Result<Arc<dyn Geocoder>, Error> {
        let api_key = match self.geocoding_api_key.as_deref().map(str::trim) {
            Some(api_key) if !api_key.is_empty() => api_key.to_string(),
            _ => return Ok(Arc::new(DisabledGeocoder)),
        };

        let geocoder = GoogleGeocoder::new(
            self.geocoding_endpoint.clone(),
            api_key,
            Duration::from_secs(self.geocoding_timeout_secs),
        )
        .map_err(|err| IoError::new(ErrorKind::Other, err))?;

        Ok(Arc::new(geocoder))
    }
}
