//! Reqwest-backed adapter for the Google Geocoding JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{GeocodeError, GeocodeResult, Geocoder};

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const STATUS_OK: &str = "OK";
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

pub struct GoogleGeocoder {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GoogleGeocoder {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(GeocodeError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let body = response.bytes().await.map_err(GeocodeError::Transport)?;
        parse_response(body.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponseDto {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResultDto>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResultDto {
    formatted_address: String,
    geometry: GeometryDto,
}

#[derive(Debug, Deserialize)]
struct GeometryDto {
    location: LatLngDto,
}

#[derive(Debug, Deserialize)]
struct LatLngDto {
    lat: f64,
    lng: f64,
}

fn parse_response(body: &[u8]) -> Result<Option<GeocodeResult>, GeocodeError> {
    let decoded: GeocodeResponseDto =
        serde_json::from_slice(body).map_err(|err| GeocodeError::Decode(err.to_string()))?;

    match decoded.status.as_str() {
        STATUS_OK => {}
        STATUS_ZERO_RESULTS => return Ok(None),
        _ => {
            return Err(GeocodeError::Provider {
                status: decoded.status,
            })
        }
    }

    let result = decoded.results.into_iter().next().map(|result| GeocodeResult {
        lat: result.geometry.location.lat,
        lng: result.geometry.location.lng,
        formatted_address: result.formatted_address,
    });

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_result_is_used() {
        let body = br#"{
            "status": "OK",
            "results": [
                {
                    "formatted_address": "123 Main St, Springfield, IL 62701, USA",
                    "geometry": { "location": { "lat": 39.7817, "lng": -89.6501 } }
                },
                {
                    "formatted_address": "123 Main St, Springfield, MO, USA",
                    "geometry": { "location": { "lat": 37.2, "lng": -93.3 } }
                }
            ]
        }"#;

        let result = parse_response(body).unwrap().unwrap();

        assert_eq!(result.lat, 39.7817);
        assert_eq!(result.lng, -89.6501);
        assert_eq!(
            result.formatted_address,
            "123 Main St, Springfield, IL 62701, USA"
        );
    }

    #[test]
    fn zero_results_is_no_match() {
        let body = br#"{ "status": "ZERO_RESULTS", "results": [] }"#;

        assert!(parse_response(body).unwrap().is_none());
    }

    #[test]
    fn ok_without_results_is_no_match() {
        let body = br#"{ "status": "OK" }"#;

        assert!(parse_response(body).unwrap().is_none());
    }

    #[test]
    fn provider_error_status_is_an_error() {
        let body = br#"{ "status": "OVER_QUERY_LIMIT", "error_message": "slow down" }"#;

        assert!(matches!(
            parse_response(body),
            Err(GeocodeError::Provider { status }) if status == "OVER_QUERY_LIMIT"
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            parse_response(b"<html>"),
            Err(GeocodeError::Decode(_))
        ));
    }
}
