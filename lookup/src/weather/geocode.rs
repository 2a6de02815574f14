use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{Coordinates, Geocoder};
use crate::http::send_json;
use crate::outcome::LookupOutcome;

pub const DEFAULT_GEOCODE_BASE: &str = "https://maps.googleapis.com/maps/api/geocode";
pub const DEFAULT_REGION: &str = "alaska";

/// Geocoding API payload; only the fields read here are modelled
#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl GeocodeResponse {
    /// First result's location, or `NotFound` on a non-OK status or empty result set
    pub fn into_outcome(self) -> LookupOutcome<Coordinates> {
        if self.status != "OK" {
            return LookupOutcome::NotFound;
        }
        match self.results.into_iter().next() {
            Some(result) => LookupOutcome::Found(Coordinates {
                lat: result.geometry.location.lat,
                lon: result.geometry.location.lng,
            }),
            None => LookupOutcome::NotFound,
        }
    }
}

/// Google Maps geocoder restricted to a fixed region suffix
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
    region: String,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            region: DEFAULT_REGION.to_string(),
            base_url: DEFAULT_GEOCODE_BASE.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Address string sent upstream for `city`
    pub fn address_for(&self, city: &str) -> String {
        format!("{}, {}", city, self.region)
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn resolve(&self, city: &str) -> LookupOutcome<Coordinates> {
        let address = self.address_for(city);
        let request = self
            .client
            .get(format!("{}/json", self.base_url))
            .query(&[("address", address.as_str()), ("key", self.api_key.as_str())]);

        match send_json::<GeocodeResponse>(request).await {
            Ok(body) => {
                let status = body.status.clone();
                let outcome = body.into_outcome();
                if !outcome.is_found() {
                    warn!(%address, %status, "Could not find coordinates");
                }
                outcome
            }
            Err(e) => {
                warn!(%address, error = %e, "Geocoding API call failed");
                LookupOutcome::Unavailable(e)
            }
        }
    }
}
