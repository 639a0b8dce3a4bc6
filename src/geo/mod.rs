//! Coordinates and region for a listing.

use crate::models::Listing;
use crate::regions::DistrictResolver;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Appended to every geocoding query
pub const DEFAULT_LOCALITY: &str = "Belo Horizonte - MG";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Address → candidate coordinates, best match first
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinates>>;
}

/// Google Geocoding API client
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
}

impl GoogleGeocoder {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create geocoding client")?;

        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Vec<Coordinates>> {
        let response: GeocodeResponse = self
            .client
            .get(GOOGLE_GEOCODE_URL)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to call geocoding API")?
            .error_for_status()?
            .json()
            .await
            .context("Failed to decode geocoding response")?;

        match response.status.as_str() {
            "OK" => Ok(response.results.into_iter().map(|r| r.geometry.location).collect()),
            "ZERO_RESULTS" => Ok(Vec::new()),
            status => anyhow::bail!(
                "geocoding failed with {}: {}",
                status,
                response.error_message.unwrap_or_default()
            ),
        }
    }
}

/// Fills the derived fields of a listing: region from the district name and
/// coordinates from one geocoding call. Lookups that fail or find nothing
/// leave the fields empty.
pub struct GeoEnricher<'a> {
    geocoder: &'a dyn Geocoder,
    resolver: &'a DistrictResolver,
    locality: String,
}

impl<'a> GeoEnricher<'a> {
    pub fn new(geocoder: &'a dyn Geocoder, resolver: &'a DistrictResolver) -> Self {
        Self {
            geocoder,
            resolver,
            locality: DEFAULT_LOCALITY.to_string(),
        }
    }

    pub async fn enrich(&self, listing: &mut Listing) {
        listing.regional = listing
            .district
            .as_deref()
            .and_then(|d| self.resolver.resolve(d))
            .map(str::to_string);

        let Some(query) = self.query_for(listing) else {
            debug!(url = %listing.listing_url, "No address or district to geocode");
            return;
        };

        match self.geocoder.geocode(&query).await {
            Ok(results) => match results.first() {
                Some(coords) => {
                    listing.latitude = Some(coords.lat);
                    listing.longitude = Some(coords.lng);
                }
                None => warn!(%query, "Geocoding returned no results"),
            },
            Err(e) => warn!(%query, "Geocoding failed: {:#}", e),
        }
    }

    fn query_for(&self, listing: &Listing) -> Option<String> {
        let parts: Vec<&str> = [listing.address.as_deref(), listing.district.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            return None;
        }

        let mut query = parts.join(", ");
        if !self.locality.is_empty() {
            query.push_str(", ");
            query.push_str(&self.locality);
        }
        Some(query)
    }
}
