//! Optional keyed geocoding provider (Google Geocoding API).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use geocrm_core::{region_code_for, AddressComponents, GeoResult};

use crate::error::GeocodeError;

const PROVIDER: &str = "google";

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
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
    }

    fn normalized(&self) -> AddressComponents {
        let long = |kind: &str| self.component(kind).map(|c| c.long_name.clone());
        AddressComponents {
            street: long("route"),
            number: long("street_number"),
            district: long("sublocality").or_else(|| long("sublocality_level_1")),
            city: long("locality").or_else(|| long("administrative_area_level_2")),
            region: self
                .component("administrative_area_level_1")
                .and_then(|c| {
                    region_code_for(&c.short_name).or_else(|| region_code_for(&c.long_name))
                })
                .map(str::to_string),
            postal_code: self
                .component("postal_code")
                .map(|c| geocrm_core::only_digits(&c.long_name))
                .filter(|d| !d.is_empty()),
            country: long("country"),
        }
    }
}

/// Client for the keyed provider. Only the first result is used.
pub struct PreciseProvider {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl PreciseProvider {
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_owned(),
        })
    }

    /// Geocodes `address`. `ZERO_RESULTS` resolves to `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::Http`] on transport failure.
    /// - [`GeocodeError::UnexpectedStatus`] on a non-2xx HTTP status.
    /// - [`GeocodeError::ProviderStatus`] when the API reports anything other
    ///   than `OK` or `ZERO_RESULTS` (quota, denied key, invalid request).
    /// - [`GeocodeError::Deserialize`] if the body does not match.
    pub async fn geocode(&self, address: &str) -> Result<Option<GeoResult>, GeocodeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body = response.text().await?;
        let parsed: GeocodeResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                context: format!("{PROVIDER} geocode"),
                source: e,
            })?;

        match parsed.status.as_str() {
            "OK" => Ok(parsed.results.first().map(|first| GeoResult {
                lat: first.geometry.location.lat,
                lng: first.geometry.location.lng,
                normalized: Some(first.normalized()),
            })),
            "ZERO_RESULTS" => Ok(None),
            other => Err(GeocodeError::ProviderStatus {
                provider: PROVIDER,
                status: match parsed.error_message {
                    Some(msg) => format!("{other}: {msg}"),
                    None => other.to_string(),
                },
            }),
        }
    }
}
