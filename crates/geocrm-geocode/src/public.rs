//! Public, rate-limited geocoding provider (Nominatim), spread over one or
//! more hosts.
//!
//! Every call is preceded by a politeness sleep. Within a host, rate limits
//! and retryable transport faults are retried with linear back-off; any other
//! failure moves on to the next host. When every host has failed and at least
//! one of them failed at the network level, the provider reports
//! [`GeocodeError::FatalNetwork`].

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use geocrm_core::{only_digits, region_code_for, AddressComponents, GeoResult};

use crate::error::GeocodeError;
use crate::retry::retry_with_linear_backoff;

/// Pacing and retry budget applied to every public-provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicCallPolicy {
    /// Sleep before every request, retries included.
    pub politeness_delay_ms: u64,
    /// Linear back-off unit; the n-th retry waits `n × backoff_ms`.
    pub backoff_ms: u64,
    /// Attempts per host, first call included.
    pub max_attempts: u32,
}

impl Default for PublicCallPolicy {
    fn default() -> Self {
        Self {
            politeness_delay_ms: 1100,
            backoff_ms: 2000,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    address: Option<HitAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct HitAddress {
    road: Option<String>,
    house_number: Option<String>,
    suburb: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    state: Option<String>,
    #[serde(rename = "ISO3166-2-lvl4")]
    iso_region: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
}

impl HitAddress {
    fn into_components(self) -> AddressComponents {
        // "BR-AL" carries the region code; the plain state name is a fallback.
        let region = self
            .iso_region
            .as_deref()
            .and_then(|iso| iso.rsplit('-').next())
            .and_then(region_code_for)
            .or_else(|| self.state.as_deref().and_then(region_code_for))
            .map(str::to_string);
        AddressComponents {
            street: self.road,
            number: self.house_number,
            district: self.suburb,
            city: self.city.or(self.town).or(self.village).or(self.municipality),
            region,
            postal_code: self
                .postcode
                .as_deref()
                .map(only_digits)
                .filter(|d| !d.is_empty()),
            country: self.country,
        }
    }
}

fn hit_to_result(hit: SearchHit) -> Option<GeoResult> {
    let lat = hit.lat.trim().parse::<f64>().ok()?;
    let lng = hit.lon.trim().parse::<f64>().ok()?;
    Some(GeoResult {
        lat,
        lng,
        normalized: hit.address.map(HitAddress::into_components),
    })
}

/// Multi-host client for the public provider.
pub struct PublicProvider {
    client: Client,
    hosts: Vec<String>,
    country_code: String,
    policy: PublicCallPolicy,
}

impl PublicProvider {
    /// # Errors
    ///
    /// - [`GeocodeError::InvalidUrl`] if `hosts` is empty or any host is not
    ///   an absolute URL.
    /// - [`GeocodeError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        hosts: &[String],
        user_agent: &str,
        country_code: &str,
        timeout_secs: u64,
        policy: PublicCallPolicy,
    ) -> Result<Self, GeocodeError> {
        if hosts.is_empty() {
            return Err(GeocodeError::InvalidUrl {
                url: String::new(),
                reason: "no public geocoding host configured".to_string(),
            });
        }
        let hosts = hosts
            .iter()
            .map(|host| {
                Url::parse(host).map_err(|e| GeocodeError::InvalidUrl {
                    url: host.clone(),
                    reason: e.to_string(),
                })?;
                Ok(host.trim_end_matches('/').to_string())
            })
            .collect::<Result<Vec<_>, GeocodeError>>()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            hosts,
            country_code: country_code.to_lowercase(),
            policy,
        })
    }

    #[must_use]
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Searches for `query`, requesting exactly one candidate restricted to
    /// the home country. A host answering 2xx with no hits yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::FatalNetwork`] when every host failed and at least
    ///   one failure was a rate limit or transport fault.
    /// - [`GeocodeError::ProviderRejected`] when every host answered with a
    ///   non-retryable status or an unreadable body.
    pub async fn search(&self, query: &str) -> Result<Option<GeoResult>, GeocodeError> {
        let mut network_failures = 0usize;
        let mut last_error = String::new();

        for host in &self.hosts {
            let outcome = retry_with_linear_backoff(
                self.policy.max_attempts,
                self.policy.backoff_ms,
                "public_geocode",
                || self.search_once(host, query),
            )
            .await;

            match outcome {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if matches!(
                        err,
                        GeocodeError::RateLimited { .. } | GeocodeError::Http(_)
                    ) {
                        network_failures += 1;
                    }
                    tracing::warn!(
                        host = %host,
                        error = %err,
                        "public geocoder host failed, trying next"
                    );
                    last_error = format!("{host}: {err}");
                }
            }
        }

        let hosts = self.hosts.len();
        if network_failures > 0 {
            Err(GeocodeError::FatalNetwork { hosts, last_error })
        } else {
            Err(GeocodeError::ProviderRejected { hosts, last_error })
        }
    }

    async fn search_once(
        &self,
        host: &str,
        query: &str,
    ) -> Result<Option<GeoResult>, GeocodeError> {
        if self.policy.politeness_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.policy.politeness_delay_ms)).await;
        }

        let url = format!("{host}/search");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", self.country_code.as_str()),
                ("q", query),
                ("addressdetails", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(GeocodeError::RateLimited {
                host: host.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(GeocodeError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let hits: Vec<SearchHit> =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                context: url.clone(),
                source: e,
            })?;

        Ok(hits.into_iter().find_map(hit_to_result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_coordinates_are_parsed_from_strings() {
        let hit: SearchHit =
            serde_json::from_str(r#"{"lat":"-9.6658","lon":"-35.7350"}"#).unwrap();
        let result = hit_to_result(hit).unwrap();
        assert!((result.lat + 9.6658).abs() < 1e-9);
        assert!((result.lng + 35.7350).abs() < 1e-9);
        assert!(result.normalized.is_none());
    }

    #[test]
    fn unparseable_coordinates_are_skipped() {
        let hit: SearchHit = serde_json::from_str(r#"{"lat":"n/a","lon":"-35.7"}"#).unwrap();
        assert!(hit_to_result(hit).is_none());
    }

    #[test]
    fn region_comes_from_iso_subdivision() {
        let hit: SearchHit = serde_json::from_str(
            r#"{
                "lat": "-9.6", "lon": "-35.7",
                "address": {
                    "road": "Rua A", "suburb": "Centro", "town": "Maceió",
                    "state": "Alagoas", "ISO3166-2-lvl4": "BR-AL",
                    "postcode": "57000-000", "country": "Brasil"
                }
            }"#,
        )
        .unwrap();
        let normalized = hit_to_result(hit).unwrap().normalized.unwrap();
        assert_eq!(normalized.region.as_deref(), Some("AL"));
        assert_eq!(normalized.city.as_deref(), Some("Maceió"));
        assert_eq!(normalized.postal_code.as_deref(), Some("57000000"));
    }

    #[test]
    fn state_name_is_used_without_iso_code() {
        let address = HitAddress {
            state: Some("Pernambuco".to_string()),
            ..HitAddress::default()
        };
        assert_eq!(address.into_components().region.as_deref(), Some("PE"));
    }

    #[test]
    fn rejects_empty_and_malformed_hosts() {
        let policy = PublicCallPolicy::default();
        assert!(matches!(
            PublicProvider::new(&[], "ua", "br", 5, policy),
            Err(GeocodeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            PublicProvider::new(&["not a url".to_string()], "ua", "br", 5, policy),
            Err(GeocodeError::InvalidUrl { .. })
        ));
    }
}
