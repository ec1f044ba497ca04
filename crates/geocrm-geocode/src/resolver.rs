//! Tiered address resolution.
//!
//! Order of attempts, stopping at the first coordinate pair:
//!
//! 1. postal registry → canonical address for the postal code
//! 2. keyed provider with that address (when configured)
//! 3. public provider with that address
//! 4. public provider with the caller's raw text
//!
//! "Nothing found" at any tier falls through to the next one. Only
//! [`GeocodeError::FatalNetwork`] from the public provider and postal
//! registry failures leave this module as errors.

use async_trait::async_trait;

use geocrm_core::{
    build_canonical_address, collapse_whitespace, only_digits, AddressComponents, AppConfig,
    GeoResult,
};

use crate::error::GeocodeError;
use crate::postal::{PostalClient, PostalFragment, PostalLookup, POSTAL_CODE_LEN};
use crate::precise::PreciseProvider;
use crate::public::{PublicCallPolicy, PublicProvider};

/// Raw addresses shorter than this are not worth a last-resort query.
pub const MIN_RAW_ADDRESS_LEN: usize = 10;

/// Anything that can turn an address into coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves `address`, optionally anchored by `postal_code`.
    ///
    /// `Ok(None)` means no provider found the address.
    async fn resolve(
        &self,
        address: &str,
        postal_code: Option<&str>,
    ) -> Result<Option<GeoResult>, GeocodeError>;
}

pub struct GeocodeResolver {
    postal: PostalClient,
    precise: Option<PreciseProvider>,
    public: PublicProvider,
}

impl GeocodeResolver {
    #[must_use]
    pub fn new(
        postal: PostalClient,
        precise: Option<PreciseProvider>,
        public: PublicProvider,
    ) -> Self {
        Self {
            postal,
            precise,
            public,
        }
    }

    /// Builds every client from the application configuration. The keyed
    /// provider is only enabled when an API key is present.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] or [`GeocodeError::InvalidUrl`] if a
    /// client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, GeocodeError> {
        let postal = PostalClient::new(
            &config.viacep_url,
            config.http_timeout_secs,
            &config.nominatim_user_agent,
            config.postal_max_attempts,
            config.postal_backoff_ms,
        )?;
        let precise = config
            .google_api_key
            .as_deref()
            .map(|key| {
                PreciseProvider::new(&config.google_geocode_url, key, config.http_timeout_secs)
            })
            .transpose()?;
        let public = PublicProvider::new(
            &config.nominatim_hosts,
            &config.nominatim_user_agent,
            &config.country_code,
            config.http_timeout_secs,
            PublicCallPolicy {
                politeness_delay_ms: config.geocode_delay_ms,
                backoff_ms: config.geocode_backoff_ms,
                max_attempts: config.geocode_max_attempts,
            },
        )?;
        Ok(Self::new(postal, precise, public))
    }

    async fn postal_address(
        &self,
        postal_code: Option<&str>,
    ) -> Result<Option<(String, AddressComponents)>, GeocodeError> {
        let Some(digits) = postal_code
            .map(only_digits)
            .filter(|d| d.len() == POSTAL_CODE_LEN)
        else {
            return Ok(None);
        };

        match self.postal.lookup(&digits).await {
            Ok(PostalLookup::Found(fragment)) => Ok(canonical_from_fragment(&fragment, &digits)),
            Ok(PostalLookup::NotFound) => {
                tracing::debug!(postal_code = %digits, "postal code not found in registry");
                Ok(None)
            }
            Err(source) => Err(GeocodeError::Postal {
                postal_code: digits,
                source: Box::new(source),
            }),
        }
    }

    /// Public search where only the fatal condition is an error.
    async fn public_search(&self, query: &str) -> Result<Option<GeoResult>, GeocodeError> {
        match self.public.search(query).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::warn!(query, error = %e, "public geocoder gave no usable answer");
                Ok(None)
            }
        }
    }
}

fn canonical_from_fragment(
    fragment: &PostalFragment,
    digits: &str,
) -> Option<(String, AddressComponents)> {
    let components = fragment.to_components(digits);
    build_canonical_address(&components).map(|address| (address, components))
}

/// Fills fields the provider left empty with the postal registry's values.
fn merge_postal_fields(mut result: GeoResult, postal: Option<&AddressComponents>) -> GeoResult {
    let Some(postal) = postal else {
        return result;
    };
    let normalized = result.normalized.get_or_insert_with(AddressComponents::default);
    let fill = |slot: &mut Option<String>, value: &Option<String>| {
        if slot.as_deref().is_none_or(str::is_empty) {
            slot.clone_from(value);
        }
    };
    fill(&mut normalized.street, &postal.street);
    fill(&mut normalized.district, &postal.district);
    fill(&mut normalized.city, &postal.city);
    fill(&mut normalized.region, &postal.region);
    fill(&mut normalized.postal_code, &postal.postal_code);
    fill(&mut normalized.country, &postal.country);
    result
}

#[async_trait]
impl Geocoder for GeocodeResolver {
    async fn resolve(
        &self,
        address: &str,
        postal_code: Option<&str>,
    ) -> Result<Option<GeoResult>, GeocodeError> {
        let postal = self.postal_address(postal_code).await?;
        let postal_components = postal.as_ref().map(|(_, components)| components);

        if let Some((canonical, _)) = &postal {
            if let Some(precise) = &self.precise {
                match precise.geocode(canonical).await {
                    Ok(Some(found)) => {
                        tracing::debug!(address = %canonical, "resolved by keyed provider");
                        return Ok(Some(merge_postal_fields(found, postal_components)));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(address = %canonical, error = %e, "keyed provider failed");
                    }
                }
            }

            if let Some(found) = self.public_search(canonical).await? {
                tracing::debug!(address = %canonical, "resolved by public provider");
                return Ok(Some(merge_postal_fields(found, postal_components)));
            }
        }

        let raw = collapse_whitespace(address);
        let already_tried = postal.as_ref().is_some_and(|(canonical, _)| *canonical == raw);
        if raw.chars().count() >= MIN_RAW_ADDRESS_LEN && !already_tried {
            if let Some(found) = self.public_search(&raw).await? {
                tracing::debug!(address = %raw, "resolved by public provider from raw text");
                return Ok(Some(merge_postal_fields(found, postal_components)));
            }
        }

        tracing::info!(address = %raw, "address could not be geocoded");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postal_components() -> AddressComponents {
        AddressComponents {
            street: Some("Rua A".to_string()),
            number: None,
            district: Some("Centro".to_string()),
            city: Some("Maceió".to_string()),
            region: Some("AL".to_string()),
            postal_code: Some("57000000".to_string()),
            country: Some("Brasil".to_string()),
        }
    }

    #[test]
    fn merge_keeps_provider_values_and_fills_gaps() {
        let result = GeoResult {
            lat: 1.0,
            lng: 2.0,
            normalized: Some(AddressComponents {
                city: Some("Maceio".to_string()),
                region: Some(String::new()),
                ..AddressComponents::default()
            }),
        };
        let merged = merge_postal_fields(result, Some(&postal_components()));
        let normalized = merged.normalized.unwrap();
        assert_eq!(normalized.city.as_deref(), Some("Maceio"));
        assert_eq!(normalized.region.as_deref(), Some("AL"));
        assert_eq!(normalized.postal_code.as_deref(), Some("57000000"));
    }

    #[test]
    fn merge_without_postal_data_is_identity() {
        let result = GeoResult {
            lat: 1.0,
            lng: 2.0,
            normalized: None,
        };
        assert_eq!(merge_postal_fields(result.clone(), None), result);
    }

    #[test]
    fn canonical_from_fragment_uses_home_country() {
        let fragment = PostalFragment {
            street: None,
            district: None,
            city: Some("Maceió".to_string()),
            region_code: Some("AL".to_string()),
        };
        let (address, components) = canonical_from_fragment(&fragment, "57000000").unwrap();
        assert_eq!(address, "Maceió, AL, 57000000, Brasil");
        assert_eq!(components.country.as_deref(), Some("Brasil"));
    }
}
