//! Client for the national postal registry (`ViaCEP`).
//!
//! Resolves an 8-digit CEP to street, district, city and region. Transient
//! faults are retried with a short linear back-off; everything else surfaces
//! to the caller and only affects the address being resolved.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use geocrm_core::{only_digits, region_code_for, AddressComponents, HOME_COUNTRY_NAME};

use crate::error::GeocodeError;
use crate::retry::retry_with_linear_backoff;

/// Number of digits in a Brazilian postal code.
pub const POSTAL_CODE_LEN: usize = 8;

/// Structured address fragment returned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostalFragment {
    pub street: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub region_code: Option<String>,
}

impl PostalFragment {
    /// Address components for this fragment, with the postal code and the
    /// home country filled in.
    #[must_use]
    pub fn to_components(&self, postal_code: &str) -> AddressComponents {
        AddressComponents {
            street: self.street.clone(),
            number: None,
            district: self.district.clone(),
            city: self.city.clone(),
            region: self.region_code.clone(),
            postal_code: Some(postal_code.to_string()),
            country: Some(HOME_COUNTRY_NAME.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostalLookup {
    Found(PostalFragment),
    NotFound,
}

#[derive(Debug, Deserialize)]
struct ViaCepResponse {
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
    /// `true` (or `"true"`) when the CEP does not exist.
    erro: Option<serde_json::Value>,
}

impl ViaCepResponse {
    fn is_not_found(&self) -> bool {
        match &self.erro {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    fn into_fragment(self) -> PostalFragment {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        PostalFragment {
            street: clean(self.logradouro),
            district: clean(self.bairro),
            city: clean(self.localidade),
            region_code: self
                .uf
                .as_deref()
                .and_then(region_code_for)
                .map(str::to_string),
        }
    }
}

/// HTTP client for the postal registry.
pub struct PostalClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff_ms: u64,
}

impl PostalClient {
    /// Creates a client for the registry rooted at `base_url`
    /// (e.g. `https://viacep.com.br/ws`).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_attempts: u32,
        backoff_ms: u64,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_attempts,
            backoff_ms,
        })
    }

    /// Looks up a postal code. Formatting characters are ignored.
    ///
    /// # Errors
    ///
    /// - [`GeocodeError::InvalidPostalCode`] if the code does not have 8 digits.
    /// - [`GeocodeError::RateLimited`] / [`GeocodeError::Http`] after the
    ///   retry budget is spent on transient faults.
    /// - [`GeocodeError::UnexpectedStatus`] on any other non-2xx status.
    /// - [`GeocodeError::Deserialize`] if the body is not the expected JSON.
    pub async fn lookup(&self, postal_code: &str) -> Result<PostalLookup, GeocodeError> {
        let digits = only_digits(postal_code);
        if digits.len() != POSTAL_CODE_LEN {
            return Err(GeocodeError::InvalidPostalCode(postal_code.to_string()));
        }
        let url = format!("{}/{digits}/json", self.base_url);

        retry_with_linear_backoff(self.max_attempts, self.backoff_ms, "postal", || {
            self.lookup_once(&url)
        })
        .await
    }

    async fn lookup_once(&self, url: &str) -> Result<PostalLookup, GeocodeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(GeocodeError::RateLimited {
                host: self.base_url.clone(),
                status: status.as_u16(),
            });
        }
        // The registry answers 400 for syntactically valid but unknown ranges.
        if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
            return Ok(PostalLookup::NotFound);
        }
        if !status.is_success() {
            return Err(GeocodeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let parsed: ViaCepResponse =
            serde_json::from_str(&body).map_err(|e| GeocodeError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        if parsed.is_not_found() {
            return Ok(PostalLookup::NotFound);
        }
        Ok(PostalLookup::Found(parsed.into_fragment()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ViaCepResponse {
        serde_json::from_str(json).expect("valid fixture")
    }

    #[test]
    fn erro_flag_accepts_bool_and_string() {
        assert!(parse(r#"{"erro": true}"#).is_not_found());
        assert!(parse(r#"{"erro": "true"}"#).is_not_found());
        assert!(!parse(r#"{"erro": false}"#).is_not_found());
        assert!(!parse(r#"{"logradouro": "Rua A"}"#).is_not_found());
    }

    #[test]
    fn fragment_drops_blank_fields_and_maps_region() {
        let fragment = parse(
            r#"{"cep":"57000-000","logradouro":"","bairro":" Centro ","localidade":"Maceió","uf":"AL"}"#,
        )
        .into_fragment();
        assert_eq!(
            fragment,
            PostalFragment {
                street: None,
                district: Some("Centro".to_string()),
                city: Some("Maceió".to_string()),
                region_code: Some("AL".to_string()),
            }
        );
    }

    #[test]
    fn to_components_fills_postal_code_and_country() {
        let fragment = PostalFragment {
            street: Some("Rua A".to_string()),
            district: Some("Centro".to_string()),
            city: Some("Maceió".to_string()),
            region_code: Some("AL".to_string()),
        };
        let components = fragment.to_components("57000000");
        assert_eq!(
            geocrm_core::build_canonical_address(&components).as_deref(),
            Some("Rua A, Centro, Maceió, AL, 57000000, Brasil")
        );
    }
}
