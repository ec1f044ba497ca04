//! Canonical address assembly.
//!
//! A canonical address is the ordered, comma-joined list of the non-empty
//! address components, used verbatim as the geocoding query and persisted as
//! the customer's full address.

use serde::{Deserialize, Serialize};

use crate::text::{collapse_whitespace, normalize_name};

/// Country name appended to every address built for the home country.
pub const HOME_COUNTRY_NAME: &str = "Brasil";

/// Results with fewer alphanumeric characters than this are too vague to
/// geocode.
const MIN_SIGNIFICANT_CHARS: usize = 8;

/// Names the home country goes by; an address made of nothing else is absent.
const COUNTRY_ALIASES: [&str; 2] = ["brasil", "brazil"];

/// Structured address fields, in canonical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl AddressComponents {
    fn ordered(&self) -> [Option<&str>; 7] {
        [
            self.street.as_deref(),
            self.number.as_deref(),
            self.district.as_deref(),
            self.city.as_deref(),
            self.region.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
    }
}

/// Builds the canonical address string, or `None` when the components do
/// not describe a usable address.
///
/// Each component is whitespace-collapsed; empty components and repeated
/// separators are dropped. A region equal to the country code `BR` is
/// discarded. The result is `None` when it consists only of the country name
/// or carries fewer than eight alphanumeric characters.
#[must_use]
pub fn build_canonical_address(components: &AddressComponents) -> Option<String> {
    let region_index = 4;
    let parts: Vec<String> = components
        .ordered()
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| {
            let value = (*value)?;
            if idx == region_index && value.trim().eq_ignore_ascii_case("BR") {
                return None;
            }
            Some(value)
        })
        .flat_map(|value| value.split(','))
        .map(collapse_whitespace)
        .filter(|piece| !piece.is_empty())
        .collect();

    if parts.is_empty() {
        return None;
    }

    let joined = parts.join(", ");

    let key = normalize_name(&joined);
    let country_key = components.country.as_deref().map(normalize_name);
    if COUNTRY_ALIASES.contains(&key.as_str()) || country_key.as_deref() == Some(key.as_str()) {
        return None;
    }

    let significant = joined.chars().filter(|c| c.is_alphanumeric()).count();
    if significant < MIN_SIGNIFICANT_CHARS {
        return None;
    }

    Some(joined)
}
