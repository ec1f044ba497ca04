use serde::{Deserialize, Serialize};

use crate::address::{AddressComponents, HOME_COUNTRY_NAME};
use crate::text::only_digits;

/// A customer record read from the CRM, normalized at the boundary.
///
/// Every optional field is `None` rather than empty; the CRM's own
/// "no value" markers never leak past the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmPartner {
    /// Stable CRM identifier, used as the foreign key for local storage.
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    /// Two-letter region code, never the country code.
    pub region_code: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// `true` for real customers, `false` for generic contacts.
    pub is_customer: bool,
}

impl CrmPartner {
    /// Postal code reduced to its digits; `None` when nothing is left.
    #[must_use]
    pub fn postal_digits(&self) -> Option<String> {
        self.postal_code
            .as_deref()
            .map(only_digits)
            .filter(|d| !d.is_empty())
    }

    /// Address components in canonical order, with the home country filled
    /// in when the CRM has none.
    #[must_use]
    pub fn address_components(&self) -> AddressComponents {
        AddressComponents {
            street: self.street.clone(),
            number: self.street_number.clone(),
            district: self.district.clone(),
            city: self.city.clone(),
            region: self.region_code.clone(),
            postal_code: self.postal_digits(),
            country: Some(
                self.country
                    .clone()
                    .unwrap_or_else(|| HOME_COUNTRY_NAME.to_string()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::build_canonical_address;

    fn partner() -> CrmPartner {
        CrmPartner {
            id: 7,
            name: "Padaria Pão Quente".to_string(),
            display_name: "Padaria Pão Quente".to_string(),
            street: Some("Rua A".to_string()),
            street_number: Some("10".to_string()),
            district: Some("Centro".to_string()),
            city: Some("Maceió".to_string()),
            region_code: Some("AL".to_string()),
            postal_code: Some("57000-000".to_string()),
            country: None,
            phone: None,
            mobile: None,
            email: None,
            website: None,
            is_customer: true,
        }
    }

    #[test]
    fn postal_digits_strips_mask() {
        assert_eq!(partner().postal_digits().as_deref(), Some("57000000"));
    }

    #[test]
    fn postal_digits_empty_is_none() {
        let mut p = partner();
        p.postal_code = Some("-".to_string());
        assert_eq!(p.postal_digits(), None);
    }

    #[test]
    fn address_components_default_country() {
        let components = partner().address_components();
        assert_eq!(components.country.as_deref(), Some("Brasil"));
        assert_eq!(
            build_canonical_address(&components).as_deref(),
            Some("Rua A, 10, Centro, Maceió, AL, 57000000, Brasil")
        );
    }
}
