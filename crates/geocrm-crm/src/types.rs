//! Wire shapes for partner records and their normalization into
//! [`CrmPartner`].
//!
//! The CRM encodes "no value" as `false` for every field type and many-to-one
//! references as `[id, "label"]`. Both quirks end here.

use serde::{Deserialize, Deserializer};

use geocrm_core::{collapse_whitespace, region_code_from_state_label, CrmPartner};

pub const PARTNER_MODEL: &str = "res.partner";

/// Fields requested on every partner search.
pub const PARTNER_FIELDS: [&str; 14] = [
    "id",
    "name",
    "display_name",
    "street",
    "street2",
    "city",
    "state_id",
    "zip",
    "country_id",
    "phone",
    "mobile",
    "email",
    "website",
    "customer_rank",
];

/// Treats `false` and `null` as absent.
fn odoo_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field<T> {
        Present(T),
        Flag(#[allow(dead_code)] bool),
    }

    Ok(match Option::<Field<T>>::deserialize(deserializer)? {
        Some(Field::Present(value)) => Some(value),
        Some(Field::Flag(_)) | None => None,
    })
}

/// A many-to-one reference: `[id, "label"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Many2One(pub i64, pub String);

/// A partner exactly as returned by `search_read`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPartner {
    pub id: i64,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub street: Option<String>,
    /// Only sent by databases with the extended address module.
    #[serde(default, deserialize_with = "odoo_optional")]
    pub street_number: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub street2: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub state_id: Option<Many2One>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub country_id: Option<Many2One>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub mobile: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "odoo_optional")]
    pub website: Option<String>,
    #[serde(default)]
    pub customer_rank: i64,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
}

impl RawPartner {
    /// Normalizes the record. `name` falls back to `display_name` and vice
    /// versa; the region code is recovered from the state label
    /// (`"Alagoas (BR)"` → `"AL"`).
    #[must_use]
    pub fn into_partner(self) -> CrmPartner {
        let name = clean(self.name);
        let display_name = clean(self.display_name);
        let (name, display_name) = match (name, display_name) {
            (Some(n), Some(d)) => (n, d),
            (Some(n), None) => (n.clone(), n),
            (None, Some(d)) => (d.clone(), d),
            (None, None) => (String::new(), String::new()),
        };

        CrmPartner {
            id: self.id,
            name,
            display_name,
            street: clean(self.street),
            street_number: clean(self.street_number),
            district: clean(self.street2),
            city: clean(self.city),
            region_code: self
                .state_id
                .as_ref()
                .and_then(|state| region_code_from_state_label(&state.1))
                .map(str::to_string),
            postal_code: clean(self.zip),
            country: clean(self.country_id.map(|c| c.1)),
            phone: clean(self.phone),
            mobile: clean(self.mobile),
            email: clean(self.email),
            website: clean(self.website),
            is_customer: self.customer_rank > 0,
        }
    }
}
