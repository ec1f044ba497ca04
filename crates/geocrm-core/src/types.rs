use serde::{Deserialize, Serialize};

use crate::address::AddressComponents;

/// One row of the source roster after merged-cell fill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Customer label as typed in the roster, often `"Company, Person"`.
    pub name: String,
    /// Free-text list of purchased equipment; empty when the row has none.
    pub equipment_raw: String,
}

impl SourceEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, equipment_raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            equipment_raw: equipment_raw.into(),
        }
    }
}

/// One parsed equipment line item. `quantity` is `None` when the roster text
/// carried no count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub name: String,
    pub quantity: Option<i32>,
}

impl EquipmentItem {
    #[must_use]
    pub fn new(name: impl Into<String>, quantity: Option<i32>) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }
}

/// A resolved coordinate pair.
///
/// `normalized` carries whichever structured fields the resolving provider
/// returned, so callers can prefer a provider-normalized region code over a
/// missing one from the CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResult {
    pub lat: f64,
    pub lng: f64,
    pub normalized: Option<AddressComponents>,
}

impl GeoResult {
    /// Region code from the provider-normalized fields, if any.
    #[must_use]
    pub fn normalized_region(&self) -> Option<&str> {
        self.normalized
            .as_ref()
            .and_then(|n| n.region.as_deref())
            .filter(|r| !r.is_empty())
    }
}
