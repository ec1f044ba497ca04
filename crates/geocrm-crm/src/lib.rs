//! Read-only access to the CRM's partner records over Odoo JSON-RPC.
//!
//! [`OdooClient`] speaks the wire protocol, [`Domain`] builds typed search
//! filters, and [`OdooDirectory`] implements the [`PartnerDirectory`] lookups
//! the reconciliation driver needs. Records are normalized into
//! [`geocrm_core::CrmPartner`] at this boundary.

pub mod client;
pub mod directory;
pub mod domain;
pub mod error;
pub mod types;

pub use client::{OdooClient, OdooSession};
pub use directory::{OdooDirectory, PartnerDirectory, FUZZY_LOOKUP_LIMIT};
pub use domain::{Domain, Operator};
pub use error::CrmError;
pub use types::{RawPartner, PARTNER_FIELDS, PARTNER_MODEL};
