//! Roster-to-CRM reconciliation.
//!
//! [`Reconciler::run_pass`] reads the roster, matches entries to CRM
//! partners, geocodes and persists them one at a time, and keeps the resume
//! cursor and pause state up to date.

pub mod driver;
pub mod equipment;
pub mod error;
pub mod matcher;
pub mod roster;
pub mod store;

pub use driver::{
    MatchedEntry, PassOutcome, PassReport, PassTotals, Reconciler, SyncSession, SyncSettings,
};
pub use equipment::parse_equipment;
pub use error::{EntryError, RosterError, SyncError};
pub use matcher::{find_exact_match, find_match, is_found, lookup_names};
pub use roster::{fill_down, read_roster, RosterSource, XlsxRoster};
pub use store::{PgStore, SyncStore};
