use std::path::PathBuf;

use thiserror::Error;

use geocrm_crm::CrmError;
use geocrm_db::DbError;
use geocrm_geocode::GeocodeError;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to open roster {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("roster {path} has no worksheets")]
    NoSheets { path: PathBuf },

    #[error("failed to read worksheet {sheet}: {source}")]
    Sheet {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
}

/// Errors that abort a whole pass.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("CRM lookup failed: {0}")]
    Crm(#[from] CrmError),

    #[error("store error: {0}")]
    Db(#[from] DbError),
}

/// Errors scoped to one roster entry; the pass moves on to the next one.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("store error: {0}")]
    Db(#[from] DbError),
}

impl EntryError {
    /// `true` when the error must halt the pass.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, EntryError::Geocode(e) if e.is_fatal())
    }
}
