pub mod address;
pub mod app_config;
pub mod config;
pub mod partner;
pub mod regions;
pub mod text;
pub mod types;

use thiserror::Error;

pub use address::{build_canonical_address, AddressComponents, HOME_COUNTRY_NAME};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use partner::CrmPartner;
pub use regions::{region_code_for, region_code_from_state_label};
pub use text::{collapse_whitespace, normalize_name, only_digits, strip_diacritics};
pub use types::{EquipmentItem, GeoResult, SourceEntry};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
