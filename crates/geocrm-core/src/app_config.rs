use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub roster_path: PathBuf,
    pub roster_sheet: Option<String>,
    pub odoo_url: String,
    pub odoo_db: String,
    pub odoo_user: String,
    pub odoo_password: String,
    pub crm_batch_size: usize,
    pub http_timeout_secs: u64,
    pub viacep_url: String,
    pub postal_max_attempts: u32,
    pub postal_backoff_ms: u64,
    pub google_api_key: Option<String>,
    pub google_geocode_url: String,
    pub nominatim_hosts: Vec<String>,
    pub nominatim_user_agent: String,
    pub country_code: String,
    pub geocode_delay_ms: u64,
    pub geocode_backoff_ms: u64,
    pub geocode_max_attempts: u32,
    pub pause_cooldown_secs: u64,
    pub sync_interval_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("roster_path", &self.roster_path)
            .field("roster_sheet", &self.roster_sheet)
            .field("odoo_url", &self.odoo_url)
            .field("odoo_db", &self.odoo_db)
            .field("odoo_user", &self.odoo_user)
            .field("odoo_password", &"[redacted]")
            .field("crm_batch_size", &self.crm_batch_size)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("viacep_url", &self.viacep_url)
            .field("postal_max_attempts", &self.postal_max_attempts)
            .field("postal_backoff_ms", &self.postal_backoff_ms)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("google_geocode_url", &self.google_geocode_url)
            .field("nominatim_hosts", &self.nominatim_hosts)
            .field("nominatim_user_agent", &self.nominatim_user_agent)
            .field("country_code", &self.country_code)
            .field("geocode_delay_ms", &self.geocode_delay_ms)
            .field("geocode_backoff_ms", &self.geocode_backoff_ms)
            .field("geocode_max_attempts", &self.geocode_max_attempts)
            .field("pause_cooldown_secs", &self.pause_cooldown_secs)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .finish()
    }
}
