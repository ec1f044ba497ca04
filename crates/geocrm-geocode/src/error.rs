use thiserror::Error;

/// Errors returned by the geocoding clients and the resolver.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 or 503: the provider asked us to slow down.
    #[error("rate limited by {host} (HTTP {status})")]
    RateLimited { host: String, status: u16 },

    /// Any other non-2xx status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The provider answered 2xx with an application-level failure.
    #[error("{provider} returned status {status}")]
    ProviderStatus {
        provider: &'static str,
        status: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("postal code \"{0}\" must have exactly 8 digits")]
    InvalidPostalCode(String),

    /// Postal registry failure for one address; does not halt a batch.
    #[error("postal lookup for {postal_code} failed: {source}")]
    Postal {
        postal_code: String,
        #[source]
        source: Box<GeocodeError>,
    },

    /// Every public host rejected the request with a non-retryable status.
    #[error("public geocoder rejected the request on all {hosts} host(s): {last_error}")]
    ProviderRejected { hosts: usize, last_error: String },

    /// All public hosts and all retry budgets are exhausted.
    #[error("public geocoder unreachable on all {hosts} host(s): {last_error}")]
    FatalNetwork { hosts: usize, last_error: String },
}

impl GeocodeError {
    /// `true` only for the condition that should halt a whole batch.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, GeocodeError::FatalNetwork { .. })
    }

    /// Short machine-friendly code, persisted as the pause reason prefix.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            GeocodeError::Http(_) => "http",
            GeocodeError::RateLimited { .. } => "rate_limited",
            GeocodeError::UnexpectedStatus { .. } => "unexpected_status",
            GeocodeError::ProviderStatus { .. } => "provider_status",
            GeocodeError::Deserialize { .. } => "deserialize",
            GeocodeError::InvalidUrl { .. } => "invalid_url",
            GeocodeError::InvalidPostalCode(_) => "invalid_postal_code",
            GeocodeError::Postal { .. } => "postal",
            GeocodeError::ProviderRejected { .. } => "provider_rejected",
            GeocodeError::FatalNetwork { .. } => "fatal_network",
        }
    }
}
