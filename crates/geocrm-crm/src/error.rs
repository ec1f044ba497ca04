use thiserror::Error;

/// Errors returned by the CRM client.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The endpoint answered with a JSON-RPC `error` envelope. `detail` is
    /// the server-side exception message, when one was sent.
    #[error("CRM RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        detail: Option<String>,
    },

    /// `login` returned `false`.
    #[error("CRM rejected credentials for user {user} on database {db}")]
    AuthenticationFailed { db: String, user: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
