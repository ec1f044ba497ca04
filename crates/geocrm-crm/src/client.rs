//! JSON-RPC client for the Odoo external API (`POST {url}/jsonrpc`).
//!
//! Two services are used: `common.login` to exchange credentials for a user
//! id, and `object.execute_kw` for `search_read`. Every call is wrapped in the
//! `{"jsonrpc": "2.0", "method": "call", "params": {...}}` envelope; an
//! `error` member in the reply surfaces as [`CrmError::Rpc`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::Domain;
use crate::error::CrmError;

/// Credentials bound to an authenticated user id.
#[derive(Clone)]
pub struct OdooSession {
    pub db: String,
    pub uid: i64,
    password: String,
}

impl std::fmt::Debug for OdooSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooSession")
            .field("db", &self.db)
            .field("uid", &self.uid)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl From<RpcErrorBody> for CrmError {
    fn from(body: RpcErrorBody) -> Self {
        // The server-side exception text is more useful than the generic
        // "Odoo Server Error" envelope message.
        let (message, detail) = match body.data {
            Some(data) => (
                data.message.filter(|m| !m.is_empty()).unwrap_or(body.message),
                data.name,
            ),
            None => (body.message, None),
        };
        CrmError::Rpc {
            code: body.code,
            message,
            detail,
        }
    }
}

pub struct OdooClient {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl OdooClient {
    /// Creates a client for the instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::Http`] if the underlying `reqwest::Client` cannot
    /// be constructed.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("geocrm/0.1 (crm-sync)")
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/jsonrpc", base_url.trim_end_matches('/')),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issues one RPC and returns its `result` member.
    ///
    /// # Errors
    ///
    /// - [`CrmError::Http`] on transport failure.
    /// - [`CrmError::UnexpectedStatus`] on a non-2xx status.
    /// - [`CrmError::Rpc`] when the reply carries an `error` member.
    /// - [`CrmError::Deserialize`] if the reply is not a JSON-RPC envelope.
    pub async fn call(&self, service: &str, method: &str, args: Value) -> Result<Value, CrmError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });

        let response = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrmError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body = response.text().await?;
        let reply: RpcReply = serde_json::from_str(&body).map_err(|e| CrmError::Deserialize {
            context: format!("{service}.{method}"),
            source: e,
        })?;

        if let Some(error) = reply.error {
            return Err(error.into());
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }

    /// Authenticates and returns a session for subsequent searches.
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::AuthenticationFailed`] when the server answers
    /// `false`, or any error from [`OdooClient::call`].
    pub async fn login(
        &self,
        db: &str,
        user: &str,
        password: &str,
    ) -> Result<OdooSession, CrmError> {
        let result = self
            .call("common", "login", json!([db, user, password]))
            .await?;

        match result.as_i64() {
            Some(uid) if uid > 0 => {
                tracing::debug!(db, user, uid, "authenticated against CRM");
                Ok(OdooSession {
                    db: db.to_owned(),
                    uid,
                    password: password.to_owned(),
                })
            }
            _ => Err(CrmError::AuthenticationFailed {
                db: db.to_owned(),
                user: user.to_owned(),
            }),
        }
    }

    /// Runs `search_read` on `model` and deserializes each record as `T`.
    ///
    /// # Errors
    ///
    /// Any error from [`OdooClient::call`], or [`CrmError::Deserialize`] if a
    /// record does not match `T`.
    pub async fn search_read<T: DeserializeOwned>(
        &self,
        session: &OdooSession,
        model: &str,
        domain: &Domain,
        fields: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<T>, CrmError> {
        let mut options = json!({ "fields": fields });
        if let Some(limit) = limit {
            options["limit"] = json!(limit);
        }
        let args = json!([
            session.db,
            session.uid,
            session.password,
            model,
            "search_read",
            [domain.to_terms()],
            options,
        ]);

        let result = self.call("object", "execute_kw", args).await?;
        serde_json::from_value(result).map_err(|e| CrmError::Deserialize {
            context: format!("{model}.search_read"),
            source: e,
        })
    }
}
