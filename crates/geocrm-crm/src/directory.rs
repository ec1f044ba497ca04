use async_trait::async_trait;
use tokio::sync::Mutex;

use geocrm_core::{AppConfig, CrmPartner};

use crate::client::{OdooClient, OdooSession};
use crate::domain::Domain;
use crate::error::CrmError;
use crate::types::{RawPartner, PARTNER_FIELDS, PARTNER_MODEL};

/// Cap on records returned by one fuzzy lookup.
pub const FUZZY_LOOKUP_LIMIT: usize = 20;

/// Partner lookups used to match roster entries to CRM records.
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Partners whose `name` or `display_name` is exactly one of `names`.
    async fn find_exact(&self, names: &[String]) -> Result<Vec<CrmPartner>, CrmError>;

    /// Partners whose `name` or `display_name` contains any of `candidates`,
    /// case-insensitively.
    async fn find_fuzzy(&self, candidates: &[String]) -> Result<Vec<CrmPartner>, CrmError>;
}

/// [`PartnerDirectory`] backed by a live Odoo instance. Logs in on first
/// use and reuses the session afterwards.
pub struct OdooDirectory {
    client: OdooClient,
    db: String,
    user: String,
    password: String,
    batch_size: usize,
    session: Mutex<Option<OdooSession>>,
}

impl OdooDirectory {
    #[must_use]
    pub fn new(
        client: OdooClient,
        db: &str,
        user: &str,
        password: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            db: db.to_owned(),
            user: user.to_owned(),
            password: password.to_owned(),
            batch_size: batch_size.max(1),
            session: Mutex::new(None),
        }
    }

    /// # Errors
    ///
    /// Returns [`CrmError::Http`] if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, CrmError> {
        let client = OdooClient::new(&config.odoo_url, config.http_timeout_secs)?;
        Ok(Self::new(
            client,
            &config.odoo_db,
            &config.odoo_user,
            &config.odoo_password,
            config.crm_batch_size,
        ))
    }

    async fn session(&self) -> Result<OdooSession, CrmError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self
            .client
            .login(&self.db, &self.user, &self.password)
            .await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn search(
        &self,
        domain: &Domain,
        limit: Option<usize>,
    ) -> Result<Vec<CrmPartner>, CrmError> {
        let session = self.session().await?;
        let raw: Vec<RawPartner> = self
            .client
            .search_read(&session, PARTNER_MODEL, domain, &PARTNER_FIELDS, limit)
            .await?;
        Ok(raw.into_iter().map(RawPartner::into_partner).collect())
    }
}

/// `name in chunk OR display_name in chunk`.
fn exact_domain(chunk: &[String]) -> Domain {
    Domain::Or(vec![
        Domain::is_in("name", chunk),
        Domain::is_in("display_name", chunk),
    ])
}

/// OR-chain of `ilike` over both name fields for every candidate.
fn fuzzy_domain(candidates: &[String]) -> Option<Domain> {
    let conditions: Vec<Domain> = candidates
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .flat_map(|c| [Domain::ilike("name", c), Domain::ilike("display_name", c)])
        .collect();
    (!conditions.is_empty()).then(|| Domain::Or(conditions))
}

#[async_trait]
impl PartnerDirectory for OdooDirectory {
    async fn find_exact(&self, names: &[String]) -> Result<Vec<CrmPartner>, CrmError> {
        let mut partners = Vec::new();
        for (index, chunk) in names.chunks(self.batch_size).enumerate() {
            let found = self.search(&exact_domain(chunk), None).await?;
            tracing::debug!(
                chunk = index,
                requested = chunk.len(),
                found = found.len(),
                "exact partner lookup"
            );
            partners.extend(found);
        }
        Ok(partners)
    }

    async fn find_fuzzy(&self, candidates: &[String]) -> Result<Vec<CrmPartner>, CrmError> {
        let Some(domain) = fuzzy_domain(candidates) else {
            return Ok(Vec::new());
        };
        self.search(&domain, Some(FUZZY_LOOKUP_LIMIT)).await
    }
}
