use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use geocrm_core::EquipmentItem;
use geocrm_db::{
    AddressCandidateRow, DbError, NewCustomer, SyncCursorRow, SyncPauseRow, SyncRunCounts,
    SyncRunStatus,
};

/// Persistence used by the reconciliation driver.
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn load_pause(&self) -> Result<Option<SyncPauseRow>, DbError>;
    async fn set_pause(&self, since: DateTime<Utc>, reason: &str) -> Result<(), DbError>;
    async fn clear_pause(&self) -> Result<(), DbError>;

    async fn load_cursor(&self) -> Result<Option<SyncCursorRow>, DbError>;
    async fn save_cursor(
        &self,
        last_resolved_id: Option<i64>,
        last_entry_name: Option<&str>,
    ) -> Result<(), DbError>;
    async fn clear_cursor(&self) -> Result<(), DbError>;

    /// Other stored customers sharing the postal code, the city, or part of
    /// the street.
    async fn find_address_candidates(
        &self,
        exclude_partner_id: i64,
        zip: Option<&str>,
        city: Option<&str>,
        street_fragment: Option<&str>,
    ) -> Result<Vec<AddressCandidateRow>, DbError>;

    /// Returns the local customer id.
    async fn upsert_customer(&self, customer: &NewCustomer) -> Result<i64, DbError>;

    async fn replace_equipment(
        &self,
        customer_id: i64,
        items: &[EquipmentItem],
    ) -> Result<u64, DbError>;

    async fn start_run(&self) -> Result<i64, DbError>;
    async fn finish_run(
        &self,
        id: i64,
        status: SyncRunStatus,
        counts: SyncRunCounts,
        error_message: Option<&str>,
    ) -> Result<(), DbError>;
}

/// [`SyncStore`] over the Postgres schema in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn load_pause(&self) -> Result<Option<SyncPauseRow>, DbError> {
        geocrm_db::load_sync_pause(&self.pool).await
    }

    async fn set_pause(&self, since: DateTime<Utc>, reason: &str) -> Result<(), DbError> {
        geocrm_db::set_sync_pause(&self.pool, since, reason).await
    }

    async fn clear_pause(&self) -> Result<(), DbError> {
        geocrm_db::clear_sync_pause(&self.pool).await
    }

    async fn load_cursor(&self) -> Result<Option<SyncCursorRow>, DbError> {
        geocrm_db::load_sync_cursor(&self.pool).await
    }

    async fn save_cursor(
        &self,
        last_resolved_id: Option<i64>,
        last_entry_name: Option<&str>,
    ) -> Result<(), DbError> {
        geocrm_db::save_sync_cursor(&self.pool, last_resolved_id, last_entry_name).await
    }

    async fn clear_cursor(&self) -> Result<(), DbError> {
        geocrm_db::clear_sync_cursor(&self.pool).await
    }

    async fn find_address_candidates(
        &self,
        exclude_partner_id: i64,
        zip: Option<&str>,
        city: Option<&str>,
        street_fragment: Option<&str>,
    ) -> Result<Vec<AddressCandidateRow>, DbError> {
        geocrm_db::find_address_candidates(
            &self.pool,
            exclude_partner_id,
            zip,
            city,
            street_fragment,
        )
        .await
    }

    async fn upsert_customer(&self, customer: &NewCustomer) -> Result<i64, DbError> {
        geocrm_db::upsert_customer(&self.pool, customer).await
    }

    async fn replace_equipment(
        &self,
        customer_id: i64,
        items: &[EquipmentItem],
    ) -> Result<u64, DbError> {
        geocrm_db::replace_customer_equipment(&self.pool, customer_id, items).await
    }

    async fn start_run(&self) -> Result<i64, DbError> {
        Ok(geocrm_db::create_sync_run(&self.pool).await?.id)
    }

    async fn finish_run(
        &self,
        id: i64,
        status: SyncRunStatus,
        counts: SyncRunCounts,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        geocrm_db::finish_sync_run(&self.pool, id, status, counts, error_message).await
    }
}
