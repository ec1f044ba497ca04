//! Singleton rows holding the resume cursor and the pause state.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// The `sync_cursor` singleton.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SyncCursorRow {
    /// CRM id of the last entry processed successfully.
    pub last_resolved_id: Option<i64>,
    /// Roster name of that entry, for when the id cannot be correlated.
    pub last_entry_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// The `sync_pause` singleton.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SyncPauseRow {
    pub paused_since: DateTime<Utc>,
    pub paused_reason: String,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_sync_cursor(pool: &PgPool) -> Result<Option<SyncCursorRow>, DbError> {
    let row = sqlx::query_as::<_, SyncCursorRow>(
        "SELECT last_resolved_id, last_entry_name, updated_at FROM sync_cursor WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Moves the cursor to the given entry.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn save_sync_cursor(
    pool: &PgPool,
    last_resolved_id: Option<i64>,
    last_entry_name: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sync_cursor (id, last_resolved_id, last_entry_name, updated_at) \
         VALUES (1, $1, $2, NOW()) \
         ON CONFLICT (id) DO UPDATE SET \
             last_resolved_id = EXCLUDED.last_resolved_id, \
             last_entry_name  = EXCLUDED.last_entry_name, \
             updated_at       = NOW()",
    )
    .bind(last_resolved_id)
    .bind(last_entry_name)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear_sync_cursor(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("DELETE FROM sync_cursor").execute(pool).await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_sync_pause(pool: &PgPool) -> Result<Option<SyncPauseRow>, DbError> {
    let row = sqlx::query_as::<_, SyncPauseRow>(
        "SELECT paused_since, paused_reason FROM sync_pause WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Records a pause, replacing any earlier one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_sync_pause(
    pool: &PgPool,
    paused_since: DateTime<Utc>,
    paused_reason: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sync_pause (id, paused_since, paused_reason) \
         VALUES (1, $1, $2) \
         ON CONFLICT (id) DO UPDATE SET \
             paused_since  = EXCLUDED.paused_since, \
             paused_reason = EXCLUDED.paused_reason",
    )
    .bind(paused_since)
    .bind(paused_reason)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn clear_sync_pause(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("DELETE FROM sync_pause").execute(pool).await?;
    Ok(())
}
