//! Database operations for `sync_runs`, the per-pass audit trail.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Terminal status of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRunStatus {
    Completed,
    Paused,
    Failed,
    Skipped,
}

impl SyncRunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Paused => "paused",
            SyncRunStatus::Failed => "failed",
            SyncRunStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRunCounts {
    pub entries_total: i32,
    pub matched: i32,
    pub unmatched: i32,
    pub processed: i32,
    pub failed: i32,
}

/// A row from the `sync_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub status: String,
    pub entries_total: i32,
    pub matched: i32,
    pub unmatched: i32,
    pub processed: i32,
    pub failed: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Opens a new run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_sync_run(pool: &PgPool) -> Result<SyncRunRow, DbError> {
    let row = sqlx::query_as::<_, SyncRunRow>(
        "INSERT INTO sync_runs (public_id, status) \
         VALUES ($1, 'running') \
         RETURNING id, public_id, status, entries_total, matched, unmatched, processed, \
                   failed, error_message, started_at, finished_at",
    )
    .bind(Uuid::new_v4())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Closes a `running` run with its final status and counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidSyncRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn finish_sync_run(
    pool: &PgPool,
    id: i64,
    status: SyncRunStatus,
    counts: SyncRunCounts,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE sync_runs \
         SET status = $1, entries_total = $2, matched = $3, unmatched = $4, \
             processed = $5, failed = $6, error_message = $7, finished_at = NOW() \
         WHERE id = $8 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(counts.entries_total)
    .bind(counts.matched)
    .bind(counts.unmatched)
    .bind(counts.processed)
    .bind(counts.failed)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidSyncRunTransition { id });
    }

    Ok(())
}

/// Most recent runs first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_runs(pool: &PgPool, limit: i64) -> Result<Vec<SyncRunRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncRunRow>(
        "SELECT id, public_id, status, entries_total, matched, unmatched, processed, \
                failed, error_message, started_at, finished_at \
         FROM sync_runs \
         ORDER BY started_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_schema_check() {
        let all = [
            SyncRunStatus::Completed,
            SyncRunStatus::Paused,
            SyncRunStatus::Failed,
            SyncRunStatus::Skipped,
        ];
        let names: Vec<&str> = all.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["completed", "paused", "failed", "skipped"]);
    }
}
