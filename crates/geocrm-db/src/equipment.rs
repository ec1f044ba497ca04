//! Database operations for `customer_equipment`.

use chrono::{DateTime, Utc};
use geocrm_core::EquipmentItem;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `customer_equipment` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EquipmentRow {
    pub id: i64,
    pub customer_id: i64,
    pub name: String,
    pub quantity: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Deletes every line item of `customer_id` and inserts `items` in their
/// place, inside one transaction. Returns the number of rows written.
///
/// Items repeating a name within `items` collapse onto one row carrying the
/// last quantity.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back.
pub async fn replace_customer_equipment(
    pool: &PgPool,
    customer_id: i64,
    items: &[EquipmentItem],
) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM customer_equipment WHERE customer_id = $1")
        .bind(customer_id)
        .execute(&mut *tx)
        .await?;

    let mut inserted = 0;
    for item in items {
        let result = sqlx::query(
            "INSERT INTO customer_equipment (customer_id, name, quantity) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (customer_id, name) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(customer_id)
        .bind(&item.name)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Lists a customer's line items in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_customer_equipment(
    pool: &PgPool,
    customer_id: i64,
) -> Result<Vec<EquipmentRow>, DbError> {
    let rows = sqlx::query_as::<_, EquipmentRow>(
        "SELECT id, customer_id, name, quantity, created_at \
         FROM customer_equipment \
         WHERE customer_id = $1 \
         ORDER BY id",
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
