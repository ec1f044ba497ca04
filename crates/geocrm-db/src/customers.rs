//! Database operations for `customers`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Cap on duplicate-address candidates returned per query.
const ADDRESS_CANDIDATE_LIMIT: i64 = 20;

/// A row from the `customers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub public_id: Uuid,
    pub crm_partner_id: i64,
    pub name: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
    /// The canonical address string that was geocoded.
    pub full_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Every column written by [`upsert_customer`]. All of them are overwritten
/// on conflict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCustomer {
    pub crm_partner_id: i64,
    pub name: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// Postal code, digits only.
    pub zip: Option<String>,
    pub country: Option<String>,
    pub full_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Another stored customer that shares part of an address.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AddressCandidateRow {
    pub id: i64,
    pub crm_partner_id: i64,
    pub name: String,
    pub display_name: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

/// Inserts or fully overwrites the customer keyed by `crm_partner_id`.
///
/// `public_id` is generated on first insert and kept afterwards. Returns the
/// row's internal `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_customer(pool: &PgPool, customer: &NewCustomer) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO customers (public_id, crm_partner_id, name, display_name, phone, mobile, \
             email, website, street, street_number, district, city, state, zip, country, \
             full_address, latitude, longitude) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         ON CONFLICT (crm_partner_id) DO UPDATE SET \
             name          = EXCLUDED.name, \
             display_name  = EXCLUDED.display_name, \
             phone         = EXCLUDED.phone, \
             mobile        = EXCLUDED.mobile, \
             email         = EXCLUDED.email, \
             website       = EXCLUDED.website, \
             street        = EXCLUDED.street, \
             street_number = EXCLUDED.street_number, \
             district      = EXCLUDED.district, \
             city          = EXCLUDED.city, \
             state         = EXCLUDED.state, \
             zip           = EXCLUDED.zip, \
             country       = EXCLUDED.country, \
             full_address  = EXCLUDED.full_address, \
             latitude      = EXCLUDED.latitude, \
             longitude     = EXCLUDED.longitude, \
             updated_at    = NOW() \
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(customer.crm_partner_id)
    .bind(&customer.name)
    .bind(&customer.display_name)
    .bind(customer.phone.as_deref())
    .bind(customer.mobile.as_deref())
    .bind(customer.email.as_deref())
    .bind(customer.website.as_deref())
    .bind(customer.street.as_deref())
    .bind(customer.street_number.as_deref())
    .bind(customer.district.as_deref())
    .bind(customer.city.as_deref())
    .bind(customer.state.as_deref())
    .bind(customer.zip.as_deref())
    .bind(customer.country.as_deref())
    .bind(customer.full_address.as_deref())
    .bind(customer.latitude)
    .bind(customer.longitude)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a customer by CRM partner id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_customer_by_partner_id(
    pool: &PgPool,
    crm_partner_id: i64,
) -> Result<Option<CustomerRow>, DbError> {
    let row = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, public_id, crm_partner_id, name, display_name, phone, mobile, email, \
                website, street, street_number, district, city, state, zip, country, \
                full_address, latitude, longitude, created_at, updated_at \
         FROM customers \
         WHERE crm_partner_id = $1",
    )
    .bind(crm_partner_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Other customers sharing the postal code, the city (case-insensitive), or
/// containing `street_fragment` in their street. Absent filters match
/// nothing; with all three absent the result is empty.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_address_candidates(
    pool: &PgPool,
    exclude_partner_id: i64,
    zip: Option<&str>,
    city: Option<&str>,
    street_fragment: Option<&str>,
) -> Result<Vec<AddressCandidateRow>, DbError> {
    if zip.is_none() && city.is_none() && street_fragment.is_none() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, AddressCandidateRow>(
        "SELECT id, crm_partner_id, name, display_name, street, city, zip \
         FROM customers \
         WHERE crm_partner_id <> $1 \
           AND (   ($2::TEXT IS NOT NULL AND zip = $2) \
                OR ($3::TEXT IS NOT NULL AND lower(city) = lower($3)) \
                OR ($4::TEXT IS NOT NULL AND strpos(lower(street), lower($4)) > 0)) \
         ORDER BY id \
         LIMIT $5",
    )
    .bind(exclude_partner_id)
    .bind(zip)
    .bind(city)
    .bind(street_fragment)
    .bind(ADDRESS_CANDIDATE_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
