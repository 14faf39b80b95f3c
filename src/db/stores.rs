//! Store and payment gateway queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::to_u64;
use crate::domain::aggregates::Store;
use crate::domain::value_objects::{LimitValue, StoreId};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    name: String,
    slug: String,
    is_active: bool,
    whatsapp_number: Option<String>,
    cash_on_delivery_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            is_active: row.is_active,
            whatsapp_number: row.whatsapp_number,
            cash_on_delivery_enabled: row.cash_on_delivery_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn get_store(pool: &PgPool, id: StoreId) -> Result<Store> {
    sqlx::query_as::<_, StoreRow>(
        "SELECT id, name, slug, is_active, whatsapp_number, cash_on_delivery_enabled, created_at, updated_at FROM stores WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Store::from)
    .ok_or(Error::StoreNotFound)
}

pub async fn update_store(pool: &PgPool, store: &Store) -> Result<()> {
    let result = sqlx::query(
        "UPDATE stores SET name = $2, whatsapp_number = $3, cash_on_delivery_enabled = $4, is_active = $5, updated_at = $6 WHERE id = $1",
    )
    .bind(store.id)
    .bind(&store.name)
    .bind(&store.whatsapp_number)
    .bind(store.cash_on_delivery_enabled)
    .bind(store.is_active)
    .bind(store.updated_at)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 { return Err(Error::StoreNotFound); }
    Ok(())
}

pub async fn count_active_gateways(pool: &PgPool, store_id: StoreId) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_gateways WHERE store_id = $1 AND is_active")
        .bind(store_id)
        .fetch_one(pool)
        .await?;
    to_u64(count, "active gateways")
}

/// Switches a gateway on unless that would exceed `limit`.
///
/// The store row is locked for the duration so concurrent activations are
/// counted one after another.
pub async fn activate_gateway(pool: &PgPool, store_id: StoreId, gateway_id: Uuid, limit: LimitValue) -> Result<()> {
    let mut tx = pool.begin().await?;
    let locked: Option<StoreId> = sqlx::query_scalar("SELECT id FROM stores WHERE id = $1 FOR UPDATE")
        .bind(store_id)
        .fetch_optional(&mut *tx)
        .await?;
    if locked.is_none() { return Err(Error::StoreNotFound); }

    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM payment_gateways WHERE id = $1 AND store_id = $2")
        .bind(gateway_id)
        .bind(store_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::GatewayNotFound)?;
    if is_active { return Ok(()); }

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_gateways WHERE store_id = $1 AND is_active")
        .bind(store_id)
        .fetch_one(&mut *tx)
        .await?;
    if !limit.allows(to_u64(active, "active gateways")?, 1) {
        return Err(Error::GatewayLimitReached);
    }

    sqlx::query("UPDATE payment_gateways SET is_active = TRUE WHERE id = $1 AND store_id = $2")
        .bind(gateway_id)
        .bind(store_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
