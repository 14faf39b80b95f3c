//! Product, variation, price tier and price model queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::{to_i32, to_i64, to_u32};
use crate::domain::aggregates::{
    PriceModel, PriceTier, PriceTierSet, Product, ProductSnapshot, ProductStatus, ProductVariation, StockLevel, VariationGroup,
};
use crate::domain::value_objects::{Money, ProductId, Sku, StoreId, VariationId};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    store_id: StoreId,
    sku: String,
    name: String,
    image_url: Option<String>,
    retail_price: Decimal,
    wholesale_price: Option<Decimal>,
    currency: String,
    stock: i64,
    reserved_stock: i64,
    allow_negative_stock: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariationRow {
    id: VariationId,
    attributes: Json<BTreeMap<String, String>>,
    stock: i64,
    reserved_stock: i64,
    price_adjustment: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    tier_order: i32,
    min_quantity: i32,
    price: Decimal,
    is_enabled: bool,
    label: Option<String>,
}

impl TryFrom<TierRow> for PriceTier {
    type Error = Error;

    fn try_from(row: TierRow) -> Result<Self> {
        Ok(Self {
            tier_order: to_u32(row.tier_order, "tier_order")?,
            min_quantity: to_u32(row.min_quantity, "min_quantity")?,
            price: row.price,
            is_enabled: row.is_enabled,
            label: row.label,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariationGroupRow {
    store_id: Option<StoreId>,
    group_key: String,
    label: String,
    options: Vec<String>,
}

pub async fn get_product(pool: &PgPool, store_id: StoreId, product_id: ProductId) -> Result<Product> {
    let row = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT id, store_id, sku, name, image_url, retail_price, wholesale_price, currency,
               stock, reserved_stock, allow_negative_stock, status, created_at, updated_at
        FROM products WHERE id = $1 AND store_id = $2
        "#,
    )
    .bind(product_id)
    .bind(store_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::ProductNotFound)?;

    let variations = sqlx::query_as::<_, VariationRow>(
        "SELECT id, attributes, stock, reserved_stock, price_adjustment FROM product_variations WHERE product_id = $1 ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|v| ProductVariation {
        id: v.id,
        attributes: v.attributes.0,
        stock: StockLevel::new(v.stock, v.reserved_stock),
        price_adjustment: v.price_adjustment,
    })
    .collect();

    let tier_rows = sqlx::query_as::<_, TierRow>(
        "SELECT tier_order, min_quantity, price, is_enabled, label FROM product_price_tiers WHERE product_id = $1 ORDER BY tier_order",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    let tiers = if tier_rows.is_empty() {
        PriceTierSet::retail_only(row.retail_price)
    } else {
        let tiers = tier_rows.into_iter().map(PriceTier::try_from).collect::<Result<Vec<_>>>()?;
        PriceTierSet::new(tiers).map_err(|e| Error::InvalidData(format!("product {product_id} tiers: {e}")))?
    };

    let sku = Sku::new(row.sku).map_err(|e| Error::InvalidData(format!("product {product_id} sku: {e}")))?;
    Ok(Product::restore(ProductSnapshot {
        id: row.id,
        store_id: row.store_id,
        sku,
        name: row.name,
        image_url: row.image_url,
        wholesale_price: row.wholesale_price.map(|p| Money::new(p, &row.currency)),
        retail_price: Money::new(row.retail_price, &row.currency),
        stock: StockLevel::new(row.stock, row.reserved_stock),
        allow_negative_stock: row.allow_negative_stock,
        status: ProductStatus::from_string(&row.status),
        variations,
        tiers,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// Replaces the stored tiers with the product's current tier set.
pub async fn save_tiers(pool: &PgPool, product: &Product) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM product_price_tiers WHERE product_id = $1")
        .bind(product.id())
        .execute(&mut *tx)
        .await?;
    for tier in product.tiers().tiers() {
        sqlx::query(
            "INSERT INTO product_price_tiers (product_id, tier_order, min_quantity, price, is_enabled, label) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(product.id())
        .bind(to_i32(tier.tier_order)?)
        .bind(to_i32(tier.min_quantity)?)
        .bind(tier.price)
        .bind(tier.is_enabled)
        .bind(&tier.label)
        .execute(&mut *tx)
        .await?;
    }
    sqlx::query("UPDATE products SET wholesale_price = $3, updated_at = $4 WHERE id = $1 AND store_id = $2")
        .bind(product.id())
        .bind(product.store_id())
        .bind(product.wholesale_price().map(Money::amount))
        .bind(product.updated_at())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Reserves stock in one conditional update so concurrent orders cannot oversell.
pub async fn reserve_stock(pool: &PgPool, store_id: StoreId, product_id: ProductId, qty: u32) -> Result<StockLevel> {
    let level: Option<(i64, i64)> = sqlx::query_as(
        r#"
        UPDATE products SET reserved_stock = reserved_stock + $3, updated_at = NOW()
        WHERE id = $1 AND store_id = $2 AND (allow_negative_stock OR stock - reserved_stock >= $3)
        RETURNING stock, reserved_stock
        "#,
    )
    .bind(product_id)
    .bind(store_id)
    .bind(to_i64(u64::from(qty))?)
    .fetch_optional(pool)
    .await?;
    level.map(|(stock, reserved)| StockLevel::new(stock, reserved)).ok_or(Error::InsufficientStock)
}

pub async fn release_stock(pool: &PgPool, store_id: StoreId, product_id: ProductId, qty: u32) -> Result<StockLevel> {
    let level: Option<(i64, i64)> = sqlx::query_as(
        r#"
        UPDATE products SET reserved_stock = reserved_stock - $3, updated_at = NOW()
        WHERE id = $1 AND store_id = $2 AND reserved_stock >= $3
        RETURNING stock, reserved_stock
        "#,
    )
    .bind(product_id)
    .bind(store_id)
    .bind(to_i64(u64::from(qty))?)
    .fetch_optional(pool)
    .await?;
    level.map(|(stock, reserved)| StockLevel::new(stock, reserved)).ok_or(Error::InvalidQuantity)
}

pub async fn get_price_model(pool: &PgPool, store_id: StoreId) -> Result<Option<PriceModel>> {
    let model: Option<Json<PriceModel>> = sqlx::query_scalar("SELECT model FROM store_price_models WHERE store_id = $1")
        .bind(store_id)
        .fetch_optional(pool)
        .await?;
    Ok(model.map(|m| m.0))
}

pub async fn save_price_model(pool: &PgPool, store_id: StoreId, model: &PriceModel) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO store_price_models (store_id, model) VALUES ($1, $2)
        ON CONFLICT (store_id) DO UPDATE SET model = $2, updated_at = NOW()
        "#,
    )
    .bind(store_id)
    .bind(Json(model))
    .execute(pool)
    .await?;
    Ok(())
}

/// Store-level groups and master groups, in that order.
pub async fn variation_groups(pool: &PgPool, store_id: StoreId) -> Result<(Vec<VariationGroup>, Vec<VariationGroup>)> {
    let rows = sqlx::query_as::<_, VariationGroupRow>(
        "SELECT store_id, group_key, label, options FROM variation_groups WHERE store_id = $1 OR store_id IS NULL ORDER BY group_key",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;
    let (own, master): (Vec<_>, Vec<_>) = rows
        .into_iter()
        .map(|r| VariationGroup { key: r.group_key, label: r.label, values: r.options, store_id: r.store_id })
        .partition(|g| g.store_id.is_some());
    Ok((own, master))
}

