//! Order and payment queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentState};
use crate::domain::value_objects::{Money, OrderId, PaymentId, StoreId};
use crate::{Error, Result};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    store_id: StoreId,
    order_number: String,
    status: String,
    total: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: PaymentId,
    order_id: OrderId,
    amount: Decimal,
    method: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            amount: row.amount,
            method: row.method,
            status: PaymentState::from_string(&row.status),
            created_at: row.created_at,
        }
    }
}

/// Loads an order with all of its payments.
pub async fn get_order(pool: &PgPool, store_id: StoreId, order_id: OrderId) -> Result<Order> {
    let row = sqlx::query_as::<_, OrderRow>(
        "SELECT id, store_id, order_number, status, total, currency, created_at, updated_at FROM orders WHERE id = $1 AND store_id = $2",
    )
    .bind(order_id)
    .bind(store_id)
    .fetch_optional(pool)
    .await?
    .ok_or(Error::OrderNotFound)?;

    let payments = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, order_id, amount, method, status, created_at FROM payments WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Payment::from)
    .collect();

    Ok(Order::restore(
        row.id,
        row.store_id,
        row.order_number,
        OrderStatus::from_string(&row.status),
        Money::new(row.total, &row.currency),
        payments,
        row.created_at,
        row.updated_at,
    ))
}

pub async fn insert_payment(pool: &PgPool, payment: &Payment) -> Result<()> {
    sqlx::query("INSERT INTO payments (id, order_id, amount, method, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_payment_status(pool: &PgPool, store_id: StoreId, payment_id: PaymentId, status: PaymentState) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE payments p SET status = $3
        FROM orders o
        WHERE p.id = $1 AND p.order_id = o.id AND o.store_id = $2
        "#,
    )
    .bind(payment_id)
    .bind(store_id)
    .bind(status.as_str())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 { return Err(Error::OrderNotFound); }
    Ok(())
}
