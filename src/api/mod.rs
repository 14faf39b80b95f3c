//! JSON HTTP API. All routes are nested under `/api/v1/stores/:store_id`.

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, patch, post, put},
    Json, Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::StoreCache;
use crate::db::{self, PgUsageRepository};
use crate::domain::aggregates::{Role, Store};
use crate::domain::value_objects::StoreId;
use crate::messaging::EventPublisher;
use crate::services::UsageMeter;

pub use error::ApiError;

pub const ROLE_HEADER: &str = "x-actor-role";

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub stores: StoreCache,
    pub events: EventPublisher,
    pub meter: UsageMeter,
}

impl AppState {
    pub fn new(db: PgPool, stores: StoreCache, events: EventPublisher) -> Self {
        let meter = UsageMeter::new(Arc::new(PgUsageRepository::new(db.clone())), events.clone());
        Self { db, stores, events, meter }
    }

    pub(crate) async fn store(&self, id: StoreId) -> crate::Result<Store> {
        self.stores.get_or_load(id, || db::stores::get_store(&self.db, id)).await
    }
}

/// Role of the caller, from the `x-actor-role` header (defaults to owner).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorRole(pub Role);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActorRole {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ROLE_HEADER) else {
            return Ok(Self(Role::default()));
        };
        let raw = value.to_str().map_err(|_| ApiError::bad_request("role header is not valid text"))?;
        raw.parse().map(Self).map_err(|e: crate::domain::aggregates::plan::UnknownRole| ApiError::bad_request(e.to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    let store_routes = Router::new()
        .route("/", get(handlers::get_store).patch(handlers::update_store))
        .route("/permissions", get(handlers::list_permissions))
        .route("/permissions/:benefit", get(handlers::check_permission))
        .route("/usage/:feature", get(handlers::usage_status).post(handlers::consume_usage))
        .route("/payment-gateways", get(handlers::gateway_control))
        .route("/payment-gateways/:gateway_id/activate", post(handlers::activate_gateway))
        .route("/checkout-options", get(handlers::checkout_options))
        .route("/price-model", get(handlers::get_price_model).put(handlers::put_price_model))
        .route("/variation-groups", get(handlers::variation_groups))
        .route("/products/:product_id/tiers", get(handlers::get_tiers).put(handlers::put_tiers))
        .route("/products/:product_id/tiers/generate", post(handlers::generate_tiers))
        .route("/products/:product_id/tiers/:tier_order", patch(handlers::toggle_tier))
        .route("/products/:product_id/price", get(handlers::quote_price))
        .route("/products/:product_id/stock/reserve", post(handlers::reserve_stock))
        .route("/products/:product_id/stock/release", post(handlers::release_stock))
        .route("/orders/:order_id/payment-status", get(handlers::payment_status))
        .route("/orders/:order_id/payments", post(handlers::record_payment))
        .route("/orders/:order_id/payments/:payment_id", put(handlers::update_payment))
        .route("/banners", get(handlers::banners));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "tenant-storefront"})) }))
        .nest("/api/v1/stores/:store_id", store_routes)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
