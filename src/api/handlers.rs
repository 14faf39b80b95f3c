//! Route handlers. Each resolves the store's plan permissions before touching a gated feature.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ActorRole, ApiError, AppState};
use crate::db;
use crate::domain::aggregates::{
    Access, BenefitKey, CheckoutOptions, FeatureType, PaymentGatewayControl, PaymentState, PaymentSummary, PlanPermissions,
    PriceModel, PriceQuote, PriceTier, PriceTierSet, ProductError, ResolvedBanner, Role, StockError, StockLevel, Store,
    StoreSettingsUpdate, UsageDecision, UsageStatus, VariationGroup,
};
use crate::domain::aggregates::product::resolve_variation_groups;
use crate::domain::aggregates::usage::UnknownFeature;
use crate::domain::value_objects::{LimitValue, OrderId, PaymentId, ProductId, StoreId, VariationId};
use crate::Error;

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn permissions(s: &AppState, store_id: StoreId, role: Role) -> crate::Result<(Store, PlanPermissions)> {
    let store = s.store(store_id).await?;
    let perms = db::plans::load_permissions(&s.db, &store, role, Utc::now()).await?;
    Ok((store, perms))
}

fn require(perms: &PlanPermissions, benefit: BenefitKey) -> crate::Result<LimitValue> {
    match perms.check(&benefit) {
        Access::Granted { limit } => Ok(limit),
        Access::Denied { reason } => {
            tracing::info!(benefit = %benefit.as_str(), ?reason, "feature gated");
            Err(Error::FeatureNotAvailable { benefit, reason })
        }
    }
}

fn stock_error(e: ProductError) -> Error {
    match e {
        ProductError::Stock(StockError::Insufficient { .. }) => Error::InsufficientStock,
        other => other.into(),
    }
}

// Store settings

pub(super) async fn get_store(State(s): State<AppState>, Path(store_id): Path<StoreId>) -> ApiResult<Store> {
    Ok(Json(s.store(store_id).await?))
}

pub(super) async fn update_store(State(s): State<AppState>, Path(store_id): Path<StoreId>, Json(r): Json<StoreSettingsUpdate>) -> ApiResult<Store> {
    r.validate()?;
    let mut store = db::stores::get_store(&s.db, store_id).await?;
    store.apply(r);
    db::stores::update_store(&s.db, &store).await?;
    s.stores.invalidate(store_id).await;
    tracing::info!(%store_id, "store settings updated");
    Ok(Json(store))
}

// Plan permissions

#[derive(Debug, Serialize)] pub struct BenefitAccess { pub benefit: BenefitKey, #[serde(flatten)] pub access: Access }
#[derive(Debug, Serialize)] pub struct PermissionsResponse { pub store_id: StoreId, pub role: Role, pub benefits: Vec<BenefitAccess> }

pub(super) async fn list_permissions(State(s): State<AppState>, Path(store_id): Path<StoreId>, ActorRole(role): ActorRole) -> ApiResult<PermissionsResponse> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let benefits = perms.summary().into_iter().map(|(benefit, access)| BenefitAccess { benefit, access }).collect();
    Ok(Json(PermissionsResponse { store_id, role, benefits }))
}

pub(super) async fn check_permission(State(s): State<AppState>, Path((store_id, benefit)): Path<(StoreId, String)>, ActorRole(role): ActorRole) -> ApiResult<BenefitAccess> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let benefit = BenefitKey::from(benefit);
    let access = perms.check(&benefit);
    Ok(Json(BenefitAccess { benefit, access }))
}

// Usage metering

#[derive(Debug, Deserialize, Validate)] pub struct ConsumeRequest { #[validate(range(min = 1, max = 1000))] pub amount: u32 }

fn parse_feature(raw: &str) -> Result<FeatureType, ApiError> {
    raw.parse().map_err(|e: UnknownFeature| ApiError::bad_request(e.to_string()))
}

#[derive(Debug, Deserialize)] pub struct UsageQuery { pub amount: Option<u32> }
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    #[serde(flatten)]
    pub status: UsageStatus,
    /// Whether `amount` more uses would be accepted right now; nothing is recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preflight: Option<UsageDecision>,
}

pub(super) async fn usage_status(
    State(s): State<AppState>,
    Path((store_id, feature)): Path<(StoreId, String)>,
    ActorRole(role): ActorRole,
    Query(q): Query<UsageQuery>,
) -> ApiResult<UsageResponse> {
    let feature = parse_feature(&feature)?;
    let (_, perms) = permissions(&s, store_id, role).await?;
    let now = Utc::now();
    let status = s.meter.status(&perms, store_id, feature, now).await?;
    let preflight = match q.amount {
        Some(0) => return Err(Error::InvalidQuantity.into()),
        Some(amount) => Some(s.meter.preflight(&perms, store_id, feature, u64::from(amount), now).await?),
        None => None,
    };
    Ok(Json(UsageResponse { status, preflight }))
}

pub(super) async fn consume_usage(
    State(s): State<AppState>,
    Path((store_id, feature)): Path<(StoreId, String)>,
    ActorRole(role): ActorRole,
    Json(r): Json<ConsumeRequest>,
) -> ApiResult<UsageStatus> {
    let feature = parse_feature(&feature)?;
    r.validate()?;
    let (_, perms) = permissions(&s, store_id, role).await?;
    Ok(Json(s.meter.consume(&perms, store_id, feature, u64::from(r.amount), Utc::now()).await?))
}

// Payment gateways and checkout

pub(super) async fn gateway_control(State(s): State<AppState>, Path(store_id): Path<StoreId>, ActorRole(role): ActorRole) -> ApiResult<PaymentGatewayControl> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let active = db::stores::count_active_gateways(&s.db, store_id).await?;
    Ok(Json(PaymentGatewayControl::new(&perms, active)))
}

pub(super) async fn activate_gateway(State(s): State<AppState>, Path((store_id, gateway_id)): Path<(StoreId, Uuid)>, ActorRole(role): ActorRole) -> ApiResult<PaymentGatewayControl> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let limit = require(&perms, BenefitKey::PaymentGateways)?;
    db::stores::activate_gateway(&s.db, store_id, gateway_id, limit).await?;
    let active = db::stores::count_active_gateways(&s.db, store_id).await?;
    tracing::info!(%store_id, %gateway_id, active, "payment gateway activated");
    Ok(Json(PaymentGatewayControl::new(&perms, active)))
}

#[derive(Debug, Serialize)] pub struct CheckoutResponse { pub available: bool, #[serde(flatten)] pub options: CheckoutOptions }

pub(super) async fn checkout_options(State(s): State<AppState>, Path(store_id): Path<StoreId>, ActorRole(role): ActorRole) -> ApiResult<CheckoutResponse> {
    let (store, perms) = permissions(&s, store_id, role).await?;
    let active = db::stores::count_active_gateways(&s.db, store_id).await?;
    let options = CheckoutOptions::resolve(&perms, &store, active);
    Ok(Json(CheckoutResponse { available: options.is_available(), options }))
}

// Pricing

pub(super) async fn get_price_model(State(s): State<AppState>, Path(store_id): Path<StoreId>) -> ApiResult<Option<PriceModel>> {
    Ok(Json(db::products::get_price_model(&s.db, store_id).await?))
}

pub(super) async fn put_price_model(State(s): State<AppState>, Path(store_id): Path<StoreId>, ActorRole(role): ActorRole, Json(model): Json<PriceModel>) -> ApiResult<PriceModel> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    if model != PriceModel::Retail { require(&perms, BenefitKey::WholesalePricing)?; }
    // Shape check against a nominal retail price.
    model.generate(Decimal::ONE_HUNDRED)?;
    db::products::save_price_model(&s.db, store_id, &model).await?;
    Ok(Json(model))
}

pub(super) async fn variation_groups(State(s): State<AppState>, Path(store_id): Path<StoreId>) -> ApiResult<Vec<VariationGroup>> {
    let (own, master) = db::products::variation_groups(&s.db, store_id).await?;
    Ok(Json(resolve_variation_groups(&own, &master)))
}

#[derive(Debug, Serialize)] pub struct TiersResponse { pub product_id: ProductId, pub tiers: PriceTierSet }
#[derive(Debug, Deserialize)] pub struct GenerateTiersRequest { pub model: Option<PriceModel> }
#[derive(Debug, Deserialize)] pub struct ToggleTierRequest { pub is_enabled: bool }

pub(super) async fn get_tiers(State(s): State<AppState>, Path((store_id, product_id)): Path<(StoreId, ProductId)>) -> ApiResult<TiersResponse> {
    let product = db::products::get_product(&s.db, store_id, product_id).await?;
    Ok(Json(TiersResponse { product_id, tiers: product.tiers().clone() }))
}

pub(super) async fn put_tiers(
    State(s): State<AppState>,
    Path((store_id, product_id)): Path<(StoreId, ProductId)>,
    ActorRole(role): ActorRole,
    Json(tiers): Json<Vec<PriceTier>>,
) -> ApiResult<TiersResponse> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    if tiers.len() > 1 { require(&perms, BenefitKey::WholesalePricing)?; }
    let tiers = PriceTierSet::new(tiers)?;
    let mut product = db::products::get_product(&s.db, store_id, product_id).await?;
    product.replace_tiers(tiers)?;
    db::products::save_tiers(&s.db, &product).await?;
    s.events.publish_all(product.take_events()).await;
    Ok(Json(TiersResponse { product_id, tiers: product.tiers().clone() }))
}

pub(super) async fn generate_tiers(
    State(s): State<AppState>,
    Path((store_id, product_id)): Path<(StoreId, ProductId)>,
    ActorRole(role): ActorRole,
    Json(r): Json<GenerateTiersRequest>,
) -> ApiResult<TiersResponse> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let model = match r.model {
        Some(model) => model,
        None => db::products::get_price_model(&s.db, store_id).await?.ok_or_else(|| Error::Validation("store has no price model".into()))?,
    };
    if model != PriceModel::Retail { require(&perms, BenefitKey::WholesalePricing)?; }
    let mut product = db::products::get_product(&s.db, store_id, product_id).await?;
    product.apply_price_model(&model)?;
    db::products::save_tiers(&s.db, &product).await?;
    s.events.publish_all(product.take_events()).await;
    tracing::info!(%store_id, %product_id, tiers = product.tiers().tiers().len(), "price tiers generated");
    Ok(Json(TiersResponse { product_id, tiers: product.tiers().clone() }))
}

pub(super) async fn toggle_tier(
    State(s): State<AppState>,
    Path((store_id, product_id, tier_order)): Path<(StoreId, ProductId, u32)>,
    ActorRole(role): ActorRole,
    Json(r): Json<ToggleTierRequest>,
) -> ApiResult<TiersResponse> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    require(&perms, BenefitKey::WholesalePricing)?;
    let mut product = db::products::get_product(&s.db, store_id, product_id).await?;
    product.set_tier_enabled(tier_order, r.is_enabled)?;
    db::products::save_tiers(&s.db, &product).await?;
    s.events.publish_all(product.take_events()).await;
    Ok(Json(TiersResponse { product_id, tiers: product.tiers().clone() }))
}

#[derive(Debug, Deserialize)] pub struct QuoteParams { pub quantity: u32, pub variation_id: Option<VariationId> }

pub(super) async fn quote_price(
    State(s): State<AppState>,
    Path((store_id, product_id)): Path<(StoreId, ProductId)>,
    ActorRole(role): ActorRole,
    Query(p): Query<QuoteParams>,
) -> ApiResult<PriceQuote> {
    let (_, perms) = permissions(&s, store_id, role).await?;
    let product = db::products::get_product(&s.db, store_id, product_id).await?;
    let wholesale = perms.has_access(&BenefitKey::WholesalePricing);
    Ok(Json(product.quote(p.quantity, p.variation_id, wholesale).map_err(|e| match e {
        ProductError::InvalidQuantity => Error::InvalidQuantity,
        other => other.into(),
    })?))
}

// Stock

#[derive(Debug, Deserialize, Validate)] pub struct StockRequest { #[validate(range(min = 1))] pub quantity: u32 }
#[derive(Debug, Serialize)] pub struct StockResponse { pub product_id: ProductId, pub stock: i64, pub reserved: i64, pub available: i64 }

impl StockResponse {
    fn new(product_id: ProductId, level: StockLevel) -> Self {
        Self { product_id, stock: level.stock, reserved: level.reserved, available: level.available() }
    }
}

pub(super) async fn reserve_stock(State(s): State<AppState>, Path((store_id, product_id)): Path<(StoreId, ProductId)>, Json(r): Json<StockRequest>) -> ApiResult<StockResponse> {
    r.validate()?;
    let mut product = db::products::get_product(&s.db, store_id, product_id).await?;
    product.reserve(r.quantity).map_err(stock_error)?;
    // The row may have moved since the read; the update re-checks availability.
    let level = db::products::reserve_stock(&s.db, store_id, product_id, r.quantity).await?;
    s.events.publish_all(product.take_events()).await;
    Ok(Json(StockResponse::new(product_id, level)))
}

pub(super) async fn release_stock(State(s): State<AppState>, Path((store_id, product_id)): Path<(StoreId, ProductId)>, Json(r): Json<StockRequest>) -> ApiResult<StockResponse> {
    r.validate()?;
    let mut product = db::products::get_product(&s.db, store_id, product_id).await?;
    product.release(r.quantity).map_err(stock_error)?;
    let level = db::products::release_stock(&s.db, store_id, product_id, r.quantity).await?;
    s.events.publish_all(product.take_events()).await;
    Ok(Json(StockResponse::new(product_id, level)))
}

// Payments

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub method: String,
    #[serde(default)]
    pub status: PaymentState,
}

#[derive(Debug, Deserialize)] pub struct UpdatePaymentRequest { pub status: PaymentState }

pub(super) async fn payment_status(State(s): State<AppState>, Path((store_id, order_id)): Path<(StoreId, OrderId)>) -> ApiResult<PaymentSummary> {
    let order = db::orders::get_order(&s.db, store_id, order_id).await?;
    Ok(Json(order.payment_summary()))
}

pub(super) async fn record_payment(
    State(s): State<AppState>,
    Path((store_id, order_id)): Path<(StoreId, OrderId)>,
    Json(r): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentSummary>), ApiError> {
    r.validate()?;
    let mut order = db::orders::get_order(&s.db, store_id, order_id).await?;
    let payment_id = order.record_payment(r.amount, r.method, r.status)?;
    let payment = order.payments().iter().find(|p| p.id == payment_id).ok_or_else(|| Error::InvalidData("recorded payment missing".into()))?;
    db::orders::insert_payment(&s.db, payment).await?;
    s.events.publish_all(order.take_events()).await;
    let summary = order.payment_summary();
    tracing::info!(%order_id, %payment_id, status = ?summary.status, "payment recorded");
    Ok((StatusCode::CREATED, Json(summary)))
}

pub(super) async fn update_payment(
    State(s): State<AppState>,
    Path((store_id, order_id, payment_id)): Path<(StoreId, OrderId, PaymentId)>,
    Json(r): Json<UpdatePaymentRequest>,
) -> ApiResult<PaymentSummary> {
    let mut order = db::orders::get_order(&s.db, store_id, order_id).await?;
    order.update_payment(payment_id, r.status)?;
    db::orders::update_payment_status(&s.db, store_id, payment_id, r.status).await?;
    s.events.publish_all(order.take_events()).await;
    Ok(Json(order.payment_summary()))
}

// Banners

pub(super) async fn banners(State(s): State<AppState>, Path(store_id): Path<StoreId>) -> ApiResult<Vec<ResolvedBanner>> {
    let mut resolved = Vec::new();
    for banner in db::banners::list_active(&s.db, store_id).await? {
        let product = match banner.product_id() {
            Some(product_id) => match db::products::get_product(&s.db, store_id, product_id).await {
                Ok(product) => Some(product),
                Err(Error::ProductNotFound) => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        resolved.extend(banner.resolve(product.as_ref()));
    }
    Ok(Json(resolved))
}
