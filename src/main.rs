//! Tenant Storefront - plan-gated multi-tenant storefront service

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tenant_storefront::{api, cache::StoreCache, config::AppConfig, db, messaging};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");
    let db = db::create_pool(&config).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let events = messaging::connect(config.nats_url.as_deref()).await;
    let state = api::AppState::new(db, StoreCache::new(config.store_cache_ttl), events);

    let addr = config.socket_addr();
    tracing::info!("Tenant storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, api::router(state)).await?;
    Ok(())
}
