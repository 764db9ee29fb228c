//! Courier Server - Main Entry Point
//!
//! Scheduled webhook delivery backend.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use courier_server::delivery::{
    DeliveryCache, PgMessageStore, RedisDeliveryCache, Scheduler, WebhookTransport,
};
use courier_server::{api, config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Courier Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    // Initialize Redis (optional - delivery caching is disabled if unreachable)
    let cache: Option<Arc<dyn DeliveryCache>> = match db::create_redis_client(&config.redis_url)
        .await
    {
        Ok(client) => {
            info!(ttl_secs = config.delivery_cache_ttl_secs, "Delivery cache enabled");
            Some(Arc::new(RedisDeliveryCache::new(client, config.delivery_cache_ttl_secs))
                as Arc<dyn DeliveryCache>)
        }
        Err(e) => {
            tracing::warn!("Redis connection failed: {}. Delivery caching disabled.", e);
            None
        }
    };

    // Initialize webhook transport
    let transport = WebhookTransport::new(
        config.webhook_url.clone(),
        config.webhook_timeout(),
        config.dry_run,
    )
    .context("Failed to build webhook HTTP client")?;
    info!(
        webhook_url = %config.webhook_url,
        dry_run = transport.is_dry_run(),
        "Webhook transport initialized"
    );

    // Delivery scheduler starts stopped; it is started through the API
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(PgMessageStore::new(db_pool)),
        Arc::new(transport),
        cache.clone(),
        config.scheduler(),
    ));

    // Build application state
    let state = api::AppState::new(Arc::clone(&scheduler), cache, config.clone());

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    scheduler.shutdown().await;
    info!("Server shutdown complete");

    Ok(())
}
