//! rust-market HTTP Server
//!
//! Axum-based server for the learning-resource marketplace: catalog,
//! checkout initiation, the order-status endpoint the payment popup
//! polls, wallets, and the gateway notify callback.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_core::{
    MemoryAccountStore, MemoryOrderStore, MemoryResourceStore, Resource, ResourceStore,
};
use market_payments::GatewayClient;

use crate::handlers::{
    create_checkout, gateway_notify, get_resource, get_wallet, health_check, list_resources,
    order_status,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize stores
    let orders = Arc::new(MemoryOrderStore::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    let resources = Arc::new(MemoryResourceStore::new());

    seed_catalog(resources.as_ref())?;
    let catalog = resources.list()?;
    tracing::info!("Seeded {} catalog resources:", catalog.len());
    for resource in &catalog {
        tracing::info!("  • {} ({} coins)", resource.title, resource.price_coins);
    }

    // Initialize payments
    let gateway = GatewayClient::from_env().ok();

    if gateway.is_some() {
        tracing::info!("✓ Payment gateway configured");
    } else {
        tracing::warn!("⚠ Payment gateway not configured - payments disabled");
        tracing::warn!("  Set GATEWAY_PAYMENT_URL, GATEWAY_MERCHANT_ID, GATEWAY_SECRET,");
        tracing::warn!("  GATEWAY_RETURN_URL and GATEWAY_NOTIFY_URL in .env");
    }

    // Build application state
    let state = AppState {
        orders,
        accounts,
        resources,
        gateway: gateway.map(Arc::new),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & catalog
        .route("/health", get(health_check))
        .route("/api/resources", get(list_resources))
        .route("/api/resources/{id}", get(get_resource))

        // Payments
        .route("/api/checkout", post(create_checkout))
        .route("/api/orders/{order_no}", get(order_status))
        .route("/api/users/{user_id}/wallet", get(get_wallet))
        .route("/notify/gateway", post(gateway_notify))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 rust-market server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  GET  /api/resources               - List catalog");
    tracing::info!("  GET  /api/resources/{{id}}          - Resource detail");
    tracing::info!("  POST /api/checkout                - Create checkout");
    tracing::info!("  GET  /api/orders/{{order_no}}       - Order status (polled)");
    tracing::info!("  GET  /api/users/{{user_id}}/wallet  - Wallet");
    tracing::info!("  POST /notify/gateway              - Gateway callback");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Seed the in-memory catalog with a few resources
fn seed_catalog(resources: &MemoryResourceStore) -> anyhow::Result<()> {
    let catalog = vec![
        Resource::new(1, "Practical Rust", "A. Chen", "programming", 120)
            .with_summary("Ownership, borrowing, and the habits that make Rust stick."),
        Resource::new(2, "Async Patterns Cookbook", "M. Rivera", "programming", 200)
            .with_summary("Timers, retries, and structured concurrency recipes."),
        Resource::new(3, "Pricing Your Courses", "J. Okafor", "business", 90)
            .with_summary("A short guide to pricing digital learning material."),
        Resource::new(4, "Getting Started Notes", "A. Chen", "programming", 0)
            .with_summary("Free companion notes for the Practical Rust course."),
    ];

    for resource in &catalog {
        resources.save(resource)?;
    }

    Ok(())
}
