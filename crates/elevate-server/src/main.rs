//! Elevate HTTP Server
//!
//! Axum-based server exposing the payments API the signup wizard talks to,
//! plus the Stripe webhook endpoint and the static wasm frontend.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elevate_payments::StripeClient;

use crate::handlers::{
    checkout_status, create_checkout_session, create_payment_intent, create_portal_session,
    create_subscription, health_check, stripe_prices, stripe_webhook, verify_payment,
};
use crate::state::{AppState, ServerConfig};

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

    let config = Arc::new(ServerConfig::from_env());

    // Initialize payments
    let stripe = StripeClient::from_env().ok();

    if stripe.is_some() {
        tracing::info!("✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - payments disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }

    // Build application state
    let state = AppState {
        stripe: stripe.map(Arc::new),
        config,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Payments API
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route("/api/checkout-status", get(checkout_status))
        .route("/api/create-subscription", post(create_subscription))
        .route("/api/create-payment-intent", post(create_payment_intent))
        .route("/api/create-portal-session", post(create_portal_session))
        .route("/api/verify-payment", post(verify_payment))
        .route("/api/stripe/prices", get(stripe_prices))

        // Webhooks
        .route("/webhook/stripe", post(stripe_webhook))

        // Static files (WASM frontend)
        .nest_service("/", tower_http::services::ServeDir::new("static"))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 elevate-server running on http://{}", addr);
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                      - Health check");
    tracing::info!("  POST /api/create-checkout-session - Embedded checkout session");
    tracing::info!("  GET  /api/checkout-status         - Session status");
    tracing::info!("  POST /api/create-subscription     - Incomplete subscription");
    tracing::info!("  POST /api/create-payment-intent   - Standalone payment intent");
    tracing::info!("  POST /api/create-portal-session   - Billing portal");
    tracing::info!("  POST /api/verify-payment          - Verify + settle invoice");
    tracing::info!("  GET  /api/stripe/prices           - Live catalog prices");
    tracing::info!("  POST /webhook/stripe              - Stripe webhooks");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
