//! HTTP Handlers
//!
//! Stateless JSON endpoints in front of the payments platform. Every
//! handler validates its input (400 with error/details), maps adapter
//! failures to 500 with a loggable context, and returns normalized JSON.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use elevate_core::{catalog, validate};
use elevate_payments::{StripeClient, WebhookHandler};

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    pub price_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutStatusQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub price_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    pub price_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortalSessionRequest {
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_intent_id: String,
}

// ============================================================================
// Error Helpers
// ============================================================================

fn invalid_request(details: Vec<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request data", "details": details })),
    )
}

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn internal_error(message: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

fn payments_disabled() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "Payments not configured", "code": "PAYMENTS_DISABLED" })),
    )
}

fn stripe_or_unavailable(state: &AppState) -> Result<Arc<StripeClient>, ApiError> {
    state.stripe.clone().ok_or_else(payments_disabled)
}

fn require_known_price(price_id: &str) -> Result<(), ApiError> {
    if catalog::is_known_price_id(price_id) {
        Ok(())
    } else {
        tracing::warn!(price_id, "Unknown price id attempted");
        Err(bad_request("Invalid plan selected"))
    }
}

fn require_email(email: &str, details: &mut Vec<String>) {
    if !validate::is_well_formed_email(email) {
        details.push("email: invalid email address".into());
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "stripe_configured": state.stripe.is_some(),
    }))
}

/// Create an embedded checkout session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    let mut details = Vec::new();
    if payload.price_id.is_empty() {
        details.push("priceId: required".into());
    }
    require_email(&payload.email, &mut details);
    if !details.is_empty() {
        return Err(invalid_request(details));
    }
    require_known_price(&payload.price_id)?;

    tracing::info!(email = %payload.email, price_id = %payload.price_id, "Creating checkout session");

    let session = stripe
        .create_checkout_session(
            &payload.price_id,
            &payload.email,
            &state.config.checkout_return_url(),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Checkout session error");
            internal_error(e.user_message())
        })?;

    Ok(Json(json!({
        "clientSecret": session.client_secret,
        "sessionId": session.session_id,
        "customerId": session.customer_id,
    })))
}

/// Retrieve a checkout session's status for reconciliation
pub async fn checkout_status(
    State(state): State<AppState>,
    Query(query): Query<CheckoutStatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    let Some(session_id) = query.session_id.filter(|s| !s.is_empty()) else {
        return Err(bad_request("Session ID required"));
    };

    tracing::info!(session_id, "Retrieving checkout session status");

    let summary = stripe.checkout_status(&session_id).await.map_err(|e| {
        tracing::error!(error = %e, "Checkout status error");
        internal_error(e.user_message())
    })?;

    Ok(Json(json!({
        "status": summary.status,
        "customer_email": summary.customer_email,
        "customer_id": summary.customer_id,
        "subscription_id": summary.subscription_id,
    })))
}

/// Create an incomplete subscription (raw payment-element flow)
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    let mut details = Vec::new();
    if payload.price_id.is_empty() {
        details.push("priceId: required".into());
    }
    require_email(&payload.email, &mut details);
    if !details.is_empty() {
        return Err(invalid_request(details));
    }
    require_known_price(&payload.price_id)?;

    let init = stripe
        .create_subscription(&payload.price_id, &payload.email)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Subscription error");
            internal_error(e.user_message())
        })?;

    Ok(Json(json!({
        "subscriptionId": init.subscription_id,
        "clientSecret": init.client_secret,
        "customerId": init.customer_id,
    })))
}

/// Create a standalone payment intent for a catalog price
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentIntentRequest>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    if payload.price_id.is_empty() {
        return Err(invalid_request(vec!["priceId: required".into()]));
    }
    require_known_price(&payload.price_id)?;

    let client_secret = stripe
        .create_payment_intent(&payload.price_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Payment intent error");
            internal_error(e.user_message())
        })?;

    Ok(Json(json!({ "clientSecret": client_secret })))
}

/// Create a billing-portal session
pub async fn create_portal_session(
    State(state): State<AppState>,
    Json(payload): Json<CreatePortalSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    if payload.customer_id.is_empty() {
        return Err(invalid_request(vec!["customerId: required".into()]));
    }

    let url = stripe
        .create_portal_session(&payload.customer_id, &state.config.portal_return_url())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Portal session error");
            internal_error(e.user_message())
        })?;

    Ok(Json(json!({ "url": url })))
}

/// Verify a payment intent and settle its linked invoice
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    if payload.payment_intent_id.is_empty() {
        return Err(invalid_request(vec!["paymentIntentId: required".into()]));
    }

    tracing::info!(payment_intent_id = %payload.payment_intent_id, "Verifying payment");

    let verification = stripe
        .verify_payment(&payload.payment_intent_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Payment verification error");
            internal_error(e.user_message())
        })?;

    Ok(Json(serde_json::to_value(verification).map_err(|e| {
        tracing::error!(error = %e, "Verification serialization error");
        internal_error("Failed to verify payment")
    })?))
}

/// Live pricing for the catalog plans
pub async fn stripe_prices(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    let price_ids: Vec<&str> = catalog::PLAN_CATALOG.iter().map(|p| p.price_id).collect();

    let prices = stripe.fetch_prices(&price_ids).await.map_err(|e| {
        tracing::error!(error = %e, "Price retrieval error");
        internal_error("Failed to fetch prices")
    })?;

    Ok(Json(json!({ "prices": prices })))
}

/// Stripe webhook endpoint
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let stripe = stripe_or_unavailable(&state)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("No signature"))?;

    let handler = WebhookHandler::new(stripe);

    let event = handler.parse_event(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Webhook signature verification failed");
        bad_request("Invalid signature")
    })?;

    handler.handle(event).await.map_err(|e| {
        tracing::error!(error = %e, "Webhook handler error");
        internal_error("Webhook error")
    })?;

    Ok(Json(json!({ "received": true })))
}
