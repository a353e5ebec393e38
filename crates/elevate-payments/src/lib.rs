//! # elevate-payments
//!
//! Server-side adapter to the payments platform. Covers the embedded
//! checkout flow the wizard drives, the raw subscription/payment-intent
//! fallbacks, the billing self-service portal, live price retrieval and
//! webhook processing.

pub mod client;
pub mod error;
pub mod webhook;

pub use client::{
    CheckoutStatusSummary, EmbeddedCheckout, InvoiceSummary, PaymentVerification, PriceSummary,
    StripeClient, SubscriptionInit, SubscriptionSummary,
};
pub use error::{PaymentError, Result};
pub use webhook::WebhookHandler;
