//! Stripe Webhook Handling
//!
//! Verifies event signatures against the shared signing secret and settles
//! invoices for payment intents that succeeded outside their own invoice
//! (the manual-intent fallback of the subscription flow).

use std::sync::Arc;

use stripe::{Event, EventObject, EventType, Webhook};

use crate::client::StripeClient;
use crate::error::{PaymentError, Result};

/// Webhook handler
pub struct WebhookHandler {
    stripe: Arc<StripeClient>,
}

impl WebhookHandler {
    pub fn new(stripe: Arc<StripeClient>) -> Self {
        Self { stripe }
    }

    /// Verify webhook signature and parse event.
    ///
    /// A signature mismatch fails here; nothing gets processed.
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, self.stripe.webhook_secret())
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Process a verified event. Unrecognized types are accepted and ignored.
    pub async fn handle(&self, event: Event) -> Result<()> {
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");

        match event.type_ {
            EventType::PaymentIntentSucceeded => {
                let EventObject::PaymentIntent(intent) = event.data.object else {
                    return Err(PaymentError::WebhookParse(
                        "Invalid payment intent data".into(),
                    ));
                };

                tracing::info!(
                    intent_id = %intent.id,
                    amount = intent.amount,
                    "Payment intent succeeded"
                );

                let invoice_id = intent.metadata.get("invoice_id");
                let subscription_id = intent.metadata.get("subscription_id");

                if let (Some(invoice_id), Some(_)) = (invoice_id, subscription_id) {
                    let id = invoice_id
                        .parse()
                        .map_err(|_| PaymentError::InvalidId(invoice_id.clone()))?;
                    let invoice = self.stripe.retrieve_invoice(&id).await?;

                    if invoice.status != Some(stripe::InvoiceStatus::Paid) {
                        self.stripe.pay_invoice_out_of_band(&id).await?;
                        tracing::info!(invoice_id = %id, "Invoice marked as paid");
                    }
                }
            }

            EventType::InvoicePaymentSucceeded => {
                if let EventObject::Invoice(invoice) = event.data.object {
                    tracing::info!(invoice_id = %invoice.id, "Invoice payment succeeded");
                }
            }

            other => {
                tracing::debug!(event_type = ?other, "Unhandled webhook event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> WebhookHandler {
        WebhookHandler::new(Arc::new(StripeClient::new("sk_test_x", "whsec_test")))
    }

    #[test]
    fn test_invalid_signature_is_rejected() {
        let payload = r#"{"id": "evt_1", "object": "event"}"#;
        let result = handler().parse_event(payload, "t=1,v1=deadbeef");

        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
    }

    #[test]
    fn test_garbage_signature_header_is_rejected() {
        let result = handler().parse_event("{}", "not-a-signature");
        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
    }
}
