//! Stripe Client
//!
//! Wrapper around the payments platform covering everything the wizard and
//! its server need: embedded checkout sessions, session status, manual
//! subscriptions, payment intents, the billing portal and live prices.

use serde::{Deserialize, Serialize};
use stripe::{
    BillingPortalSession, CheckoutSession, CheckoutSessionId, CheckoutSessionMode,
    CheckoutSessionUiMode, Client, CreateBillingPortalSession, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCustomer, CreatePaymentIntent, CreateSubscription,
    CreateSubscriptionItems, CreateSubscriptionPaymentSettings,
    CreateSubscriptionPaymentSettingsSaveDefaultPaymentMethod, Currency, Customer, Expandable,
    Invoice, InvoiceId, InvoiceStatus, ListCustomers, PaymentIntent, PaymentIntentId,
    PaymentIntentStatus, Price, PriceId, RecurringInterval, Subscription, SubscriptionId,
    SubscriptionPaymentBehavior,
};

use crate::error::{PaymentError, Result};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Find an existing customer by email, or create one
    async fn find_or_create_customer(&self, email: &str) -> Result<Customer> {
        let mut list = ListCustomers::new();
        list.email = Some(email);
        list.limit = Some(1);

        let existing = Customer::list(&self.client, &list)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        if let Some(customer) = existing.data.into_iter().next() {
            tracing::debug!(customer_id = %customer.id, "Reusing existing customer");
            return Ok(customer);
        }

        let mut params = CreateCustomer::new();
        params.email = Some(email);
        let customer = Customer::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        tracing::debug!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Create an embedded checkout session in subscription mode.
    ///
    /// `return_url` must carry the `{CHECKOUT_SESSION_ID}` placeholder so
    /// the browser comes back with the session id to reconcile.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        email: &str,
        return_url: &str,
    ) -> Result<EmbeddedCheckout> {
        let customer = self.find_or_create_customer(email).await?;

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Subscription);
        params.ui_mode = Some(CheckoutSessionUiMode::Embedded);
        params.customer = Some(customer.id.clone());
        params.return_url = Some(return_url);
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price: Some(price_id.to_string()),
            quantity: Some(1),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let client_secret = session
            .client_secret
            .ok_or_else(|| PaymentError::Stripe("No client secret returned".into()))?;

        tracing::info!(
            session_id = %session.id,
            customer_id = %customer.id,
            "Checkout session created"
        );

        Ok(EmbeddedCheckout {
            client_secret,
            session_id: session.id.to_string(),
            customer_id: customer.id.to_string(),
        })
    }

    /// Retrieve a checkout session's completion status
    pub async fn checkout_status(&self, session_id: &str) -> Result<CheckoutStatusSummary> {
        let id: CheckoutSessionId = session_id
            .parse()
            .map_err(|_| PaymentError::InvalidId(session_id.to_string()))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(CheckoutStatusSummary {
            status: session
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".into()),
            customer_email: session.customer_details.and_then(|d| d.email),
            customer_id: session.customer.map(|c| c.id().to_string()),
            subscription_id: session.subscription.map(|s| s.id().to_string()),
        })
    }

    /// Create an incomplete subscription and hand back a client secret for
    /// its first invoice's payment intent (raw payment-element flow).
    pub async fn create_subscription(
        &self,
        price_id: &str,
        email: &str,
    ) -> Result<SubscriptionInit> {
        let customer = self.find_or_create_customer(email).await?;

        let mut params = CreateSubscription::new(customer.id.clone());
        params.items = Some(vec![CreateSubscriptionItems {
            price: Some(price_id.to_string()),
            ..Default::default()
        }]);
        params.payment_behavior = Some(SubscriptionPaymentBehavior::DefaultIncomplete);
        params.payment_settings = Some(CreateSubscriptionPaymentSettings {
            save_default_payment_method: Some(
                CreateSubscriptionPaymentSettingsSaveDefaultPaymentMethod::OnSubscription,
            ),
            ..Default::default()
        });
        params.expand = &["latest_invoice.payment_intent"];

        let subscription = Subscription::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let invoice = match subscription.latest_invoice.clone() {
            Some(Expandable::Object(invoice)) => *invoice,
            _ => return Err(PaymentError::Stripe("Latest invoice not found".into())),
        };

        // The intent exists on the invoice unless collection is paused;
        // create one by hand in that case, tagged for webhook reconciliation.
        let client_secret = match invoice.payment_intent {
            Some(Expandable::Object(intent)) => intent
                .client_secret
                .ok_or_else(|| PaymentError::Stripe("No client secret on intent".into()))?,
            _ => {
                let amount = invoice
                    .amount_due
                    .ok_or_else(|| PaymentError::Stripe("Invoice has no amount due".into()))?;
                let currency = invoice.currency.unwrap_or(Currency::EUR);

                let mut intent_params = CreatePaymentIntent::new(amount, currency);
                intent_params.customer = Some(customer.id.clone());
                intent_params.metadata = Some(
                    [
                        ("subscription_id".to_string(), subscription.id.to_string()),
                        ("invoice_id".to_string(), invoice.id.to_string()),
                    ]
                    .into(),
                );

                let intent = PaymentIntent::create(&self.client, intent_params)
                    .await
                    .map_err(|e| PaymentError::Stripe(e.to_string()))?;

                tracing::info!(intent_id = %intent.id, "Payment intent created manually");
                intent
                    .client_secret
                    .ok_or_else(|| PaymentError::Stripe("No client secret on intent".into()))?
            }
        };

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %customer.id,
            "Subscription created"
        );

        Ok(SubscriptionInit {
            subscription_id: subscription.id.to_string(),
            client_secret,
            customer_id: customer.id.to_string(),
        })
    }

    /// Create a standalone payment intent for a catalog price
    pub async fn create_payment_intent(&self, price_id: &str) -> Result<String> {
        let id: PriceId = price_id
            .parse()
            .map_err(|_| PaymentError::InvalidId(price_id.to_string()))?;

        let price = Price::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let amount = price
            .unit_amount
            .ok_or_else(|| PaymentError::Stripe("Price has no amount".into()))?;
        let currency = price.currency.unwrap_or(Currency::EUR);

        let mut params = CreatePaymentIntent::new(amount, currency);
        params.metadata = Some([("price_id".to_string(), price_id.to_string())].into());

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        intent
            .client_secret
            .ok_or_else(|| PaymentError::Stripe("No client secret on intent".into()))
    }

    /// Create a billing-portal session for an existing customer
    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String> {
        let id = customer_id
            .parse()
            .map_err(|_| PaymentError::InvalidId(customer_id.to_string()))?;

        let mut params = CreateBillingPortalSession::new(id);
        params.return_url = Some(return_url);

        let session = BillingPortalSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(session.url)
    }

    /// Retrieve live pricing for the given price ids, products expanded
    pub async fn fetch_prices(&self, price_ids: &[&str]) -> Result<Vec<PriceSummary>> {
        let lookups = price_ids.iter().map(|&raw| async move {
            let id: PriceId = raw
                .parse()
                .map_err(|_| PaymentError::InvalidId(raw.to_string()))?;
            let price = Price::retrieve(&self.client, &id, &["product"])
                .await
                .map_err(|e| PaymentError::Stripe(e.to_string()))?;
            PriceSummary::from_price(price)
        });

        futures::future::try_join_all(lookups).await
    }

    /// Check a payment intent and settle its linked invoice if needed
    pub async fn verify_payment(&self, payment_intent_id: &str) -> Result<PaymentVerification> {
        let id: PaymentIntentId = payment_intent_id
            .parse()
            .map_err(|_| PaymentError::InvalidId(payment_intent_id.to_string()))?;

        let intent = PaymentIntent::retrieve(&self.client, &id, &["invoice"])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        if intent.status != PaymentIntentStatus::Succeeded {
            tracing::warn!(
                payment_intent_id,
                status = %intent.status,
                "Payment not succeeded"
            );
            return Ok(PaymentVerification {
                success: false,
                status: intent.status.to_string(),
                invoice: None,
                subscription: None,
            });
        }

        let Some(invoice_id) = intent.invoice.as_ref().map(|i| i.id()) else {
            tracing::warn!(payment_intent_id, "No invoice on payment intent");
            return Ok(PaymentVerification {
                success: true,
                status: "succeeded".into(),
                invoice: None,
                subscription: None,
            });
        };

        let invoice = self.retrieve_invoice(&invoice_id).await?;
        let subscription_id = invoice.subscription.as_ref().map(|s| s.id());

        let invoice = if invoice.status == Some(InvoiceStatus::Open) {
            let paid = self.pay_invoice_out_of_band(&invoice_id).await?;
            tracing::info!(invoice_id = %invoice_id, "Invoice marked as paid");
            paid
        } else {
            invoice
        };

        let subscription = match subscription_id {
            Some(sid) => Some(self.subscription_summary(&sid).await?),
            None => None,
        };

        Ok(PaymentVerification {
            success: true,
            status: "succeeded".into(),
            invoice: Some(InvoiceSummary {
                id: invoice.id.to_string(),
                status: invoice
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".into()),
            }),
            subscription,
        })
    }

    pub(crate) async fn retrieve_invoice(&self, invoice_id: &InvoiceId) -> Result<Invoice> {
        Invoice::retrieve(&self.client, invoice_id, &["subscription"])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))
    }

    /// Settle an invoice whose payment happened outside its own intent
    pub(crate) async fn pay_invoice_out_of_band(&self, invoice_id: &InvoiceId) -> Result<Invoice> {
        #[derive(Serialize)]
        struct PayInvoiceParams {
            paid_out_of_band: bool,
        }

        self.client
            .post_form(
                &format!("/invoices/{invoice_id}/pay"),
                PayInvoiceParams {
                    paid_out_of_band: true,
                },
            )
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))
    }

    async fn subscription_summary(&self, id: &SubscriptionId) -> Result<SubscriptionSummary> {
        let subscription = Subscription::retrieve(&self.client, id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        Ok(SubscriptionSummary {
            id: subscription.id.to_string(),
            status: subscription.status.to_string(),
        })
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Result of creating an embedded checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedCheckout {
    pub client_secret: String,
    pub session_id: String,
    pub customer_id: String,
}

/// Normalized checkout-session status
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutStatusSummary {
    pub status: String,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

/// Result of creating an incomplete subscription
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInit {
    pub subscription_id: String,
    pub client_secret: String,
    pub customer_id: String,
}

/// One live price, product expanded
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub id: String,
    /// Minor currency unit (cents)
    pub amount: i64,
    pub currency: String,
    pub interval: String,
    pub interval_count: u64,
    pub product_name: String,
    pub product_id: String,
}

impl PriceSummary {
    fn from_price(price: Price) -> Result<Self> {
        let recurring = price
            .recurring
            .as_ref()
            .ok_or_else(|| PaymentError::Stripe("Price is not recurring".into()))?;

        let (product_name, product_id) = match &price.product {
            Some(Expandable::Object(product)) => (
                product.name.clone().unwrap_or_default(),
                product.id.to_string(),
            ),
            Some(Expandable::Id(id)) => (String::new(), id.to_string()),
            None => return Err(PaymentError::Stripe("Price has no product".into())),
        };

        Ok(Self {
            id: price.id.to_string(),
            amount: price
                .unit_amount
                .ok_or_else(|| PaymentError::Stripe("Price has no amount".into()))?,
            currency: price
                .currency
                .map(|c| c.to_string())
                .unwrap_or_else(|| "eur".into()),
            interval: match recurring.interval {
                RecurringInterval::Year => "year".into(),
                RecurringInterval::Month => "month".into(),
                other => other.to_string(),
            },
            interval_count: recurring.interval_count,
            product_name,
            product_id,
        })
    }
}

/// Invoice status snippet reported by payment verification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: String,
    pub status: String,
}

/// Subscription status snippet reported by payment verification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: String,
}

/// Outcome of verifying a payment intent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionSummary>,
}
