//! API Client
//!
//! HTTP gateway to the elevate-server endpoints, with per-attempt timeout
//! and error classification so the core retry helper can decide what to
//! re-attempt. All paths are same-origin; the server serves the bundle.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::{select, Either, LocalBoxFuture};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use wasm_bindgen::JsValue;

use elevate_core::catalog::LivePrice;
use elevate_core::{
    CheckoutGateway, CheckoutSessionInit, CheckoutStatus, Result, RetryPolicy, WizardError,
};

/// Resolve after `duration`, via the browser's timer
pub fn js_sleep(duration: Duration) -> LocalBoxFuture<'static, ()> {
    Box::pin(async move {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().and_then(|w| {
                w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                    .ok()
            });
            if scheduled.is_none() {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
    })
}

/// Race a request against the policy deadline
async fn with_timeout<T>(
    timeout: Duration,
    request: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    futures::pin_mut!(request);
    match select(request, js_sleep(timeout)).await {
        Either::Left((outcome, _)) => outcome,
        Either::Right(((), _)) => Err(WizardError::Timeout),
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct PricesResponse {
    prices: Vec<LivePrice>,
}

#[derive(Deserialize)]
struct PortalResponse {
    url: String,
}

/// Gateway implementation over the server's JSON API
pub struct HttpGateway {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpGateway {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            policy,
        }
    }

    fn transport_error(e: reqwest::Error) -> WizardError {
        WizardError::Unreachable(e.to_string())
    }

    /// Classify a non-success response; 408/429 keep their retryable nature
    async fn response_error(response: reqwest::Response) -> WizardError {
        let status = response.status().as_u16();
        match status {
            408 => WizardError::Timeout,
            429 => WizardError::RateLimited,
            code if code >= 500 => WizardError::Status(code),
            code => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .map(|b| b.error)
                    .unwrap_or_default();
                WizardError::Payments {
                    code: code.to_string(),
                    message,
                }
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::response_error(response).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| WizardError::Unreachable(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = async {
            let response = self
                .client
                .get(path)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::read_json(response).await
        };
        with_timeout(self.policy.timeout, request).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let request = async {
            let response = self
                .client
                .post(path)
                .json(body)
                .send()
                .await
                .map_err(Self::transport_error)?;
            Self::read_json(response).await
        };
        with_timeout(self.policy.timeout, request).await
    }
}

#[async_trait(?Send)]
impl CheckoutGateway for HttpGateway {
    async fn fetch_prices(&self) -> Result<Vec<LivePrice>> {
        let response: PricesResponse = self.get_json("/api/stripe/prices").await?;
        Ok(response.prices)
    }

    async fn create_checkout_session(
        &self,
        price_id: &str,
        email: &str,
    ) -> Result<CheckoutSessionInit> {
        self.post_json(
            "/api/create-checkout-session",
            &json!({ "priceId": price_id, "email": email }),
        )
        .await
    }

    async fn checkout_status(&self, session_id: &str) -> Result<CheckoutStatus> {
        self.get_json(&format!("/api/checkout-status?session_id={session_id}"))
            .await
    }

    async fn create_portal_session(&self, customer_id: &str) -> Result<String> {
        let response: PortalResponse = self
            .post_json(
                "/api/create-portal-session",
                &json!({ "customerId": customer_id }),
            )
            .await?;
        Ok(response.url)
    }
}
