//! Application State

use std::sync::Arc;

use elevate_payments::StripeClient;

/// Server configuration from the environment
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Public base URL of the application, used to build return URLs
    pub app_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
        }
    }

    /// Where the payment platform sends the browser back after checkout.
    ///
    /// The placeholder is substituted by the platform with the session id
    /// the wizard reconciles on return.
    pub fn checkout_return_url(&self) -> String {
        format!("{}/signup?session_id={{CHECKOUT_SESSION_ID}}", self.app_url)
    }

    /// Where the billing portal sends the user back
    pub fn portal_return_url(&self) -> String {
        format!("{}/signup?portal=done", self.app_url)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Stripe client (optional - None if not configured)
    pub stripe: Option<Arc<StripeClient>>,

    /// Server configuration
    pub config: Arc<ServerConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_urls_carry_the_session_placeholder() {
        let config = ServerConfig {
            app_url: "https://app.example.com".into(),
        };
        assert_eq!(
            config.checkout_return_url(),
            "https://app.example.com/signup?session_id={CHECKOUT_SESSION_ID}"
        );
        assert!(config.portal_return_url().starts_with("https://app.example.com/"));
    }
}
