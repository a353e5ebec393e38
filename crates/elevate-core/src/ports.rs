//! Platform Ports
//!
//! Traits at the seams to the two external platforms and the browser. The
//! wizard controller only ever talks to these; concrete adapters live in
//! `elevate-identity` (REST directory), `elevate-web` (HTTP gateway,
//! browser windows) and the test suites (scripted mocks).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::LivePrice;
use crate::error::Result;
use crate::profile::ProfileDocument;

/// Payment-session lifecycle states reported by the status endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
    /// Anything the platform reports that the wizard has no handling for;
    /// treated as not complete
    #[serde(other)]
    Unknown,
}

/// Result of creating an embedded checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionInit {
    pub client_secret: String,
    pub session_id: String,
    pub customer_id: String,
}

/// Normalized checkout-session status used for reconciliation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutStatus {
    pub status: SessionStatus,
    pub customer_email: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

/// Calls the wizard makes against the payments backend
#[async_trait(?Send)]
pub trait CheckoutGateway {
    /// Live pricing for the catalog plans
    async fn fetch_prices(&self) -> Result<Vec<LivePrice>>;

    /// Create an embedded checkout session for the selected price
    async fn create_checkout_session(&self, price_id: &str, email: &str)
        -> Result<CheckoutSessionInit>;

    /// Status of a session the browser returned from
    async fn checkout_status(&self, session_id: &str) -> Result<CheckoutStatus>;

    /// Billing self-service portal URL for an existing customer
    async fn create_portal_session(&self, customer_id: &str) -> Result<String>;
}

/// Calls the wizard makes against the identity/document platform
#[async_trait(?Send)]
pub trait AccountDirectory {
    /// Whether an identity record already exists for this email
    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Subject id of the current federated session, if any
    async fn federated_subject(&self) -> Result<Option<String>>;

    /// Create a credentialed identity; returns the new subject id
    async fn create_account(&self, email: &str, password: &str) -> Result<String>;

    /// Write the durable profile document keyed by subject id
    async fn save_profile(&self, doc: &ProfileDocument) -> Result<()>;
}

/// Opaque handle to a window pre-opened for the portal handoff
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortalHandle(pub usize);

/// Browser window control for the billing-portal handoff.
///
/// Mobile browsers block popups opened after an await; the caller opens a
/// blank window synchronously on the user gesture, then navigates or closes
/// it once the URL resolves.
pub trait PortalWindows {
    /// Synchronously open a blank window; `None` when blocked
    fn open_blank(&self) -> Option<PortalHandle>;

    /// Point a pre-opened window at the resolved URL
    fn navigate(&self, handle: PortalHandle, url: &str);

    /// Navigate the current tab (fallback when the popup was blocked)
    fn navigate_current(&self, url: &str);

    /// Close a pre-opened window that will never get a URL
    fn close(&self, handle: PortalHandle);
}
