//! REST Directory Client
//!
//! Pass-through adapter to the identity/document platform's HTTP API:
//! account sign-up, email lookup, and the profile document store. Works on
//! both native and wasm targets through `reqwest`.

use std::cell::RefCell;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use elevate_core::{AccountDirectory, ProfileDocument, Result, WizardError};

use crate::error::map_error_code;

/// Identity platform endpoints and credentials
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    /// Public web API key, sent as a query parameter
    pub api_key: String,
    /// Base URL of the account API
    pub auth_url: String,
    /// Base URL of the document store (profiles live under `/users/{id}`)
    pub docs_url: String,
}

impl DirectoryConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("IDENTITY_API_KEY")
            .map_err(|_| WizardError::Config("IDENTITY_API_KEY not set".into()))?;
        let auth_url = std::env::var("IDENTITY_AUTH_URL")
            .map_err(|_| WizardError::Config("IDENTITY_AUTH_URL not set".into()))?;
        let docs_url = std::env::var("IDENTITY_DOCS_URL")
            .map_err(|_| WizardError::Config("IDENTITY_DOCS_URL not set".into()))?;

        Ok(Self {
            api_key,
            auth_url,
            docs_url,
        })
    }
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(rename = "localId")]
    local_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    registered: bool,
}

#[derive(Deserialize)]
struct PlatformErrorBody {
    error: PlatformErrorDetail,
}

#[derive(Deserialize)]
struct PlatformErrorDetail {
    message: String,
}

/// REST implementation of the account directory port
pub struct RestDirectory {
    client: reqwest::Client,
    config: DirectoryConfig,
    /// Subject id of the federated session, set after third-party sign-in
    federated_subject: RefCell<Option<String>>,
}

impl RestDirectory {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            federated_subject: RefCell::new(None),
        }
    }

    /// Record the subject of an established federated session
    pub fn set_federated_session(&self, subject_id: impl Into<String>) {
        *self.federated_subject.borrow_mut() = Some(subject_id.into());
    }

    pub fn clear_federated_session(&self) {
        *self.federated_subject.borrow_mut() = None;
    }

    fn auth_endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1/accounts:{action}?key={}",
            self.config.auth_url, self.config.api_key
        )
    }

    /// Convert a transport failure into the wizard taxonomy
    fn transport_error(e: reqwest::Error) -> WizardError {
        if e.is_timeout() {
            WizardError::Timeout
        } else {
            WizardError::Unreachable(e.to_string())
        }
    }

    /// Extract and map the platform error code from a non-success response
    async fn platform_error(response: reqwest::Response) -> WizardError {
        let status = response.status().as_u16();
        match response.json::<PlatformErrorBody>().await {
            Ok(body) => map_error_code(&body.error.message),
            Err(_) => WizardError::Status(status),
        }
    }
}

#[async_trait(?Send)]
impl AccountDirectory for RestDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.auth_endpoint("createAuthUri"))
            .json(&json!({
                "identifier": email,
                "continueUri": "http://localhost",
            }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::platform_error(response).await);
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| WizardError::Unreachable(e.to_string()))?;
        tracing::debug!(email, exists = lookup.registered, "Email lookup");
        Ok(lookup.registered)
    }

    async fn federated_subject(&self) -> Result<Option<String>> {
        Ok(self.federated_subject.borrow().clone())
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<String> {
        let response = self
            .client
            .post(self.auth_endpoint("signUp"))
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::platform_error(response).await);
        }

        let created: SignUpResponse = response
            .json()
            .await
            .map_err(|e| WizardError::Unreachable(e.to_string()))?;
        tracing::info!(subject_id = %created.local_id, "Identity record created");
        Ok(created.local_id)
    }

    async fn save_profile(&self, doc: &ProfileDocument) -> Result<()> {
        let url = format!(
            "{}/users/{}?key={}",
            self.config.docs_url, doc.subject_id, self.config.api_key
        );

        let response = self
            .client
            .put(url)
            .json(doc)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::platform_error(response).await);
        }

        tracing::info!(subject_id = %doc.subject_id, "Profile document saved");
        Ok(())
    }
}
