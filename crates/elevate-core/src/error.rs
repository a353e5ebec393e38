//! Error Types
//!
//! One taxonomy for every failure the wizard can surface. External platform
//! errors are mapped into these variants by the adapter crates; the
//! controller and the views only ever see this enum.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type alias for wizard operations
pub type Result<T> = std::result::Result<T, WizardError>;

/// Field name → user-facing message, shown inline next to the form field
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Wizard error taxonomy
#[derive(Error, Debug)]
pub enum WizardError {
    /// Form data rejected by a step validator
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    /// Email already has an identity record (step 1 uniqueness check)
    #[error("email already registered")]
    DuplicateResource,

    /// Request exceeded its deadline
    #[error("request timed out")]
    Timeout,

    /// Server could not be reached at all
    #[error("network unreachable: {0}")]
    Unreachable(String),

    /// Server answered with a non-success HTTP status
    #[error("HTTP {0}")]
    Status(u16),

    /// Rate limited by a platform
    #[error("rate limited")]
    RateLimited,

    /// Payments platform domain error
    #[error("payments platform error: {message}")]
    Payments { code: String, message: String },

    /// Identity platform domain error not covered by a dedicated variant
    #[error("identity platform error: {message}")]
    Identity { code: String, message: String },

    /// No authenticated federated session when one was required
    #[error("no authenticated session")]
    NotAuthenticated,

    /// Identity platform refused the email as already taken
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// Identity platform refused the password as too weak
    #[error("password rejected as too weak")]
    WeakPassword,

    /// Identity platform refused the email as malformed
    #[error("email rejected as invalid")]
    InvalidEmail,

    /// A response broke an invariant the wizard relies on; halt, never guess
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Durable key-value storage failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WizardError {
    /// Whether the automatic retry helper may re-attempt after this error.
    ///
    /// Only transport-level failures qualify; domain errors and client
    /// rejections (4xx) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            WizardError::Timeout | WizardError::RateLimited | WizardError::Unreachable(_) => true,
            WizardError::Status(code) => *code >= 500,
            _ => false,
        }
    }

    /// User-facing message (product language is French)
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Validation(_) => "Certains champs sont invalides.".into(),
            WizardError::DuplicateResource | WizardError::EmailAlreadyInUse => {
                "Cet email est déjà utilisé.".into()
            }
            WizardError::Timeout | WizardError::Unreachable(_) | WizardError::Status(_) => {
                "Impossible de joindre le serveur. Veuillez réessayer.".into()
            }
            WizardError::RateLimited => "Trop de tentatives. Patientez un instant.".into(),
            WizardError::Payments { .. } => {
                "Le paiement n'a pas pu être traité. Veuillez réessayer.".into()
            }
            WizardError::NotAuthenticated => "Utilisateur non connecté.".into(),
            WizardError::WeakPassword => "Le mot de passe est trop faible.".into(),
            WizardError::InvalidEmail => "Email invalide.".into(),
            _ => "Une erreur est survenue.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WizardError::Timeout.is_retryable());
        assert!(WizardError::RateLimited.is_retryable());
        assert!(WizardError::Status(503).is_retryable());
        assert!(!WizardError::Status(400).is_retryable());
        assert!(!WizardError::DuplicateResource.is_retryable());
        assert!(!WizardError::Validation(FieldErrors::new()).is_retryable());
    }
}
