//! Identity Platform Error Mapping
//!
//! The platform reports domain failures as an error code string inside the
//! response body. The mapping from those codes to the wizard taxonomy lives
//! here and nowhere else; the rest of the system never sees a raw code.

use elevate_core::WizardError;

/// Platform code for an email that already has an identity record
pub const CODE_EMAIL_EXISTS: &str = "EMAIL_EXISTS";
/// Platform code (prefix) for a rejected password
pub const CODE_WEAK_PASSWORD: &str = "WEAK_PASSWORD";
/// Platform code for a malformed email
pub const CODE_INVALID_EMAIL: &str = "INVALID_EMAIL";

/// Map a platform error code to the wizard taxonomy.
///
/// Codes may carry a trailing explanation (`WEAK_PASSWORD : Password should
/// be at least 6 characters`); matching is on the leading token.
pub fn map_error_code(code: &str) -> WizardError {
    let token = code.split([' ', ':']).next().unwrap_or(code);
    match token {
        CODE_EMAIL_EXISTS => WizardError::EmailAlreadyInUse,
        CODE_WEAK_PASSWORD => WizardError::WeakPassword,
        CODE_INVALID_EMAIL => WizardError::InvalidEmail,
        _ => WizardError::Identity {
            code: token.to_string(),
            message: code.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_dedicated_variants() {
        assert!(matches!(
            map_error_code("EMAIL_EXISTS"),
            WizardError::EmailAlreadyInUse
        ));
        assert!(matches!(
            map_error_code("WEAK_PASSWORD : Password should be at least 6 characters"),
            WizardError::WeakPassword
        ));
        assert!(matches!(
            map_error_code("INVALID_EMAIL"),
            WizardError::InvalidEmail
        ));
    }

    #[test]
    fn test_unknown_code_stays_in_identity_bucket() {
        let err = map_error_code("OPERATION_NOT_ALLOWED");
        match err {
            WizardError::Identity { code, .. } => assert_eq!(code, "OPERATION_NOT_ALLOWED"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
