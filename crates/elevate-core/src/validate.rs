//! Step Validators
//!
//! Pure checks of each step's form data, returning field-level messages the
//! views render inline. Nothing here touches the network; the step-1 email
//! uniqueness check lives in the controller because it is asynchronous.

use crate::error::FieldErrors;
use crate::state::{IdentityFields, PlanFields};

pub const NAME_MIN_LENGTH: usize = 2;
pub const PHONE_MIN_LENGTH: usize = 10;
pub const PASSWORD_MIN_LENGTH: usize = 6;

/// Message shown when the step-1 uniqueness check finds an existing record
pub const EMAIL_EXISTS_MESSAGE: &str = "Cet email est déjà utilisé";

/// Lightweight well-formedness check shared with the server handlers.
///
/// One `@`, non-empty local part, domain with a dot and no whitespace.
pub fn is_well_formed_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty()
        && domain.len() >= 3
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Validate step-1 personal information.
///
/// `federated` waives the password requirement: a third-party sign-in never
/// carries one, by design rather than by omission.
pub fn validate_identity(form: &IdentityFields, federated: bool) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if form.last_name.trim().chars().count() < NAME_MIN_LENGTH {
        errors.insert(
            "lastName",
            format!("Le nom doit contenir au moins {NAME_MIN_LENGTH} caractères"),
        );
    }
    if form.first_name.trim().chars().count() < NAME_MIN_LENGTH {
        errors.insert(
            "firstName",
            format!("Le prénom doit contenir au moins {NAME_MIN_LENGTH} caractères"),
        );
    }
    if !is_well_formed_email(&form.email) {
        errors.insert("email", "Email invalide".into());
    }
    if form.phone.trim().chars().count() < PHONE_MIN_LENGTH {
        errors.insert("phone", "Numéro de téléphone invalide".into());
    }
    if form.birth_date.is_none() {
        errors.insert("birthDate", "La date de naissance est requise".into());
    }
    if !federated {
        match &form.password {
            Some(p) if p.chars().count() >= PASSWORD_MIN_LENGTH => {}
            _ => {
                errors.insert(
                    "password",
                    format!("Le mot de passe doit contenir au moins {PASSWORD_MIN_LENGTH} caractères"),
                );
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate the derived step-2 plan fields.
///
/// All of these come from merging the catalog entry with live pricing; the
/// continue action stays inert until they resolve.
pub fn validate_plan(plan: &PlanFields) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if plan.plan_id.is_empty() {
        errors.insert("planId", "Veuillez sélectionner un plan".into());
    }
    if plan.plan_name.is_empty() {
        errors.insert("planName", "Tarif indisponible".into());
    }
    if plan.plan_price <= rust_decimal::Decimal::ZERO {
        errors.insert("planPrice", "Tarif indisponible".into());
    }
    if plan.price_id.is_empty() {
        errors.insert("priceId", "Tarif indisponible".into());
    }
    if plan.billing_period_months == 0 {
        errors.insert("billingPeriodMonths", "Tarif indisponible".into());
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> IdentityFields {
        IdentityFields {
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            email: "jane@example.com".into(),
            phone: "0601020304".into(),
            birth_date: chrono::NaiveDate::from_ymd_opt(1994, 5, 17),
            password: Some("secret1".into()),
        }
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(validate_identity(&valid_form(), false).is_ok());
    }

    #[test]
    fn test_each_field_is_checked() {
        let form = IdentityFields::default();
        let errors = validate_identity(&form, false).unwrap_err();

        for field in ["lastName", "firstName", "email", "phone", "birthDate", "password"] {
            assert!(errors.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_federated_waives_password() {
        let mut form = valid_form();
        form.password = None;

        assert!(validate_identity(&form, false).is_err());
        assert!(validate_identity(&form, true).is_ok());
    }

    #[test]
    fn test_email_well_formedness() {
        assert!(is_well_formed_email("a@b.co"));
        assert!(!is_well_formed_email("a@b"));
        assert!(!is_well_formed_email("@b.co"));
        assert!(!is_well_formed_email("a b@c.co"));
        assert!(!is_well_formed_email("a@b@c.co"));
        assert!(!is_well_formed_email("a@.co"));
    }

    #[test]
    fn test_unresolved_plan_is_rejected() {
        let plan = PlanFields {
            plan_id: "annuel".into(),
            plan_name: String::new(),
            plan_price: rust_decimal::Decimal::ZERO,
            price_id: String::new(),
            billing_period_months: 0,
        };
        let errors = validate_plan(&plan).unwrap_err();
        assert!(errors.contains_key("planName"));
        assert!(errors.contains_key("planPrice"));
        assert!(errors.contains_key("billingPeriodMonths"));
    }
}
