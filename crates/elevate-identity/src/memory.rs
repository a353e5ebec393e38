//! In-Memory Directory
//!
//! Directory implementation for tests and local development. Enforces
//! email uniqueness the way the platform does, so the wizard's
//! check-then-create flow can be exercised end to end without a network.

use std::cell::RefCell;
use std::collections::HashMap;

use async_trait::async_trait;

use elevate_core::{AccountDirectory, ProfileDocument, Result, WizardError};

#[derive(Default)]
pub struct MemoryDirectory {
    accounts: RefCell<HashMap<String, String>>,
    profiles: RefCell<HashMap<String, ProfileDocument>>,
    federated: RefCell<Option<String>>,
    next_id: RefCell<u64>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register an email, as if an account already existed
    pub fn seed_account(&self, email: impl Into<String>, subject_id: impl Into<String>) {
        self.accounts
            .borrow_mut()
            .insert(email.into(), subject_id.into());
    }

    pub fn set_federated_session(&self, subject_id: impl Into<String>) {
        *self.federated.borrow_mut() = Some(subject_id.into());
    }

    pub fn profile(&self, subject_id: &str) -> Option<ProfileDocument> {
        self.profiles.borrow().get(subject_id).cloned()
    }
}

#[async_trait(?Send)]
impl AccountDirectory for MemoryDirectory {
    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.accounts.borrow().contains_key(email))
    }

    async fn federated_subject(&self) -> Result<Option<String>> {
        Ok(self.federated.borrow().clone())
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<String> {
        if self.accounts.borrow().contains_key(email) {
            return Err(WizardError::EmailAlreadyInUse);
        }
        if password.chars().count() < 6 {
            return Err(WizardError::WeakPassword);
        }

        let mut next = self.next_id.borrow_mut();
        *next += 1;
        let subject_id = format!("uid_{next}");
        self.accounts
            .borrow_mut()
            .insert(email.to_string(), subject_id.clone());
        Ok(subject_id)
    }

    async fn save_profile(&self, doc: &ProfileDocument) -> Result<()> {
        self.profiles
            .borrow_mut()
            .insert(doc.subject_id.clone(), doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elevate_core::{Answers, AuthMethod, IdentityFields, PlanFields};

    fn answers() -> Answers {
        Answers {
            identity: IdentityFields {
                last_name: "Doe".into(),
                first_name: "Jane".into(),
                email: "jane@example.com".into(),
                phone: "0601020304".into(),
                birth_date: chrono::NaiveDate::from_ymd_opt(1994, 5, 17),
                password: Some("secret1".into()),
            },
            plan: Some(PlanFields {
                plan_id: "annuel".into(),
                plan_name: "Plan Annuel".into(),
                plan_price: rust_decimal::Decimal::new(1699, 2),
                price_id: "price_a".into(),
                billing_period_months: 12,
            }),
            payment: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_refused() {
        let dir = MemoryDirectory::new();
        dir.seed_account("jane@example.com", "uid_0");

        assert!(dir.email_exists("jane@example.com").await.unwrap());
        let result = dir.create_account("jane@example.com", "secret1").await;
        assert!(matches!(result, Err(WizardError::EmailAlreadyInUse)));
    }

    #[tokio::test]
    async fn test_create_then_save_profile() {
        let dir = MemoryDirectory::new();
        let subject = dir.create_account("jane@example.com", "secret1").await.unwrap();

        let doc = ProfileDocument::from_answers(
            subject.clone(),
            &answers(),
            AuthMethod::Email,
            chrono::Utc::now(),
        )
        .unwrap();
        dir.save_profile(&doc).await.unwrap();

        assert_eq!(dir.profile(&subject).unwrap().plan_id, "annuel");
    }

    #[tokio::test]
    async fn test_weak_password_is_refused() {
        let dir = MemoryDirectory::new();
        let result = dir.create_account("jane@example.com", "abc").await;
        assert!(matches!(result, Err(WizardError::WeakPassword)));
    }
}
