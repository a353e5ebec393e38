//! Profile Document
//!
//! The durable record written to the identity platform's document store
//! once per successful signup, keyed by the identity's subject id.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};
use crate::state::Answers;

/// How the identity was established
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Email,
    Federated,
}

/// Durable profile document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub subject_id: String,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<chrono::NaiveDate>,
    pub plan_id: String,
    pub plan_name: String,
    pub plan_price: Decimal,
    pub payment_intent_id: String,
    pub auth_method: AuthMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDocument {
    /// Assemble the document from the accumulated wizard answers.
    ///
    /// Requires the plan to be resolved; callers check answer completeness
    /// before getting here.
    pub fn from_answers(
        subject_id: String,
        answers: &Answers,
        auth_method: AuthMethod,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let plan = answers
            .plan
            .as_ref()
            .ok_or_else(|| WizardError::Invariant("profile requires a resolved plan".into()))?;

        Ok(Self {
            subject_id,
            last_name: answers.identity.last_name.clone(),
            first_name: answers.identity.first_name.clone(),
            email: answers.identity.email.clone(),
            phone: answers.identity.phone.clone(),
            birth_date: answers.identity.birth_date,
            plan_id: plan.plan_id.clone(),
            plan_name: plan.plan_name.clone(),
            plan_price: plan.plan_price,
            payment_intent_id: answers.payment.payment_intent_id.clone(),
            auth_method,
            created_at: now,
            updated_at: now,
        })
    }
}
