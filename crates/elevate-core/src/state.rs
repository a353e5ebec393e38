//! Wizard State
//!
//! The persisted record of signup progress and collected answers. All
//! mutation goes through named operations so the monotonicity invariants
//! (`completed_steps` only grows, `max_step_reached` never decreases) hold
//! no matter how the views drive it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WizardError};

/// The four wizard steps, 1-based
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Step {
    Info,
    Plan,
    Payment,
    Confirmation,
}

impl Step {
    /// 1-based step number
    pub fn number(self) -> u8 {
        match self {
            Step::Info => 1,
            Step::Plan => 2,
            Step::Payment => 3,
            Step::Confirmation => 4,
        }
    }

    /// Parse a 1-based step number
    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Step::Info),
            2 => Ok(Step::Plan),
            3 => Ok(Step::Payment),
            4 => Ok(Step::Confirmation),
            _ => Err(WizardError::Invariant(format!("step {n} out of range"))),
        }
    }

    /// The step after this one, saturating at confirmation
    pub fn next(self) -> Self {
        Self::from_number(self.number() + 1).unwrap_or(Step::Confirmation)
    }
}

impl From<Step> for u8 {
    fn from(step: Step) -> u8 {
        step.number()
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(n: u8) -> std::result::Result<Self, String> {
        Step::from_number(n).map_err(|e| e.to_string())
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Personal information collected at step 1
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFields {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    /// Absent for federated sign-in, where no credential is created
    pub password: Option<String>,
}

/// Plan choice derived at step 2 from the catalog plus live pricing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFields {
    pub plan_id: String,
    pub plan_name: String,
    /// Total price per billing period, major currency unit
    pub plan_price: Decimal,
    pub price_id: String,
    pub billing_period_months: u32,
}

/// Payment identifiers captured at step 3
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFields {
    /// Last successful payment reference (subscription or intent id)
    pub payment_intent_id: String,
    pub customer_id: String,
}

/// Everything the wizard has collected so far
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answers {
    pub identity: IdentityFields,
    pub plan: Option<PlanFields>,
    pub payment: PaymentFields,
}

/// Persisted wizard progress
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub current_step: Step,
    pub completed_steps: BTreeSet<u8>,
    pub max_step_reached: Step,
    pub account_created: bool,
    pub answers: Answers,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: Step::Info,
            completed_steps: BTreeSet::new(),
            max_step_reached: Step::Info,
            account_created: false,
            answers: Answers::default(),
        }
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `step` complete and advance to the next one.
    ///
    /// Idempotent on `completed_steps`; a repeat call still advances
    /// `current_step`. `max_step_reached` only ever moves forward.
    pub fn complete_step(&mut self, step: Step) {
        self.completed_steps.insert(step.number());
        self.current_step = step.next();
        self.max_step_reached = self.max_step_reached.max(self.current_step);
    }

    /// Jump to a step the user has already unlocked. Forward-skipping past
    /// `max_step_reached` leaves the state untouched.
    pub fn go_to_step(&mut self, step: Step) {
        if step <= self.max_step_reached {
            self.current_step = step;
        }
    }

    /// Whether a step button may be clicked at all
    pub fn can_navigate_to(&self, step: Step) -> bool {
        step <= self.max_step_reached
    }

    pub fn is_completed(&self, step: Step) -> bool {
        self.completed_steps.contains(&step.number())
    }

    /// Store step-1 answers. Frozen once the account exists.
    pub fn set_identity(&mut self, identity: IdentityFields) -> Result<()> {
        if self.account_created {
            return Err(WizardError::Invariant(
                "identity fields are read-only after account creation".into(),
            ));
        }
        self.answers.identity = identity;
        Ok(())
    }

    /// Store step-2 derived plan fields. Frozen once the account exists.
    pub fn set_plan(&mut self, plan: PlanFields) -> Result<()> {
        if self.account_created {
            return Err(WizardError::Invariant(
                "plan fields are read-only after account creation".into(),
            ));
        }
        self.answers.plan = Some(plan);
        Ok(())
    }

    /// Store payment identifiers. Allowed at any time; reconciliation may
    /// refresh these even after the account exists.
    pub fn set_payment(&mut self, payment: PaymentFields) {
        self.answers.payment = payment;
    }

    pub fn mark_account_created(&mut self) {
        self.account_created = true;
    }

    /// Back to defaults (explicit restart, or abandonment on hard reload)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_step_is_idempotent() {
        let mut state = WizardState::new();
        state.complete_step(Step::Info);
        state.complete_step(Step::Info);

        assert_eq!(state.completed_steps.iter().filter(|&&n| n == 1).count(), 1);
        assert_eq!(state.current_step, Step::Plan);
    }

    #[test]
    fn test_max_step_is_monotonic() {
        let mut state = WizardState::new();
        state.complete_step(Step::Info);
        state.complete_step(Step::Plan);
        assert_eq!(state.max_step_reached, Step::Payment);

        state.go_to_step(Step::Info);
        assert_eq!(state.current_step, Step::Info);
        assert_eq!(state.max_step_reached, Step::Payment);

        // re-completing an early step must not pull the watermark back
        state.complete_step(Step::Info);
        assert_eq!(state.max_step_reached, Step::Payment);
    }

    #[test]
    fn test_forward_skip_is_rejected() {
        let mut state = WizardState::new();
        state.complete_step(Step::Info);

        state.go_to_step(Step::Confirmation);
        assert_eq!(state.current_step, Step::Plan);
        assert!(!state.can_navigate_to(Step::Payment));
    }

    #[test]
    fn test_identity_frozen_after_account_creation() {
        let mut state = WizardState::new();
        state.mark_account_created();

        assert!(state.set_identity(IdentityFields::default()).is_err());
        assert!(state
            .set_plan(PlanFields {
                plan_id: "mensuel".into(),
                plan_name: "Plan Mensuel".into(),
                plan_price: Decimal::ONE,
                price_id: "price_x".into(),
                billing_period_months: 1,
            })
            .is_err());

        // payment identifiers may still refresh
        state.set_payment(PaymentFields {
            payment_intent_id: "sub_1".into(),
            customer_id: "cus_1".into(),
        });
        assert_eq!(state.answers.payment.customer_id, "cus_1");
    }

    #[test]
    fn test_step_number_round_trip() {
        for n in 1..=4 {
            assert_eq!(Step::from_number(n).unwrap().number(), n);
        }
        assert!(Step::from_number(0).is_err());
        assert!(Step::from_number(5).is_err());
    }
}
