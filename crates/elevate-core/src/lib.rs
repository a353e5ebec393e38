//! # elevate-core
//!
//! The signup/checkout wizard for Elevate: a four-step state machine
//! (personal information → plan choice → payment → confirmation) with
//! persisted progress, payment-return reconciliation and one-shot account
//! finalization.
//!
//! The crate is platform-agnostic: everything external - the payments
//! backend, the identity directory, durable storage, browser windows - is
//! reached through the port traits in [`ports`] and [`store`], so the same
//! controller drives the wasm frontend and the native test harness.
//!
//! ## Flow
//!
//! ```text
//! Step1 ──validated, email free──▶ Step2 ──plan resolved──▶ Step3
//!                                                             │
//!                      browser returns with session id        │
//!                                 ▼                           │
//!                          reconciliation ──complete──▶ Step4 ─▶ account
//!                                 │                              created
//!                                 └─otherwise─▶ payment error overlay
//! ```

pub mod catalog;
pub mod controller;
pub mod error;
pub mod lock;
pub mod ports;
pub mod profile;
pub mod retry;
pub mod state;
pub mod store;
pub mod validate;

pub use controller::{
    MountContext, PaymentFailure, SubmitOutcome, View, WizardController, WizardDeps,
};
pub use error::{FieldErrors, Result, WizardError};
pub use lock::{CancelToken, OpLock};
pub use ports::{
    AccountDirectory, CheckoutGateway, CheckoutSessionInit, CheckoutStatus, PortalHandle,
    PortalWindows, SessionStatus,
};
pub use profile::{AuthMethod, ProfileDocument};
pub use retry::RetryPolicy;
pub use state::{Answers, IdentityFields, PaymentFields, PlanFields, Step, WizardState};
pub use store::{MemoryStore, StateStore};
