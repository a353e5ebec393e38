//! Wizard Controller
//!
//! The state machine driving the four-step signup flow. Owns the persisted
//! wizard state and funnels every mutation through it: step validation,
//! plan resolution, payment-return reconciliation, account finalization and
//! the billing-portal handoff. All platform access goes through the
//! injected ports, so the same controller runs in the browser and under
//! the native test harness.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::catalog::{self, LivePrice, DEFAULT_PLAN_ID};
use crate::error::{FieldErrors, Result, WizardError};
use crate::lock::{CancelToken, OpLock};
use crate::ports::{AccountDirectory, CheckoutGateway, CheckoutSessionInit, PortalWindows, SessionStatus};
use crate::profile::{AuthMethod, ProfileDocument};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::state::{IdentityFields, PaymentFields, Step, WizardState};
use crate::store::{self, StateStore};
use crate::validate;

/// Injected delay, so backoff works both under tokio and a JS timer
pub type Sleeper = Rc<dyn Fn(Duration) -> LocalBoxFuture<'static, ()>>;

/// Why the payment-error overlay is showing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentFailure {
    /// The platform reported the session as not complete
    Incomplete,
    /// The status could not be verified at all (transport failure)
    Unverified,
}

impl PaymentFailure {
    pub fn user_message(self) -> &'static str {
        match self {
            PaymentFailure::Incomplete => "Le paiement n'a pas abouti. Veuillez réessayer.",
            PaymentFailure::Unverified => {
                "Impossible de vérifier le paiement. Contactez le support si le problème persiste."
            }
        }
    }
}

/// What the wizard shell should render right now
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Offline,
    PaymentProcessing,
    PaymentError(PaymentFailure),
    Step(Step),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Overlay {
    None,
    Processing,
    Failed(PaymentFailure),
}

/// Outcome of a step submission
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    Advanced,
    Rejected(FieldErrors),
}

/// Facts about the page load, gathered by the host before mounting
#[derive(Clone, Debug, Default)]
pub struct MountContext {
    /// Payment-session id carried in the return URL, already stripped from
    /// the visible address by the host
    pub return_session_id: Option<String>,
    /// Navigation entry reported a reload (not a fresh visit or client-side
    /// transition)
    pub reloaded: bool,
    pub online: bool,
}

/// External collaborators handed to the controller
pub struct WizardDeps {
    pub gateway: Rc<dyn CheckoutGateway>,
    pub directory: Rc<dyn AccountDirectory>,
    pub store: Rc<dyn StateStore>,
    pub sleeper: Sleeper,
    pub policy: RetryPolicy,
}

/// The wizard state machine
pub struct WizardController {
    state: RefCell<WizardState>,
    gateway: Rc<dyn CheckoutGateway>,
    directory: Rc<dyn AccountDirectory>,
    store: Rc<dyn StateStore>,
    sleeper: Sleeper,
    policy: RetryPolicy,

    reconcile_lock: OpLock,
    portal_lock: OpLock,
    /// Session ids already handled during this page's lifetime
    processed_sessions: RefCell<HashSet<String>>,

    online: Cell<bool>,
    overlay: Cell<Overlay>,
    prices: RefCell<Option<Vec<LivePrice>>>,
    selected_plan: RefCell<String>,
    cancel: CancelToken,
}

impl WizardController {
    /// Rehydrate from the store (corrupted records fall back to defaults)
    pub fn new(deps: WizardDeps) -> Self {
        let state = store::load(deps.store.as_ref());
        Self {
            state: RefCell::new(state),
            gateway: deps.gateway,
            directory: deps.directory,
            store: deps.store,
            sleeper: deps.sleeper,
            policy: deps.policy,
            reconcile_lock: OpLock::new(),
            portal_lock: OpLock::new(),
            processed_sessions: RefCell::new(HashSet::new()),
            online: Cell::new(true),
            overlay: Cell::new(Overlay::None),
            prices: RefCell::new(None),
            selected_plan: RefCell::new(DEFAULT_PLAN_ID.to_string()),
            cancel: CancelToken::new(),
        }
    }

    /// Token cancelling in-flight operations when the view is torn down
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    pub fn view(&self) -> View {
        if !self.online.get() {
            return View::Offline;
        }
        match self.overlay.get() {
            Overlay::Processing => View::PaymentProcessing,
            Overlay::Failed(failure) => View::PaymentError(failure),
            Overlay::None => View::Step(self.state.borrow().current_step),
        }
    }

    /// Snapshot for the views; mutation still goes through the operations
    pub fn state(&self) -> WizardState {
        self.state.borrow().clone()
    }

    pub fn set_online(&self, online: bool) {
        self.online.set(online);
    }

    // ------------------------------------------------------------------
    // Mount & navigation
    // ------------------------------------------------------------------

    /// Entry point on page load.
    ///
    /// A payment-session id in the URL means the browser just returned from
    /// the payment platform: reconcile it. Otherwise a reload is treated as
    /// abandonment and the wizard starts over, so a stale in-progress
    /// session is never resumed by accident.
    pub async fn on_mount(&self, ctx: MountContext) -> Result<()> {
        self.online.set(ctx.online);

        if let Some(session_id) = ctx.return_session_id {
            return self.reconcile(&session_id).await;
        }

        if ctx.reloaded {
            tracing::info!("Reload without payment return, restarting wizard");
            self.state.borrow_mut().reset();
            self.persist();
        }
        Ok(())
    }

    /// Direct navigation via the step indicator; forward-skipping is a no-op
    pub fn navigate_to(&self, step: Step) {
        self.state.borrow_mut().go_to_step(step);
        self.persist();
    }

    /// Explicit restart action
    pub fn restart(&self) {
        self.state.borrow_mut().reset();
        self.overlay.set(Overlay::None);
        self.persist();
    }

    /// Leave the payment-error overlay and try again from the payment step
    pub fn retry_payment(&self) {
        self.overlay.set(Overlay::None);
        self.state.borrow_mut().go_to_step(Step::Payment);
        self.persist();
    }

    // ------------------------------------------------------------------
    // Step 1 - personal information
    // ------------------------------------------------------------------

    /// Validate the form, check email uniqueness, store and advance.
    ///
    /// The check-then-create window is known and accepted; account creation
    /// re-checks and is the authoritative failure point.
    pub async fn submit_identity(
        &self,
        form: IdentityFields,
        federated: bool,
    ) -> Result<SubmitOutcome> {
        if self.state.borrow().account_created {
            return Err(WizardError::Invariant(
                "identity can no longer change after account creation".into(),
            ));
        }

        if let Err(errors) = validate::validate_identity(&form, federated) {
            return Ok(SubmitOutcome::Rejected(errors));
        }

        let email = form.email.clone();
        let directory = Rc::clone(&self.directory);
        let exists = run_with_retry(
            self.policy,
            || {
                let directory = Rc::clone(&directory);
                let email = email.clone();
                async move { directory.email_exists(&email).await }
            },
            self.sleep_fn(),
        )
        .await?;

        if self.cancel.is_cancelled() {
            return Ok(SubmitOutcome::Rejected(FieldErrors::new()));
        }

        if exists {
            let mut errors = FieldErrors::new();
            errors.insert("email", validate::EMAIL_EXISTS_MESSAGE.to_string());
            return Ok(SubmitOutcome::Rejected(errors));
        }

        {
            let mut state = self.state.borrow_mut();
            state.set_identity(form)?;
            state.complete_step(Step::Info);
        }
        self.persist();
        Ok(SubmitOutcome::Advanced)
    }

    // ------------------------------------------------------------------
    // Step 2 - plan choice
    // ------------------------------------------------------------------

    /// Fetch live pricing for the plan cards
    pub async fn load_prices(&self) -> Result<()> {
        let gateway = Rc::clone(&self.gateway);
        let prices = run_with_retry(
            self.policy,
            || {
                let gateway = Rc::clone(&gateway);
                async move { gateway.fetch_prices().await }
            },
            self.sleep_fn(),
        )
        .await?;

        if !self.cancel.is_cancelled() {
            *self.prices.borrow_mut() = Some(prices);
        }
        Ok(())
    }

    pub fn prices(&self) -> Option<Vec<LivePrice>> {
        self.prices.borrow().clone()
    }

    pub fn select_plan(&self, plan_id: &str) {
        if catalog::plan_by_id(plan_id).is_some() {
            *self.selected_plan.borrow_mut() = plan_id.to_string();
        }
    }

    pub fn selected_plan(&self) -> String {
        self.selected_plan.borrow().clone()
    }

    /// Continue from the plan step. Inert (`Ok(false)`) until live pricing
    /// for the selected plan has resolved.
    pub fn confirm_plan(&self) -> Result<bool> {
        let selected = self.selected_plan.borrow().clone();
        let Some(entry) = catalog::plan_by_id(&selected) else {
            return Ok(false);
        };

        let prices = self.prices.borrow();
        let Some(live) = prices
            .as_ref()
            .and_then(|ps| ps.iter().find(|p| p.id == entry.price_id))
        else {
            return Ok(false);
        };

        let fields = catalog::resolve_plan(entry, live);
        if let Err(errors) = validate::validate_plan(&fields) {
            return Err(WizardError::Validation(errors));
        }
        drop(prices);

        {
            let mut state = self.state.borrow_mut();
            state.set_plan(fields)?;
            state.complete_step(Step::Plan);
        }
        self.persist();
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Step 3 - payment
    // ------------------------------------------------------------------

    /// Create the embedded checkout session for the stored plan and email.
    ///
    /// Stores the customer id right away and clears any stale payment
    /// reference from a previous attempt.
    pub async fn begin_checkout(&self) -> Result<CheckoutSessionInit> {
        let (price_id, email) = {
            let state = self.state.borrow();
            let plan = state.answers.plan.as_ref().ok_or_else(|| {
                WizardError::Invariant("payment step requires a resolved plan".into())
            })?;
            (plan.price_id.clone(), state.answers.identity.email.clone())
        };

        let gateway = Rc::clone(&self.gateway);
        let init = run_with_retry(
            self.policy,
            || {
                let gateway = Rc::clone(&gateway);
                let price_id = price_id.clone();
                let email = email.clone();
                async move { gateway.create_checkout_session(&price_id, &email).await }
            },
            self.sleep_fn(),
        )
        .await?;

        if !self.cancel.is_cancelled() {
            self.state.borrow_mut().set_payment(PaymentFields {
                payment_intent_id: String::new(),
                customer_id: init.customer_id.clone(),
            });
            self.persist();
        }
        Ok(init)
    }

    /// Payment-return reconciliation.
    ///
    /// Runs at most once per session id per page lifetime, and at most one
    /// at a time; a duplicate trigger (re-mount, double event) is skipped
    /// silently without a second status call.
    pub async fn reconcile(&self, session_id: &str) -> Result<()> {
        if !self.processed_sessions.borrow_mut().insert(session_id.to_string()) {
            tracing::debug!(session_id, "Session already reconciled, skipping");
            return Ok(());
        }

        let Some(_guard) = self.reconcile_lock.try_acquire() else {
            tracing::debug!(session_id, "Reconciliation already in flight, skipping");
            return Ok(());
        };

        self.overlay.set(Overlay::Processing);
        tracing::info!(session_id, "Reconciling payment return");

        let gateway = Rc::clone(&self.gateway);
        let sid = session_id.to_string();
        let outcome = run_with_retry(
            self.policy,
            || {
                let gateway = Rc::clone(&gateway);
                let sid = sid.clone();
                async move { gateway.checkout_status(&sid).await }
            },
            self.sleep_fn(),
        )
        .await;

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        match outcome {
            Ok(status) if status.status == SessionStatus::Complete => {
                let Some(customer_id) = status.customer_id.filter(|c| !c.is_empty()) else {
                    self.overlay.set(Overlay::Failed(PaymentFailure::Unverified));
                    return Err(WizardError::Invariant(
                        "complete session without a customer id".into(),
                    ));
                };

                {
                    let mut state = self.state.borrow_mut();
                    let previous = state.answers.payment.payment_intent_id.clone();
                    state.set_payment(PaymentFields {
                        payment_intent_id: status.subscription_id.unwrap_or(previous),
                        customer_id,
                    });
                    state.complete_step(Step::Payment);
                }
                self.persist();
                self.overlay.set(Overlay::None);
                tracing::info!(session_id, "Payment confirmed, advancing to confirmation");
                Ok(())
            }
            Ok(status) => {
                tracing::warn!(session_id, status = ?status.status, "Session not complete");
                self.overlay.set(Overlay::Failed(PaymentFailure::Incomplete));
                Ok(())
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "Could not verify payment");
                self.overlay.set(Overlay::Failed(PaymentFailure::Unverified));
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Step 4 - account finalization
    // ------------------------------------------------------------------

    /// Create the identity record and profile document, exactly once.
    ///
    /// Already created → no-op. Failure leaves `account_created` false so a
    /// retry re-attempts creation.
    pub async fn finalize_account(&self) -> Result<()> {
        let (answers, already_created) = {
            let state = self.state.borrow();
            (state.answers.clone(), state.account_created)
        };
        if already_created {
            return Ok(());
        }

        if answers.identity.email.is_empty() || answers.plan.is_none() {
            return Err(WizardError::Invariant(
                "answers incomplete, wizard must be restarted".into(),
            ));
        }

        let (subject_id, auth_method) = match answers.identity.password.as_deref() {
            None => {
                let subject = self
                    .directory
                    .federated_subject()
                    .await?
                    .ok_or(WizardError::NotAuthenticated)?;
                tracing::debug!(subject_id = %subject, "Reusing federated session");
                (subject, AuthMethod::Federated)
            }
            Some(password) => {
                let subject = self
                    .directory
                    .create_account(&answers.identity.email, password)
                    .await?;
                tracing::info!(subject_id = %subject, "Identity record created");
                (subject, AuthMethod::Email)
            }
        };

        let doc = ProfileDocument::from_answers(subject_id, &answers, auth_method, chrono::Utc::now())?;
        self.directory.save_profile(&doc).await?;

        if self.cancel.is_cancelled() {
            return Ok(());
        }

        self.state.borrow_mut().mark_account_created();
        self.persist();
        tracing::info!(email = %doc.email, "Profile saved, signup complete");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Billing portal handoff
    // ------------------------------------------------------------------

    /// Open the billing self-service portal.
    ///
    /// The blank window is opened synchronously on the user gesture so
    /// mobile popup blockers don't eat it; it is navigated once the URL
    /// resolves, or closed if it never does. Rapid repeated clicks collapse
    /// into one portal-session creation via the lock.
    pub async fn open_billing_portal(&self, windows: &dyn PortalWindows) -> Result<()> {
        let Some(_guard) = self.portal_lock.try_acquire() else {
            tracing::debug!("Portal handoff already in flight, skipping");
            return Ok(());
        };

        let customer_id = {
            let state = self.state.borrow();
            let id = state.answers.payment.customer_id.clone();
            if id.is_empty() {
                return Err(WizardError::Invariant(
                    "portal handoff requires a customer id".into(),
                ));
            }
            id
        };

        let pre_opened = windows.open_blank();

        let gateway = Rc::clone(&self.gateway);
        let outcome = run_with_retry(
            self.policy,
            || {
                let gateway = Rc::clone(&gateway);
                let customer_id = customer_id.clone();
                async move { gateway.create_portal_session(&customer_id).await }
            },
            self.sleep_fn(),
        )
        .await;

        match outcome {
            Ok(url) => {
                match pre_opened {
                    Some(handle) => windows.navigate(handle, &url),
                    None => windows.navigate_current(&url),
                }
                Ok(())
            }
            Err(e) => {
                if let Some(handle) = pre_opened {
                    windows.close(handle);
                }
                tracing::error!(error = %e, "Portal session creation failed");
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------

    fn sleep_fn(&self) -> impl FnMut(Duration) -> LocalBoxFuture<'static, ()> + '_ {
        move |d| (self.sleeper)(d)
    }

    /// Write-through of the wizard state. A storage hiccup is logged and
    /// tolerated; the in-memory state stays authoritative for this page.
    fn persist(&self) {
        if let Err(e) = store::persist(&self.state.borrow(), self.store.as_ref()) {
            tracing::warn!(error = %e, "Could not persist wizard state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PriceInterval;
    use crate::ports::{CheckoutStatus, PortalHandle};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn noop_sleeper() -> Sleeper {
        Rc::new(|_d| Box::pin(async {}))
    }

    #[derive(Default)]
    struct ScriptedGateway {
        status_calls: Cell<u32>,
        portal_calls: Cell<u32>,
        checkout_calls: Cell<u32>,
        /// When set, every status call fails with a timeout
        status_times_out: Cell<bool>,
        status: RefCell<Option<CheckoutStatus>>,
        /// Yield once inside portal creation so concurrent calls interleave
        portal_yields: Cell<bool>,
        /// When set, portal creation fails with a server error
        portal_fails: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl CheckoutGateway for ScriptedGateway {
        async fn fetch_prices(&self) -> Result<Vec<LivePrice>> {
            Ok(vec![LivePrice {
                id: "price_1SJbjr1H0zcejTt5bnVqtmJJ".into(),
                amount: 1699,
                currency: "eur".into(),
                interval: PriceInterval::Year,
                interval_count: 1,
                product_name: "Plan Annuel".into(),
                product_id: "prod_a".into(),
            }])
        }

        async fn create_checkout_session(
            &self,
            _price_id: &str,
            _email: &str,
        ) -> Result<CheckoutSessionInit> {
            self.checkout_calls.set(self.checkout_calls.get() + 1);
            Ok(CheckoutSessionInit {
                client_secret: "cs_secret".into(),
                session_id: "cs_test_1".into(),
                customer_id: "cus_new".into(),
            })
        }

        async fn checkout_status(&self, _session_id: &str) -> Result<CheckoutStatus> {
            self.status_calls.set(self.status_calls.get() + 1);
            if self.status_times_out.get() {
                return Err(WizardError::Timeout);
            }
            Ok(self.status.borrow().clone().unwrap_or(CheckoutStatus {
                status: SessionStatus::Complete,
                customer_email: Some("jane@example.com".into()),
                customer_id: Some("cus_1".into()),
                subscription_id: Some("sub_1".into()),
            }))
        }

        async fn create_portal_session(&self, _customer_id: &str) -> Result<String> {
            self.portal_calls.set(self.portal_calls.get() + 1);
            if self.portal_yields.get() {
                tokio::task::yield_now().await;
            }
            if self.portal_fails.get() {
                return Err(WizardError::Status(500));
            }
            Ok("https://billing.example.com/p/session_1".into())
        }
    }

    #[derive(Default)]
    struct ScriptedDirectory {
        existing_emails: RefCell<HashSet<String>>,
        federated: RefCell<Option<String>>,
        create_calls: Cell<u32>,
        profiles: RefCell<HashMap<String, ProfileDocument>>,
    }

    #[async_trait(?Send)]
    impl AccountDirectory for ScriptedDirectory {
        async fn email_exists(&self, email: &str) -> Result<bool> {
            Ok(self.existing_emails.borrow().contains(email))
        }

        async fn federated_subject(&self) -> Result<Option<String>> {
            Ok(self.federated.borrow().clone())
        }

        async fn create_account(&self, _email: &str, _password: &str) -> Result<String> {
            self.create_calls.set(self.create_calls.get() + 1);
            Ok("uid_1".into())
        }

        async fn save_profile(&self, doc: &ProfileDocument) -> Result<()> {
            self.profiles
                .borrow_mut()
                .insert(doc.subject_id.clone(), doc.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWindows {
        opened: Cell<u32>,
        blocked: Cell<bool>,
        navigated: RefCell<Vec<String>>,
        navigated_current: RefCell<Vec<String>>,
        closed: Cell<u32>,
    }

    impl PortalWindows for RecordingWindows {
        fn open_blank(&self) -> Option<PortalHandle> {
            if self.blocked.get() {
                return None;
            }
            self.opened.set(self.opened.get() + 1);
            Some(PortalHandle(self.opened.get() as usize))
        }

        fn navigate(&self, _handle: PortalHandle, url: &str) {
            self.navigated.borrow_mut().push(url.to_string());
        }

        fn navigate_current(&self, url: &str) {
            self.navigated_current.borrow_mut().push(url.to_string());
        }

        fn close(&self, _handle: PortalHandle) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    struct Harness {
        controller: WizardController,
        gateway: Rc<ScriptedGateway>,
        directory: Rc<ScriptedDirectory>,
        store: Rc<MemoryStore>,
    }

    fn harness() -> Harness {
        let gateway = Rc::new(ScriptedGateway::default());
        let directory = Rc::new(ScriptedDirectory::default());
        let store = Rc::new(MemoryStore::new());
        let controller = WizardController::new(WizardDeps {
            gateway: Rc::clone(&gateway) as Rc<dyn CheckoutGateway>,
            directory: Rc::clone(&directory) as Rc<dyn AccountDirectory>,
            store: Rc::clone(&store) as Rc<dyn StateStore>,
            sleeper: noop_sleeper(),
            policy: RetryPolicy::default(),
        });
        Harness {
            controller,
            gateway,
            directory,
            store,
        }
    }

    fn valid_identity() -> IdentityFields {
        IdentityFields {
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            email: "jane@example.com".into(),
            phone: "0601020304".into(),
            birth_date: chrono::NaiveDate::from_ymd_opt(1994, 5, 17),
            password: Some("secret1".into()),
        }
    }

    async fn drive_to_payment(h: &Harness) {
        h.controller
            .submit_identity(valid_identity(), false)
            .await
            .unwrap();
        h.controller.load_prices().await.unwrap();
        assert!(h.controller.confirm_plan().unwrap());
    }

    #[tokio::test]
    async fn test_taken_email_stays_on_step_one() {
        let h = harness();
        h.directory
            .existing_emails
            .borrow_mut()
            .insert("taken@example.com".into());

        let mut form = valid_identity();
        form.email = "taken@example.com".into();

        let outcome = h.controller.submit_identity(form, false).await.unwrap();
        let SubmitOutcome::Rejected(errors) = outcome else {
            panic!("expected rejection");
        };
        assert!(errors.contains_key("email"));
        assert_eq!(h.controller.state().current_step, Step::Info);
    }

    #[tokio::test]
    async fn test_happy_path_to_confirmation() {
        let h = harness();
        drive_to_payment(&h);

        let init = h.controller.begin_checkout().await.unwrap();
        assert_eq!(init.customer_id, "cus_new");
        assert_eq!(h.controller.state().answers.payment.customer_id, "cus_new");

        h.controller.reconcile("cs_test_1").await.unwrap();
        let state = h.controller.state();
        assert_eq!(state.current_step, Step::Confirmation);
        assert_eq!(state.answers.payment.payment_intent_id, "sub_1");
        assert_eq!(state.answers.payment.customer_id, "cus_1");
        assert_eq!(h.controller.view(), View::Step(Step::Confirmation));
    }

    #[tokio::test]
    async fn test_duplicate_reconcile_triggers_one_status_call() {
        let h = harness();
        drive_to_payment(&h);

        h.controller.reconcile("cs_test_1").await.unwrap();
        h.controller.reconcile("cs_test_1").await.unwrap();

        assert_eq!(h.gateway.status_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_triple_timeout_keeps_prior_payment_reference() {
        let h = harness();
        drive_to_payment(&h);
        h.controller.state.borrow_mut().set_payment(PaymentFields {
            payment_intent_id: "sub_prior".into(),
            customer_id: "cus_prior".into(),
        });
        h.gateway.status_times_out.set(true);

        h.controller.reconcile("cs_test_2").await.unwrap();

        // initial attempt + 2 retries, then the error overlay
        assert_eq!(h.gateway.status_calls.get(), 3);
        assert_eq!(
            h.controller.view(),
            View::PaymentError(PaymentFailure::Unverified)
        );
        let state = h.controller.state();
        assert_eq!(state.answers.payment.payment_intent_id, "sub_prior");
        assert_eq!(state.answers.payment.customer_id, "cus_prior");
    }

    #[tokio::test]
    async fn test_incomplete_session_surfaces_retryable_error() {
        let h = harness();
        drive_to_payment(&h);
        *h.gateway.status.borrow_mut() = Some(CheckoutStatus {
            status: SessionStatus::Open,
            customer_email: None,
            customer_id: None,
            subscription_id: None,
        });

        h.controller.reconcile("cs_test_3").await.unwrap();
        assert_eq!(
            h.controller.view(),
            View::PaymentError(PaymentFailure::Incomplete)
        );

        h.controller.retry_payment();
        assert_eq!(h.controller.view(), View::Step(Step::Payment));
    }

    #[tokio::test]
    async fn test_complete_session_without_customer_id_halts() {
        let h = harness();
        drive_to_payment(&h);
        *h.gateway.status.borrow_mut() = Some(CheckoutStatus {
            status: SessionStatus::Complete,
            customer_email: None,
            customer_id: None,
            subscription_id: Some("sub_9".into()),
        });

        let result = h.controller.reconcile("cs_test_4").await;
        assert!(matches!(result, Err(WizardError::Invariant(_))));
        // the wizard did not advance past payment
        assert_eq!(h.controller.state().current_step, Step::Payment);
    }

    #[tokio::test]
    async fn test_hard_reload_resets_state() {
        let h = harness();
        drive_to_payment(&h);
        assert_eq!(h.controller.state().current_step, Step::Payment);

        h.controller
            .on_mount(MountContext {
                return_session_id: None,
                reloaded: true,
                online: true,
            })
            .await
            .unwrap();

        let state = h.controller.state();
        assert_eq!(state, WizardState::default());
        // the reset also reached the persisted record
        assert_eq!(store::load(h.store.as_ref()), WizardState::default());
    }

    #[tokio::test]
    async fn test_mount_with_session_id_reconciles() {
        let h = harness();
        drive_to_payment(&h);

        h.controller
            .on_mount(MountContext {
                return_session_id: Some("cs_test_1".into()),
                reloaded: true,
                online: true,
            })
            .await
            .unwrap();

        // return from payment is not an abandonment
        assert_eq!(h.controller.state().current_step, Step::Confirmation);
        assert_eq!(h.gateway.status_calls.get(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_portal_clicks_create_one_session() {
        let h = harness();
        drive_to_payment(&h);
        h.controller.begin_checkout().await.unwrap();
        h.gateway.portal_yields.set(true);

        let windows = RecordingWindows::default();
        let (a, b) = futures::join!(
            h.controller.open_billing_portal(&windows),
            h.controller.open_billing_portal(&windows),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(h.gateway.portal_calls.get(), 1);
        assert_eq!(windows.navigated.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_popup_falls_back_to_current_tab() {
        let h = harness();
        drive_to_payment(&h);
        h.controller.begin_checkout().await.unwrap();

        let windows = RecordingWindows::default();
        windows.blocked.set(true);

        h.controller.open_billing_portal(&windows).await.unwrap();
        assert_eq!(windows.navigated.borrow().len(), 0);
        assert_eq!(windows.navigated_current.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_portal_failure_closes_preopened_window() {
        let h = harness();
        drive_to_payment(&h);
        h.controller.begin_checkout().await.unwrap();
        h.gateway.portal_fails.set(true);

        let windows = RecordingWindows::default();
        let result = h.controller.open_billing_portal(&windows).await;

        assert!(result.is_err());
        assert_eq!(windows.opened.get(), 1);
        assert_eq!(windows.closed.get(), 1);
        assert!(windows.navigated.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_portal_without_customer_id_never_opens_a_window() {
        let h = harness();
        drive_to_payment(&h);

        let windows = RecordingWindows::default();
        let result = h.controller.open_billing_portal(&windows).await;

        assert!(matches!(result, Err(WizardError::Invariant(_))));
        assert_eq!(windows.opened.get(), 0);
    }

    #[tokio::test]
    async fn test_finalize_is_guarded_by_account_created() {
        let h = harness();
        drive_to_payment(&h);
        h.controller.begin_checkout().await.unwrap();
        h.controller.reconcile("cs_test_1").await.unwrap();

        h.controller.finalize_account().await.unwrap();
        h.controller.finalize_account().await.unwrap();

        assert_eq!(h.directory.create_calls.get(), 1);
        let state = h.controller.state();
        assert!(state.account_created);

        let profiles = h.directory.profiles.borrow();
        let doc = profiles.get("uid_1").unwrap();
        assert_eq!(doc.email, "jane@example.com");
        assert_eq!(doc.auth_method, AuthMethod::Email);
        assert_eq!(doc.payment_intent_id, "sub_1");
    }

    #[tokio::test]
    async fn test_finalize_without_password_needs_federated_session() {
        let h = harness();
        let mut form = valid_identity();
        form.password = None;
        h.controller.submit_identity(form, true).await.unwrap();
        h.controller.load_prices().await.unwrap();
        h.controller.confirm_plan().unwrap();

        let result = h.controller.finalize_account().await;
        assert!(matches!(result, Err(WizardError::NotAuthenticated)));
        assert!(!h.controller.state().account_created);

        *h.directory.federated.borrow_mut() = Some("uid_fed".into());
        h.controller.finalize_account().await.unwrap();
        let profiles = h.directory.profiles.borrow();
        assert_eq!(
            profiles.get("uid_fed").unwrap().auth_method,
            AuthMethod::Federated
        );
    }

    #[tokio::test]
    async fn test_confirm_plan_is_inert_before_prices_load() {
        let h = harness();
        h.controller
            .submit_identity(valid_identity(), false)
            .await
            .unwrap();

        assert!(!h.controller.confirm_plan().unwrap());
        assert_eq!(h.controller.state().current_step, Step::Plan);
    }

    #[tokio::test]
    async fn test_restart_clears_overlay_and_state() {
        let h = harness();
        drive_to_payment(&h);
        h.gateway.status_times_out.set(true);
        h.controller.reconcile("cs_x").await.unwrap();
        assert!(matches!(h.controller.view(), View::PaymentError(_)));

        h.controller.restart();
        assert_eq!(h.controller.view(), View::Step(Step::Info));
        assert_eq!(h.controller.state(), WizardState::default());
    }

    #[tokio::test]
    async fn test_offline_overlay_wins() {
        let h = harness();
        h.controller.set_online(false);
        assert_eq!(h.controller.view(), View::Offline);

        h.controller.set_online(true);
        assert_eq!(h.controller.view(), View::Step(Step::Info));
    }

    #[tokio::test]
    async fn test_storage_failure_does_not_block_the_wizard() {
        let gateway = Rc::new(ScriptedGateway::default());
        let directory = Rc::new(ScriptedDirectory::default());
        let controller = WizardController::new(WizardDeps {
            gateway: Rc::clone(&gateway) as Rc<dyn CheckoutGateway>,
            directory: Rc::clone(&directory) as Rc<dyn AccountDirectory>,
            store: Rc::new(crate::store::FailingStore) as Rc<dyn StateStore>,
            sleeper: noop_sleeper(),
            policy: RetryPolicy::default(),
        });

        let outcome = controller
            .submit_identity(valid_identity(), false)
            .await
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Advanced);
        assert_eq!(controller.state().current_step, Step::Plan);
    }
}
