//! Main App Component

use std::rc::Rc;
use std::time::Duration;

use leptos::prelude::*;
use leptos_router::{components::*, path};

use elevate_core::{
    AccountDirectory, CheckoutGateway, MountContext, RetryPolicy, StateStore, Step, View,
    WizardController, WizardDeps, WizardState,
};
use elevate_identity::{DirectoryConfig, RestDirectory};

use crate::api::{js_sleep, HttpGateway};
use crate::components::{OfflineOverlay, PaymentErrorOverlay, ProcessingOverlay, StepIndicator};
use crate::ports::{mount_context, BrowserStore};
use crate::steps::{ConfirmationStep, InfoStep, PaymentStep, PlanStep};

/// Shared access to the wizard controller plus a revision signal the views
/// subscribe to; every mutation bumps it.
#[derive(Clone, Copy)]
pub struct WizardHandle {
    controller: StoredValue<Rc<WizardController>, LocalStorage>,
    revision: RwSignal<u64>,
}

impl WizardHandle {
    fn new(controller: Rc<WizardController>) -> Self {
        Self {
            controller: StoredValue::new_local(controller),
            revision: RwSignal::new(0),
        }
    }

    pub fn controller(&self) -> Rc<WizardController> {
        self.controller.get_value()
    }

    /// Signal the views that controller state changed
    pub fn bump(&self) {
        self.revision.update(|n| *n += 1);
    }

    /// Reactive read of what the wizard shell should render
    pub fn view(&self) -> View {
        self.revision.get();
        self.controller().view()
    }

    /// Reactive snapshot of the wizard state
    pub fn state(&self) -> WizardState {
        self.revision.get();
        self.controller().state()
    }
}

fn directory_config() -> DirectoryConfig {
    DirectoryConfig {
        api_key: option_env!("IDENTITY_API_KEY").unwrap_or("dev-key").into(),
        auth_url: option_env!("IDENTITY_AUTH_URL")
            .unwrap_or("https://identitytoolkit.googleapis.com")
            .into(),
        docs_url: option_env!("IDENTITY_DOCS_URL")
            .unwrap_or("http://localhost:3000/api/profiles")
            .into(),
    }
}

fn build_controller() -> Rc<WizardController> {
    let policy = RetryPolicy::default();
    Rc::new(WizardController::new(WizardDeps {
        gateway: Rc::new(HttpGateway::new(policy)) as Rc<dyn CheckoutGateway>,
        directory: Rc::new(RestDirectory::new(directory_config())) as Rc<dyn AccountDirectory>,
        store: Rc::new(BrowserStore) as Rc<dyn StateStore>,
        sleeper: Rc::new(|d: Duration| js_sleep(d)),
        policy,
    }))
}

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    let handle = WizardHandle::new(build_controller());
    provide_context(handle);

    // Reconcile a payment return, or restart after a plain reload
    leptos::task::spawn_local(async move {
        let ctx: MountContext = mount_context();
        let _ = handle.controller().on_mount(ctx).await;
        handle.bump();
    });

    // Connectivity gate
    let on_online = window_event_listener(leptos::ev::online, move |_| {
        handle.controller().set_online(true);
        handle.bump();
    });
    let on_offline = window_event_listener(leptos::ev::offline, move |_| {
        handle.controller().set_online(false);
        handle.bump();
    });
    on_cleanup(move || {
        handle.controller().cancel_token().cancel();
        on_online.remove();
        on_offline.remove();
    });

    view! {
        <Router>
            <main class="app">
                <Routes fallback=|| view! { <p>"Page non trouvée"</p> }>
                    <Route path=path!("/") view=SignupPage />
                    <Route path=path!("/signup") view=SignupPage />
                </Routes>
            </main>
        </Router>
    }
}

/// The four-step signup wizard
#[component]
pub fn SignupPage() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    // Deduped so an unrelated bump does not remount the current step
    let current = Memo::new(move |_| handle.view());

    view! {
        <div class="signup">
            <StepIndicator />

            {move || match current.get() {
                View::Offline => view! { <OfflineOverlay /> }.into_any(),
                View::PaymentProcessing => view! { <ProcessingOverlay /> }.into_any(),
                View::PaymentError(failure) => {
                    view! { <PaymentErrorOverlay failure /> }.into_any()
                }
                View::Step(Step::Info) => view! { <InfoStep /> }.into_any(),
                View::Step(Step::Plan) => view! { <PlanStep /> }.into_any(),
                View::Step(Step::Payment) => view! { <PaymentStep /> }.into_any(),
                View::Step(Step::Confirmation) => view! { <ConfirmationStep /> }.into_any(),
            }}
        </div>
    }
}
