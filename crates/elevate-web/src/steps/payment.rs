//! Step 3 - Payment

use leptos::prelude::*;
use wasm_bindgen::prelude::*;

use crate::app::WizardHandle;

#[wasm_bindgen]
extern "C" {
    /// Provided by the host page's payment-platform glue script: mounts the
    /// embedded checkout into `#checkout` for the given client secret.
    #[wasm_bindgen(js_name = mountEmbeddedCheckout)]
    fn mount_embedded_checkout(client_secret: &str);
}

/// Step-3 payment. Creates the checkout session and hands its client
/// secret to the embedded checkout; completion is driven entirely by the
/// redirect back and reconciliation, not by anything in this view.
#[component]
pub fn PaymentStep() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    let error = RwSignal::new(Option::<String>::None);
    let ready = RwSignal::new(false);

    leptos::task::spawn_local(async move {
        match handle.controller().begin_checkout().await {
            Ok(init) => {
                ready.set(true);
                mount_embedded_checkout(&init.client_secret);
                handle.bump();
            }
            Err(e) => error.set(Some(e.user_message())),
        }
    });

    view! {
        <div class="step step-payment">
            <header>
                <h1>"Paiement sécurisé"</h1>
                <p>
                    "Votre paiement est sécurisé. Vos données bancaires ne sont jamais stockées sur nos serveurs."
                </p>
            </header>

            {move || error.get().map(|m| view! { <p class="error-message">{m}</p> })}

            <Show when=move || !ready.get() && error.with(Option::is_none)>
                <div class="loading">
                    <p>"Préparation du paiement..."</p>
                </div>
            </Show>

            <div id="checkout" class="checkout-container"></div>
        </div>
    }
}
