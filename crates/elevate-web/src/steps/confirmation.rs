//! Step 4 - Confirmation & Account Creation

use std::rc::Rc;

use chrono::Months;
use leptos::prelude::*;

use crate::app::WizardHandle;
use crate::ports::BrowserWindows;

/// Billing period label shown next to the amount
fn billing_period_label(months: u32) -> String {
    match months {
        1 => "/mois".into(),
        6 => "/6 mois".into(),
        12 => "/an".into(),
        other => format!("/{other} mois"),
    }
}

/// Date of the next charge, one billing period from now
fn next_payment_date(months: u32) -> String {
    let today = chrono::Utc::now().date_naive();
    today
        .checked_add_months(Months::new(months))
        .unwrap_or(today)
        .format("%d/%m/%Y")
        .to_string()
}

/// Step-4 view. Creates the identity record exactly once on entry, then
/// shows the summary with the billing-portal handoff. On failure the user
/// gets a manual retry (full reload) and creation will re-attempt.
#[component]
pub fn ConfirmationStep() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    let creating = RwSignal::new(!handle.controller().state().account_created);
    let error = RwSignal::new(Option::<String>::None);
    let redirecting = RwSignal::new(false);
    let windows = StoredValue::new_local(Rc::new(BrowserWindows::new()));

    leptos::task::spawn_local(async move {
        match handle.controller().finalize_account().await {
            Ok(()) => {
                creating.set(false);
                handle.bump();
            }
            Err(e) => {
                error.set(Some(e.user_message()));
                creating.set(false);
            }
        }
    });

    let manage_subscription = move |_| {
        if redirecting.get() {
            return;
        }
        redirecting.set(true);
        leptos::task::spawn_local(async move {
            let outcome = handle
                .controller()
                .open_billing_portal(windows.get_value().as_ref())
                .await;
            redirecting.set(false);
            if let Err(e) = outcome {
                error.set(Some(e.user_message()));
            }
        });
    };

    let reload = move |_| {
        if let Some(window) = web_sys::window() {
            let _ = window.location().reload();
        }
    };

    let summary = move || {
        let state = handle.state();
        state.answers.plan.map(|plan| {
            view! {
                <div class="plan-summary">
                    <div class="row">
                        <span>"Plan sélectionné"</span>
                        <strong>{plan.plan_name.clone()}</strong>
                    </div>
                    <div class="row">
                        <span>"Montant"</span>
                        <strong>
                            {format!(
                                "{:.2}€{}",
                                plan.plan_price,
                                billing_period_label(plan.billing_period_months),
                            )}
                        </strong>
                    </div>
                    <div class="row">
                        <span>"Prochain paiement"</span>
                        <span>{next_payment_date(plan.billing_period_months)}</span>
                    </div>
                </div>
            }
        })
    };

    view! {
        <div class="step step-confirmation">
            <Show
                when=move || !creating.get()
                fallback=|| {
                    view! {
                        <div class="loading">
                            <div class="spinner"></div>
                            <p>"Création de votre compte..."</p>
                        </div>
                    }
                }
            >
                <Show
                    when=move || error.with(Option::is_none)
                    fallback=move || {
                        view! {
                            <div class="error-panel">
                                <h1>"Une erreur est survenue"</h1>
                                <p class="error-message">{error.get().unwrap_or_default()}</p>
                                <button class="btn btn-primary" on:click=reload>
                                    "Réessayer"
                                </button>
                            </div>
                        }
                    }
                >
                    <div class="success">
                        <h1>
                            {move || {
                                format!("Bienvenue {} !", handle.state().answers.identity.first_name)
                            }}
                        </h1>
                        <p>
                            "Votre compte a été créé avec succès et votre paiement a été confirmé. "
                            "Un email de confirmation vous a été envoyé à "
                            <strong>{move || handle.state().answers.identity.email}</strong>
                            "."
                        </p>

                        {summary}

                        <button
                            class="btn btn-primary"
                            disabled=move || redirecting.get()
                            on:click=manage_subscription
                        >
                            {move || {
                                if redirecting.get() { "Redirection..." } else { "Gérer mon abonnement" }
                            }}
                        </button>

                        <p class="help">
                            "Besoin d'aide ? " <a href="/support">"Contactez le support"</a>
                        </p>
                    </div>
                </Show>
            </Show>
        </div>
    }
}
