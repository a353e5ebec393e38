//! Shared Components

use leptos::prelude::*;

use elevate_core::catalog::PlanVariant;
use elevate_core::{PaymentFailure, Step};

use crate::app::WizardHandle;

/// Step buttons; a step is clickable only once it has been unlocked
#[component]
pub fn StepIndicator() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    let steps = [
        (Step::Info, "Informations"),
        (Step::Plan, "Plan"),
        (Step::Payment, "Paiement"),
        (Step::Confirmation, "Confirmation"),
    ];

    view! {
        <nav class="step-indicator">
            {steps
                .into_iter()
                .map(|(step, label)| {
                    let state = move || handle.state();
                    view! {
                        <button
                            class="step-button"
                            class:active=move || state().current_step == step
                            class:done=move || state().is_completed(step)
                            disabled=move || !state().can_navigate_to(step)
                            on:click=move |_| {
                                handle.controller().navigate_to(step);
                                handle.bump();
                            }
                        >
                            <span class="step-number">{step.number()}</span>
                            <span class="step-label">{label}</span>
                        </button>
                    }
                })
                .collect_view()}
        </nav>
    }
}

/// Shown while the browser reports no connectivity
#[component]
pub fn OfflineOverlay() -> impl IntoView {
    view! {
        <div class="overlay offline">
            <h2>"Vous êtes hors ligne"</h2>
            <p>"Vérifiez votre connexion internet. L'inscription reprendra automatiquement."</p>
        </div>
    }
}

/// Shown while a payment return is being reconciled
#[component]
pub fn ProcessingOverlay() -> impl IntoView {
    view! {
        <div class="overlay processing">
            <div class="spinner"></div>
            <p>"Vérification de votre paiement..."</p>
        </div>
    }
}

/// Recoverable payment failure with a path back to the payment step
#[component]
pub fn PaymentErrorOverlay(failure: PaymentFailure) -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    view! {
        <div class="overlay payment-error">
            <h2>"Une erreur est survenue"</h2>
            <p class="error-message">{failure.user_message()}</p>
            <div class="actions">
                <button
                    class="btn btn-primary"
                    on:click=move |_| {
                        handle.controller().retry_payment();
                        handle.bump();
                    }
                >
                    "Réessayer"
                </button>
                <button
                    class="btn btn-outline"
                    on:click=move |_| {
                        handle.controller().restart();
                        handle.bump();
                    }
                >
                    "Recommencer l'inscription"
                </button>
            </div>
        </div>
    }
}

/// One selectable plan card
#[component]
pub fn PlanCard(
    plan_id: &'static str,
    title: String,
    price: String,
    description: &'static str,
    discount: Option<&'static str>,
    variant: PlanVariant,
    is_selected: Signal<bool>,
    on_select: Callback<()>,
) -> impl IntoView {
    let variant_class = match variant {
        PlanVariant::Green => "plan-card green",
        PlanVariant::Pink => "plan-card pink",
        PlanVariant::Gray => "plan-card gray",
    };

    view! {
        <div
            class=variant_class
            class:selected=move || is_selected.get()
            data-plan=plan_id
            on:click=move |_| on_select.run(())
        >
            <div class="plan-header">
                <span class="plan-title">{title}</span>
                {discount.map(|d| view! { <span class="plan-discount">{d}</span> })}
            </div>
            <div class="plan-price">{price}</div>
            <p class="plan-description">{description}</p>
        </div>
    }
}
