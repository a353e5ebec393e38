//! Step 2 - Plan Choice

use leptos::prelude::*;

use elevate_core::catalog::{LivePrice, PLAN_CATALOG};
use elevate_core::Step;

use crate::app::WizardHandle;
use crate::components::PlanCard;

/// Step-2 plan chooser. Cards merge the static catalog with live pricing;
/// the continue button is inert until pricing has resolved.
#[component]
pub fn PlanStep() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    let prices = RwSignal::new(Option::<Vec<LivePrice>>::None);
    let load_failed = RwSignal::new(false);
    let selected = RwSignal::new(handle.controller().selected_plan());

    leptos::task::spawn_local(async move {
        match handle.controller().load_prices().await {
            Ok(()) => prices.set(handle.controller().prices()),
            Err(_) => load_failed.set(true),
        }
    });

    let price_display = move |price_id: &str| {
        prices.with(|ps| {
            ps.as_ref()
                .and_then(|ps| ps.iter().find(|p| p.id == price_id))
                .map(|p| p.display_price())
                .unwrap_or_else(|| "...".into())
        })
    };

    let title_display = move |price_id: &str| {
        prices.with(|ps| {
            ps.as_ref()
                .and_then(|ps| ps.iter().find(|p| p.id == price_id))
                .map(|p| p.product_name.clone())
                .unwrap_or_else(|| "Chargement...".into())
        })
    };

    let on_continue = move |_| {
        match handle.controller().confirm_plan() {
            Ok(true) => handle.bump(),
            // pricing not resolved yet, the click does nothing
            Ok(false) => {}
            Err(_) => load_failed.set(true),
        }
    };

    view! {
        <div class="step step-plan">
            <header>
                <h1>"Choisis ton plan"</h1>
            </header>

            <Show
                when=move || prices.with(Option::is_some)
                fallback=move || {
                    view! {
                        <div class="loading">
                            <Show
                                when=move || load_failed.get()
                                fallback=|| view! { <p>"Chargement des plans..."</p> }
                            >
                                <p class="error-message">
                                    "Impossible de charger les plans. Vérifiez votre connexion."
                                </p>
                            </Show>
                        </div>
                    }
                }
            >
                <div class="plan-list">
                    {PLAN_CATALOG
                        .iter()
                        .map(|entry| {
                            let plan_id = entry.id;
                            let is_selected =
                                Signal::derive(move || selected.get() == plan_id);
                            let on_select = Callback::new(move |()| {
                                selected.set(plan_id.to_string());
                                handle.controller().select_plan(plan_id);
                            });
                            view! {
                                <PlanCard
                                    plan_id=plan_id
                                    title=title_display(entry.price_id)
                                    price=price_display(entry.price_id)
                                    description=entry.description
                                    discount=entry.discount
                                    variant=entry.variant
                                    is_selected
                                    on_select
                                />
                            }
                        })
                        .collect_view()}
                </div>
            </Show>

            <div class="actions">
                <button
                    class="btn btn-outline"
                    on:click=move |_| {
                        handle.controller().navigate_to(Step::Info);
                        handle.bump();
                    }
                >
                    "Retour"
                </button>
                <button class="btn btn-primary" on:click=on_continue>
                    "Continuer"
                </button>
            </div>
        </div>
    }
}
