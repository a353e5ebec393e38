//! Step 1 - Personal Information

use leptos::ev::SubmitEvent;
use leptos::prelude::*;

use elevate_core::validate::PASSWORD_MIN_LENGTH;
use elevate_core::{FieldErrors, IdentityFields, SubmitOutcome};

use crate::app::WizardHandle;

/// Step-1 form. Once the account exists the fields render read-only; the
/// submit button stays disabled.
#[component]
pub fn InfoStep() -> impl IntoView {
    let handle = expect_context::<WizardHandle>();

    let saved = handle.controller().state();
    let frozen = saved.account_created;
    let identity = saved.answers.identity;

    let last_name = RwSignal::new(identity.last_name);
    let first_name = RwSignal::new(identity.first_name);
    let email = RwSignal::new(identity.email);
    let phone = RwSignal::new(identity.phone);
    let birth_date = RwSignal::new(
        identity
            .birth_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    );
    let password = RwSignal::new(identity.password.unwrap_or_default());

    let errors = RwSignal::new(FieldErrors::new());
    let network_error = RwSignal::new(Option::<String>::None);
    let checking = RwSignal::new(false);

    let field_error = move |field: &'static str| {
        errors.with(|e| e.get(field).cloned())
    };

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();
        if checking.get() || frozen {
            return;
        }

        let form = IdentityFields {
            last_name: last_name.get(),
            first_name: first_name.get(),
            email: email.get(),
            phone: phone.get(),
            birth_date: chrono::NaiveDate::parse_from_str(&birth_date.get(), "%Y-%m-%d").ok(),
            password: Some(password.get()).filter(|p| !p.is_empty()),
        };

        checking.set(true);
        network_error.set(None);
        leptos::task::spawn_local(async move {
            let outcome = handle.controller().submit_identity(form, false).await;
            checking.set(false);
            match outcome {
                Ok(SubmitOutcome::Advanced) => {
                    errors.set(FieldErrors::new());
                    handle.bump();
                }
                Ok(SubmitOutcome::Rejected(field_errors)) => errors.set(field_errors),
                Err(e) => network_error.set(Some(e.user_message())),
            }
        });
    };

    view! {
        <div class="step step-info">
            <header>
                <h1>"Démarre ton aventure"</h1>
                <Show when=move || frozen>
                    <p class="notice">
                        "Votre compte est créé. Ces informations ne peuvent plus être modifiées."
                    </p>
                </Show>
            </header>

            <form on:submit=on_submit>
                <div class="field-row">
                    <label>
                        "Nom"
                        <input
                            type="text"
                            placeholder="Doe"
                            prop:value=last_name
                            disabled=frozen
                            on:input=move |ev| last_name.set(event_target_value(&ev))
                        />
                        {move || field_error("lastName").map(|m| view! { <p class="field-error">{m}</p> })}
                    </label>
                    <label>
                        "Prénom"
                        <input
                            type="text"
                            placeholder="Jane"
                            prop:value=first_name
                            disabled=frozen
                            on:input=move |ev| first_name.set(event_target_value(&ev))
                        />
                        {move || field_error("firstName").map(|m| view! { <p class="field-error">{m}</p> })}
                    </label>
                </div>

                <div class="field-row">
                    <label>
                        "Email"
                        <input
                            type="email"
                            placeholder="janedoe@gmail.com"
                            prop:value=email
                            disabled=frozen
                            on:input=move |ev| email.set(event_target_value(&ev))
                        />
                        {move || field_error("email").map(|m| view! { <p class="field-error">{m}</p> })}
                    </label>
                    <label>
                        "Téléphone"
                        <input
                            type="tel"
                            placeholder="+33601020304"
                            prop:value=phone
                            disabled=frozen
                            on:input=move |ev| phone.set(event_target_value(&ev))
                        />
                        {move || field_error("phone").map(|m| view! { <p class="field-error">{m}</p> })}
                    </label>
                </div>

                <label>
                    "Date de naissance"
                    <input
                        type="date"
                        prop:value=birth_date
                        disabled=frozen
                        on:input=move |ev| birth_date.set(event_target_value(&ev))
                    />
                    {move || field_error("birthDate").map(|m| view! { <p class="field-error">{m}</p> })}
                </label>

                <Show when=move || !frozen>
                    <label>
                        "Mot de passe"
                        <input
                            type="password"
                            placeholder="****************"
                            prop:value=password
                            on:input=move |ev| password.set(event_target_value(&ev))
                        />
                        <p class="hint">{format!("Minimum {PASSWORD_MIN_LENGTH} caractères")}</p>
                        {move || field_error("password").map(|m| view! { <p class="field-error">{m}</p> })}
                    </label>
                </Show>

                {move || network_error.get().map(|m| view! { <p class="error-message">{m}</p> })}

                <button type="submit" class="btn btn-primary" disabled=move || checking.get() || frozen>
                    {move || if checking.get() { "Vérification..." } else { "Créer mon compte" }}
                </button>
            </form>
        </div>
    }
}
