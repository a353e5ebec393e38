//! State Persistence
//!
//! Key-value port for the persisted wizard record. The browser target backs
//! it with local storage; tests use the in-memory store. A record that no
//! longer parses is discarded at load time rather than propagated.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;
use crate::state::WizardState;

/// Storage key for the single wizard record
pub const WIZARD_STATE_KEY: &str = "elevate.wizard.v1";

/// Durable string key-value storage
pub trait StateStore {
    /// Read a value, `None` when absent or unreadable
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value
    fn clear(&self, key: &str);
}

/// Persist the wizard state under [`WIZARD_STATE_KEY`]
pub fn persist(state: &WizardState, store: &dyn StateStore) -> Result<()> {
    let encoded = serde_json::to_string(state)?;
    store.set(WIZARD_STATE_KEY, &encoded)
}

/// Load the wizard state, discarding a corrupted record.
///
/// Absent record → defaults. Unparseable record → cleared, defaults.
pub fn load(store: &dyn StateStore) -> WizardState {
    let Some(raw) = store.get(WIZARD_STATE_KEY) else {
        return WizardState::default();
    };

    match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding corrupted wizard record");
            store.clear(WIZARD_STATE_KEY);
            WizardState::default()
        }
    }
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Store whose writes always fail (quota exhausted, private mode)
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
impl StateStore for FailingStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(crate::error::WizardError::Storage("write refused".into()))
    }

    fn clear(&self, _key: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PaymentFields, Step};

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();

        let mut state = WizardState::new();
        state.complete_step(Step::Info);
        state
            .set_identity(crate::state::IdentityFields {
                last_name: "Doe".into(),
                first_name: "Jane".into(),
                email: "jane@example.com".into(),
                phone: "0601020304".into(),
                birth_date: chrono::NaiveDate::from_ymd_opt(1994, 5, 17),
                password: Some("hunter2!".into()),
            })
            .unwrap();
        state.set_payment(PaymentFields {
            payment_intent_id: "sub_42".into(),
            customer_id: "cus_42".into(),
        });

        persist(&state, &store).unwrap();
        let reloaded = load(&store);

        assert_eq!(reloaded, state);
        assert_eq!(reloaded.answers, state.answers);
    }

    #[test]
    fn test_missing_record_yields_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load(&store), WizardState::default());
    }

    #[test]
    fn test_corrupted_record_is_discarded() {
        let store = MemoryStore::new();
        store.set(WIZARD_STATE_KEY, "{not json").unwrap();

        assert_eq!(load(&store), WizardState::default());
        assert!(store.get(WIZARD_STATE_KEY).is_none());
    }
}
