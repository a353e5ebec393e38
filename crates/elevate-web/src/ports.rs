//! Browser Ports
//!
//! Implementations of the core ports backed by browser APIs: local storage
//! for the persisted wizard record, URL/session-id extraction with history
//! rewriting, reload detection, connectivity, and window control for the
//! billing-portal handoff.

use std::cell::RefCell;

use elevate_core::{MountContext, PortalHandle, PortalWindows, Result, StateStore, WizardError};

/// Wizard persistence in `localStorage`.
///
/// Quota and privacy-mode failures surface as storage errors on write and
/// as an absent record on read; the wizard tolerates both.
pub struct BrowserStore;

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

impl StateStore for BrowserStore {
    fn get(&self, key: &str) -> Option<String> {
        local_storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let storage =
            local_storage().ok_or_else(|| WizardError::Storage("localStorage unavailable".into()))?;
        storage
            .set_item(key, value)
            .map_err(|_| WizardError::Storage(format!("write refused for {key}")))
    }

    fn clear(&self, key: &str) {
        if let Some(storage) = local_storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// Pull the payment-session id out of the URL and strip it from the
/// visible address, so a manual refresh does not re-trigger reconciliation.
fn take_return_session_id() -> Option<String> {
    let window = web_sys::window()?;
    let location = window.location();
    let search = location.search().ok()?;
    if search.is_empty() {
        return None;
    }

    let raw = search.trim_start_matches('?');
    let params = web_sys::UrlSearchParams::new_with_str(raw).ok()?;
    let session_id = params.get("session_id")?;

    params.delete("session_id");
    let remaining = String::from(params.to_string());
    let pathname = location.pathname().unwrap_or_else(|_| "/".into());
    let clean = if remaining.is_empty() {
        pathname
    } else {
        format!("{pathname}?{remaining}")
    };

    if let Ok(history) = window.history() {
        let _ = history.replace_state_with_url(
            &wasm_bindgen::JsValue::NULL,
            "",
            Some(&clean),
        );
    }

    Some(session_id)
}

/// Whether this page load came from a reload navigation
fn navigation_was_reload() -> bool {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.navigation().type_() == web_sys::PerformanceNavigation::TYPE_RELOAD)
        .unwrap_or(false)
}

pub fn is_online() -> bool {
    web_sys::window()
        .map(|w| w.navigator().on_line())
        .unwrap_or(true)
}

/// Gather the mount facts the controller needs, mutating the URL as a side
/// effect (the session id must be gone before anything else runs).
pub fn mount_context() -> MountContext {
    MountContext {
        return_session_id: take_return_session_id(),
        reloaded: navigation_was_reload(),
        online: is_online(),
    }
}

/// Portal window control over `window.open`
#[derive(Default)]
pub struct BrowserWindows {
    slots: RefCell<Vec<web_sys::Window>>,
}

impl BrowserWindows {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PortalWindows for BrowserWindows {
    fn open_blank(&self) -> Option<PortalHandle> {
        let opened = web_sys::window()?
            .open_with_url_and_target("about:blank", "_blank")
            .ok()
            .flatten()?;

        let mut slots = self.slots.borrow_mut();
        slots.push(opened);
        Some(PortalHandle(slots.len() - 1))
    }

    fn navigate(&self, handle: PortalHandle, url: &str) {
        if let Some(window) = self.slots.borrow().get(handle.0) {
            let _ = window.location().set_href(url);
        }
    }

    fn navigate_current(&self, url: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.location().set_href(url);
        }
    }

    fn close(&self, handle: PortalHandle) {
        if let Some(window) = self.slots.borrow().get(handle.0) {
            let _ = window.close();
        }
    }
}
