//! Elevate Web Frontend
//!
//! Leptos-based WASM frontend for the signup wizard.

mod api;
mod app;
mod components;
mod ports;
mod steps;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
