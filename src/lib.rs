/// changedetection.io badge - browser extension for a changedetection.io server
/// Built with Rust + WASM + Yew

pub mod api;
pub mod background;
pub mod badge;
pub mod error;
pub mod extension;
pub mod operations;
pub mod reconcile;
pub mod router;
pub mod schedule;
pub mod storage;
pub mod ui;
pub mod watch;

#[cfg(test)]
mod testing;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Register the service worker listeners
#[wasm_bindgen]
pub fn start_background() {
    extension::start_background();
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Start the Yew app for the options page
#[wasm_bindgen]
pub fn start_options() {
    yew::Renderer::<ui::options::OptionsPage>::new().render();
}
