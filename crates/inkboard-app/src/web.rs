//! WebAssembly entry point and platform-specific code.

use inkboard_core::config::BoardConfig;
use wasm_bindgen::prelude::*;

/// Board settings from the page URL.
///
/// Supports `?board=abc&server=host:port&user=name` and the same after `#`.
/// The hash wins when both set a key. Without a `server` parameter the page
/// origin is used.
pub fn board_config_from_url() -> BoardConfig {
    let Some(window) = web_sys::window() else {
        return BoardConfig::default();
    };
    let location = window.location();

    let mut config = BoardConfig::from_query(&location.search().unwrap_or_default());
    if let Ok(hash) = location.hash() {
        config.merge_query(&hash);
    }
    if config.server_url.is_none() {
        config.server_url = origin_server_url();
    }
    config
}

/// WebSocket URL on the page origin: http(s) becomes ws(s) and `/ws` is appended.
fn origin_server_url() -> Option<String> {
    let window = web_sys::window()?;
    let location = window.location();
    let protocol = location.protocol().ok()?;
    let host = location.host().ok()?;

    let ws_protocol = if protocol == "https:" { "wss:" } else { "ws:" };
    Some(format!("{}//{}/ws", ws_protocol, host))
}

/// Initialize and run the WASM application.
#[wasm_bindgen(start)]
pub async fn run_wasm() {
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::error_1(&format!("Failed to initialize logger: {}", e).into());
    }

    log::info!("Starting Inkboard (WASM)");

    crate::App::run().await;
}
