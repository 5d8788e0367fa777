//! Inkboard Application
//!
//! The application shell: windowing, input, the toolbar and the connection
//! to the board store.

mod app;
mod shortcuts;
mod ui;

pub use app::{App, AppConfig};
pub use shortcuts::{Shortcut, ShortcutRegistry};
pub use ui::{render_ui, ConnectionInfo, UiAction, UiState};

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::run_wasm;
