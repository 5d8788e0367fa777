//! Main application entry point (native).

#[cfg(feature = "native")]
fn main() {
    if std::env::args().any(|arg| arg == "--shortcuts") {
        inkboard_app::ShortcutRegistry::print_all();
        return;
    }

    env_logger::init();
    log::info!("Starting Inkboard");

    pollster::block_on(inkboard_app::App::run());
}

#[cfg(not(feature = "native"))]
fn main() {
    panic!("Native feature not enabled. Use `cargo run --features native`");
}
