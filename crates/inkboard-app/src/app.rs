//! Main application state and event loop.

use inkboard_core::config::BoardConfig;
use inkboard_core::export::ExportOptions;
use inkboard_core::input::{KeyAction, Modifiers, MouseButton as BoardButton, PointerEvent, StrokeInput};
use inkboard_core::remote::{RemoteBoard, RemoteChange};
use inkboard_core::snapshot::SnapshotError;
use inkboard_core::sync::{ConnectionState, PlatformWebSocket};
use inkboard_core::whiteboard::{StrokeOutcome, Whiteboard};
use inkboard_render::{default_board_size, BoardLayout, BoardRenderer, RenderContext, Renderer};
use kurbo::{Point, Size};
use peniko::Color;
use std::sync::Arc;
use vello::util::RenderSurface;
use vello::wgpu::PresentMode;
use vello::{AaConfig, RenderParams, RendererOptions};
use winit::application::ApplicationHandler;
#[cfg(not(target_arch = "wasm32"))]
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};
#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

use crate::ui::{render_ui, to_color32, to_rgba, ConnectionInfo, UiAction, UiState, TOOLBAR_HEIGHT};

/// Wait before reconnecting to the board store.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[cfg(not(target_arch = "wasm32"))]
mod file_ops {
    use inkboard_core::export::{export_png_to_path, ExportError, ExportOptions, DEFAULT_EXPORT_FILE_NAME};
    use inkboard_core::whiteboard::Whiteboard;
    use std::path::PathBuf;

    /// Ask for a destination and write the board there. `None` when cancelled.
    pub fn export_board(board: &Whiteboard, options: &ExportOptions) -> Result<Option<PathBuf>, ExportError> {
        let dialog = rfd::FileDialog::new()
            .set_title("Export PNG")
            .set_file_name(DEFAULT_EXPORT_FILE_NAME)
            .add_filter("PNG Image", &["png"]);

        let Some(path) = dialog.save_file() else {
            return Ok(None);
        };
        export_png_to_path(board, options, &path)?;
        Ok(Some(path))
    }
}

#[cfg(target_arch = "wasm32")]
mod file_ops {
    use inkboard_core::export::{export_png, ExportOptions, DEFAULT_EXPORT_FILE_NAME};
    use inkboard_core::whiteboard::Whiteboard;
    use wasm_bindgen::prelude::*;

    /// Encode the board and hand it to the browser as a download.
    pub fn export_board(board: &Whiteboard, options: &ExportOptions) -> Result<(), String> {
        let png = export_png(board, options).map_err(|e| e.to_string())?;
        download_binary_file(DEFAULT_EXPORT_FILE_NAME, &png, "image/png")
            .map_err(|e| format!("Download failed: {:?}", e))
    }

    fn download_binary_file(filename: &str, data: &[u8], mime_type: &str) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("No document"))?;

        let uint8_array = js_sys::Uint8Array::from(data);
        let blob_parts = js_sys::Array::new();
        blob_parts.push(&uint8_array);

        let options = web_sys::BlobPropertyBag::new();
        options.set_type(mime_type);
        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&blob_parts, &options)?;

        let url = web_sys::Url::create_object_url_with_blob(&blob)?;
        let a = document
            .create_element("a")?
            .dyn_into::<web_sys::HtmlAnchorElement>()?;
        a.set_href(&url);
        a.set_download(filename);
        a.click();

        web_sys::Url::revoke_object_url(&url).ok();
        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background_color: Color,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Inkboard".to_string(),
            width: 1280,
            height: 800,
            background_color: Color::from_rgba8(243, 244, 246, 255),
        }
    }
}

/// Board settings for this platform: environment natively, page URL on the web.
fn platform_board_config() -> BoardConfig {
    #[cfg(target_arch = "wasm32")]
    {
        crate::web::board_config_from_url()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        BoardConfig::from_env()
    }
}

/// Socket to the board store and its reconnect timer.
struct Connection {
    url: String,
    socket: PlatformWebSocket,
    retry_at: Option<Instant>,
}

impl Connection {
    fn open(url: String) -> Self {
        let mut socket = PlatformWebSocket::new();
        log::info!("Connecting to board store at {}", url);
        if let Err(e) = socket.connect(&url) {
            log::error!("WebSocket connect failed: {}", e);
        }
        Self {
            url,
            socket,
            retry_at: None,
        }
    }

    /// Reconnect after [`RECONNECT_DELAY`] once the socket has dropped.
    fn maintain(&mut self) {
        match self.socket.state() {
            ConnectionState::Connected | ConnectionState::Connecting => self.retry_at = None,
            ConnectionState::Disconnected | ConnectionState::Error => {
                let now = Instant::now();
                match self.retry_at {
                    None => self.retry_at = Some(now + RECONNECT_DELAY),
                    Some(at) if now >= at => {
                        self.retry_at = None;
                        log::info!("Reconnecting to {}", self.url);
                        self.socket.disconnect();
                        if let Err(e) = self.socket.connect(&self.url) {
                            log::warn!("Reconnect failed: {}", e);
                        }
                    }
                    Some(_) => {}
                }
            }
        }
    }
}

/// Runtime state for the application.
struct AppState {
    // Windowing
    window: Arc<Window>,
    surface: RenderSurface<'static>,

    // Rendering
    vello_renderer: vello::Renderer,
    board_renderer: BoardRenderer,
    /// Texture blitter for RGBA->surface format conversion (needed for WebGPU/WASM)
    texture_blitter: vello::wgpu::util::TextureBlitter,

    // egui
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    ui_state: UiState,

    // Board
    board: Whiteboard,
    board_id: String,
    user_name: Option<String>,
    stroke_input: StrokeInput,
    layout: BoardLayout,
    /// Pointer position in window pixels.
    cursor: Option<Point>,
    modifiers: Modifiers,
    config: AppConfig,

    // Persistence
    remote: RemoteBoard,
    connection: Option<Connection>,
    #[cfg(not(target_arch = "wasm32"))]
    autosave: Option<inkboard_core::storage::PlatformAutoSaveManager>,
}

/// Main application struct.
pub struct App {
    config: AppConfig,
    board_config: BoardConfig,
    state: Option<AppState>,
    render_cx: Option<vello::util::RenderContext>,
    /// Window waiting for async surface creation (WASM only)
    pending_window: Option<Arc<Window>>,
    /// Flag to indicate async init is in progress
    #[cfg(target_arch = "wasm32")]
    init_in_progress: std::cell::Cell<bool>,
}

impl App {
    /// Create an application configured for the current platform.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), platform_board_config())
    }

    pub fn with_config(config: AppConfig, board_config: BoardConfig) -> Self {
        Self {
            config,
            board_config,
            state: None,
            render_cx: None,
            pending_window: None,
            #[cfg(target_arch = "wasm32")]
            init_in_progress: std::cell::Cell::new(false),
        }
    }

    /// Run the application.
    pub async fn run() {
        let event_loop = EventLoop::new().expect("Failed to create event loop");
        let app = App::new();

        #[cfg(target_arch = "wasm32")]
        {
            use winit::platform::web::EventLoopExtWebSys;
            event_loop.spawn_app(app);
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut app = app;
            event_loop.run_app(&mut app).expect("Event loop error");
        }
    }

    /// Finish initialization after surface is created.
    fn finish_init(&mut self, window: Arc<Window>, surface: RenderSurface<'static>) {
        let render_cx = self.render_cx.as_ref().expect("RenderContext not initialized");
        let device = &render_cx.devices[surface.dev_id].device;

        let vello_renderer =
            vello::Renderer::new(device, RendererOptions::default()).expect("Failed to create Vello renderer");

        // Vello renders to Rgba8Unorm; the surface may be Bgra8Unorm.
        let texture_blitter = vello::wgpu::util::TextureBlitter::new(device, surface.config.format);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(
            device,
            surface.config.format,
            egui_wgpu::RendererOptions::default(),
        );

        let viewport = Size::new(surface.config.width as f64, surface.config.height as f64);
        let (board_width, board_height) = default_board_size(viewport);
        let board = Whiteboard::new(board_width, board_height);

        let board_config = self.board_config.clone();
        log::info!(
            "Inkboard initialized - window {}x{}, board '{}' {}x{}",
            surface.config.width,
            surface.config.height,
            board_config.board,
            board_width,
            board_height
        );

        let mut remote = RemoteBoard::new(board_config.user_name.clone());
        let connection = board_config.server_url.clone().map(|url| {
            remote.subscribe(&board_config.board);
            Connection::open(url)
        });
        if connection.is_none() {
            log::info!("No board store configured, working locally");
        }

        let mut state = AppState {
            window: window.clone(),
            surface,
            vello_renderer,
            board_renderer: BoardRenderer::new(),
            texture_blitter,
            egui_ctx,
            egui_state,
            egui_renderer,
            ui_state: UiState::default(),
            board,
            board_id: board_config.board.clone(),
            user_name: board_config.user_name.clone(),
            stroke_input: StrokeInput::new(),
            layout: BoardLayout::fit(viewport, (board_width, board_height), 0.0),
            cursor: None,
            modifiers: Modifiers::default(),
            config: self.config.clone(),
            remote,
            connection,
            #[cfg(not(target_arch = "wasm32"))]
            autosave: None,
        };

        #[cfg(not(target_arch = "wasm32"))]
        init_autosave(&mut state);

        relayout(&mut state);
        self.state = Some(state);
        self.pending_window = None;

        window.request_redraw();
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the local board store and, when working offline, restore the board from it.
#[cfg(not(target_arch = "wasm32"))]
fn init_autosave(state: &mut AppState) {
    use inkboard_core::config::DEFAULT_BOARD;

    let mut autosave = match inkboard_core::storage::create_autosave_manager() {
        Ok(manager) => manager,
        Err(e) => {
            log::warn!("Auto-save disabled: {}", e);
            return;
        }
    };

    if state.connection.is_none() {
        let restored = match pollster::block_on(autosave.load(&state.board_id)) {
            Ok(doc) => Some(doc),
            Err(_) if state.board_id == DEFAULT_BOARD => pollster::block_on(autosave.load_last()),
            Err(e) => {
                log::debug!("Nothing saved for board '{}': {}", state.board_id, e);
                None
            }
        };
        if let Some(doc) = restored {
            match doc.to_snapshot().and_then(|snapshot| state.board.restore(&snapshot)) {
                Ok(()) => {
                    log::info!("Restored board '{}' ({}x{})", doc.id, doc.width, doc.height);
                    state.board.mark_clean();
                }
                Err(e) => log::warn!("Saved board '{}' is unreadable: {}", doc.id, e),
            }
        }
    }

    autosave.set_board_id(Some(state.board_id.clone()));
    state.autosave = Some(autosave);
}

/// Write the board locally when the auto-save interval has passed.
#[cfg(not(target_arch = "wasm32"))]
fn autosave_tick(state: &mut AppState, force: bool) {
    use inkboard_core::storage::BoardDocument;

    let Some(autosave) = state.autosave.as_mut() else {
        return;
    };
    let due = if force {
        autosave.is_dirty()
    } else {
        autosave.should_save()
    };
    if !due || state.board.is_drawing() {
        return;
    }

    let snapshot = match state.board.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("Auto-save skipped: {}", e);
            return;
        }
    };
    let doc = BoardDocument::from_snapshot(state.board_id.clone(), &snapshot, state.user_name.clone());
    if let Err(e) = pollster::block_on(autosave.save(&doc)) {
        log::warn!("Auto-save failed: {}", e);
    }
}

fn mark_autosave_dirty(state: &mut AppState) {
    #[cfg(not(target_arch = "wasm32"))]
    if let Some(autosave) = state.autosave.as_mut() {
        autosave.mark_dirty();
    }
    #[cfg(target_arch = "wasm32")]
    let _ = state;
}

/// Recompute where the board sits after the window or scale changed.
fn relayout(state: &mut AppState) {
    let viewport = Size::new(state.surface.config.width as f64, state.surface.config.height as f64);
    let toolbar = TOOLBAR_HEIGHT as f64 * state.window.scale_factor();
    state.layout = BoardLayout::fit(viewport, state.board.size(), toolbar);
}

/// The board pixels changed locally: publish and schedule a local save.
fn on_board_changed(state: &mut AppState) {
    if state.connection.is_some() {
        if let Err(e) = state.remote.publish_board(&state.board) {
            log::warn!("Could not publish board: {}", e);
        }
    }
    mark_autosave_dirty(state);
}

fn finish_stroke(state: &mut AppState, outcome: Option<StrokeOutcome>) {
    if outcome.is_some_and(StrokeOutcome::is_changed) {
        on_board_changed(state);
    }
}

fn commit(state: &mut AppState, what: &str, result: Result<bool, SnapshotError>) {
    match result {
        Ok(true) => on_board_changed(state),
        Ok(false) => log::debug!("{}: nothing to do", what),
        Err(e) => {
            log::error!("{} failed: {}", what, e);
            state.ui_state.notice = Some(format!("{} failed: {}", what, e));
        }
    }
}

fn on_remote_change(state: &mut AppState, change: RemoteChange) {
    match change {
        RemoteChange::Applied { from, updated_at } => {
            log::info!(
                "Board updated from {} (at {})",
                from.as_deref().unwrap_or("store"),
                updated_at
            );
            mark_autosave_dirty(state);
        }
        RemoteChange::PublishedLocal => {
            log::info!("Local board is newer than the store, published it");
        }
        RemoteChange::Rejected { reason } => {
            log::warn!("Rejected remote board: {}", reason);
            state.ui_state.notice = Some(format!("Could not load remote board: {}", reason));
        }
        RemoteChange::Read { document } => {
            log::info!(
                "Read board '{}' ({}x{}, updated at {})",
                document.id,
                document.width,
                document.height,
                document.updated_at
            );
        }
    }
}

/// Drain socket events, apply them, and send queued frames.
fn pump_remote(state: &mut AppState) {
    let Some(connection) = state.connection.as_mut() else {
        return;
    };

    let mut changes = Vec::new();
    for event in connection.socket.poll_events() {
        if let Some(change) = state.remote.handle_event(event, &mut state.board) {
            changes.push(change);
        }
    }
    connection.maintain();

    if let Some(change) = state.remote.apply_deferred(&mut state.board) {
        changes.push(change);
    }

    for msg in state.remote.take_outgoing() {
        if let Err(e) = connection.socket.send(&msg) {
            log::warn!("Dropped outgoing frame: {}", e);
        }
    }

    for change in changes {
        on_remote_change(state, change);
    }
}

fn export_board(state: &mut AppState) {
    let options = ExportOptions::default();

    #[cfg(not(target_arch = "wasm32"))]
    match file_ops::export_board(&state.board, &options) {
        Ok(Some(path)) => log::info!("Exported PNG to: {:?}", path),
        Ok(None) => log::debug!("Export cancelled"),
        Err(e) => {
            log::error!("Failed to export PNG: {}", e);
            state.ui_state.notice = Some(format!("Export failed: {}", e));
        }
    }

    #[cfg(target_arch = "wasm32")]
    if let Err(e) = file_ops::export_board(&state.board, &options) {
        log::error!("Failed to export PNG: {}", e);
        state.ui_state.notice = Some(format!("Export failed: {}", e));
    }
}

fn apply_action(state: &mut AppState, action: UiAction) {
    match action {
        UiAction::SetColor(color) => state.board.set_color(to_rgba(color)),
        UiAction::SetLineWidth(width) => state.board.set_line_width(width),
        UiAction::Clear => {
            let result = state.board.clear();
            commit(state, "Clear", result);
        }
        UiAction::Undo => {
            let result = state.board.undo();
            commit(state, "Undo", result);
        }
        UiAction::Redo => {
            let result = state.board.redo();
            commit(state, "Redo", result);
        }
        UiAction::Export => export_board(state),
        UiAction::ToggleShortcuts => {
            state.ui_state.shortcuts_modal_open = !state.ui_state.shortcuts_modal_open;
        }
        UiAction::DismissNotice => state.ui_state.notice = None,
    }
}

/// Mirror board and connection state into the toolbar.
fn sync_ui_state(state: &mut AppState) {
    let brush = state.board.brush();
    let ui = &mut state.ui_state;
    ui.brush_color = to_color32(brush.color);
    ui.line_width = brush.width();
    ui.can_undo = state.board.can_undo();
    ui.can_redo = state.board.can_redo();
    ui.is_blank = state.board.is_blank();
    ui.connection = match &state.connection {
        Some(connection) => ConnectionInfo {
            enabled: true,
            state: connection.socket.state(),
            board: state.board_id.clone(),
            subscribed: state.remote.is_subscribed(),
            subscriber_count: state.remote.subscriber_count(),
            unsaved: state.board.is_dirty() || state.remote.has_pending(),
        },
        None => ConnectionInfo::local(&state.board_id),
    };
}

fn map_button(button: MouseButton) -> Option<BoardButton> {
    match button {
        MouseButton::Left => Some(BoardButton::Left),
        MouseButton::Right => Some(BoardButton::Right),
        MouseButton::Middle => Some(BoardButton::Middle),
        _ => None,
    }
}

/// Logical key name understood by [`KeyAction::from_key`].
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(s) => Some(s.to_string()),
        Key::Named(NamedKey::Backspace) => Some("Backspace".to_string()),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() || self.pending_window.is_some() {
            return;
        }

        log::info!("Creating window...");

        #[cfg(not(target_arch = "wasm32"))]
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        // On WASM, attach canvas to DOM and use full viewport
        #[cfg(target_arch = "wasm32")]
        let window_attrs = {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            let web_window = web_sys::window().expect("No window");
            let document = web_window.document().expect("No document");

            let viewport_width = web_window
                .inner_width()
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(self.config.width as f64);
            let viewport_height = web_window
                .inner_height()
                .ok()
                .and_then(|v| v.as_f64())
                .unwrap_or(self.config.height as f64);

            if let Some(loading) = document.get_element_by_id("loading") {
                loading.remove();
            }

            let canvas = document
                .get_element_by_id("inkboard-canvas")
                .and_then(|e| e.dyn_into::<web_sys::HtmlCanvasElement>().ok())
                .or_else(|| {
                    let app_div = document.get_element_by_id("app")?;
                    let canvas = document.create_element("canvas").ok()?;
                    canvas.set_id("inkboard-canvas");
                    app_div.append_child(&canvas).ok()?;
                    canvas.dyn_into::<web_sys::HtmlCanvasElement>().ok()
                })
                .expect("Failed to create canvas");

            let dpr = web_window.device_pixel_ratio();
            canvas.set_width((viewport_width * dpr) as u32);
            canvas.set_height((viewport_height * dpr) as u32);
            let style = canvas.style();
            let _ = style.set_property("width", "100%");
            let _ = style.set_property("height", "100%");
            let _ = style.set_property("display", "block");
            let _ = style.set_property("position", "fixed");
            let _ = style.set_property("top", "0");
            let _ = style.set_property("left", "0");

            Window::default_attributes()
                .with_title(&self.config.title)
                .with_canvas(Some(canvas))
        };

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .expect("Failed to create window"),
        );

        let size = window.inner_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (size.width, size.height)
        };

        log::info!("Surface size: {}x{}", width, height);

        // On native, block on async surface creation
        #[cfg(not(target_arch = "wasm32"))]
        {
            let render_cx = self.render_cx.get_or_insert_with(vello::util::RenderContext::new);

            let surface = pollster::block_on(render_cx.create_surface(
                window.clone(),
                width,
                height,
                PresentMode::AutoVsync,
            ))
            .expect("Failed to create surface");

            // The surface borrows the window, which AppState keeps alive alongside it.
            let surface: RenderSurface<'static> = unsafe { std::mem::transmute(surface) };
            self.finish_init(window, surface);
        }

        // On WASM, store window for later async initialization
        #[cfg(target_arch = "wasm32")]
        {
            self.pending_window = Some(window);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        #[cfg(target_arch = "wasm32")]
        if self.state.is_none() {
            if let Some(window) = self.pending_window.clone() {
                if !self.init_in_progress.get() {
                    self.init_in_progress.set(true);

                    let size = window.inner_size();
                    let width = size.width.max(1);
                    let height = size.height.max(1);

                    let self_ptr = self as *mut Self;
                    let window_clone = window.clone();

                    wasm_bindgen_futures::spawn_local(async move {
                        let mut render_cx = vello::util::RenderContext::new();

                        match render_cx
                            .create_surface(window_clone.clone(), width, height, PresentMode::AutoVsync)
                            .await
                        {
                            Ok(surface) => {
                                let surface: RenderSurface<'static> = unsafe { std::mem::transmute(surface) };

                                // SAFETY: WASM is single-threaded and the event loop keeps the App alive.
                                let app = unsafe { &mut *self_ptr };
                                app.render_cx = Some(render_cx);
                                app.finish_init(window_clone, surface);
                            }
                            Err(e) => {
                                log::error!("Failed to create surface: {:?}", e);
                                let app = unsafe { &mut *self_ptr };
                                app.init_in_progress.set(false);
                            }
                        }
                    });
                }

                window.request_redraw();
            }
            return;
        }

        let Some(state) = &mut self.state else {
            return;
        };

        let egui_response = state.egui_state.on_window_event(&state.window, &event);
        let egui_wants_pointer = egui_response.consumed
            || state.egui_ctx.is_pointer_over_area()
            || state.egui_ctx.wants_pointer_input();
        let egui_wants_keyboard = state.egui_ctx.wants_keyboard_input();

        match event {
            WindowEvent::CloseRequested => {
                #[cfg(not(target_arch = "wasm32"))]
                autosave_tick(state, true);
                if let Some(connection) = state.connection.as_mut() {
                    connection.socket.disconnect();
                }
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                if let Some(render_cx) = self.render_cx.as_mut() {
                    render_cx.resize_surface(&mut state.surface, size.width, size.height);
                }
                relayout(state);
                state.window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                relayout(state);
                state.window.request_redraw();
            }

            WindowEvent::ModifiersChanged(modifiers) => {
                let m = modifiers.state();
                state.modifiers = Modifiers {
                    shift: m.shift_key(),
                    ctrl: m.control_key(),
                    alt: m.alt_key(),
                    meta: m.super_key(),
                };
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if egui_wants_keyboard || event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let Some(key) = key_name(&event.logical_key) else {
                    return;
                };
                if let Some(action) = KeyAction::from_key(&key, state.modifiers) {
                    log::debug!("Shortcut: {}", action.description());
                    apply_action(state, action.into());
                    state.window.request_redraw();
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let point = Point::new(position.x, position.y);
                state.cursor = Some(point);

                if state.board.is_drawing() {
                    // Leaving the paper ends the stroke.
                    let event = if state.layout.contains(point) {
                        PointerEvent::Move {
                            position: state.layout.to_board(point),
                        }
                    } else {
                        PointerEvent::Leave
                    };
                    let outcome = state.stroke_input.handle(&mut state.board, event);
                    finish_stroke(state, outcome);
                }
                state.window.request_redraw();
            }

            WindowEvent::CursorLeft { .. } => {
                state.cursor = None;
                let outcome = state.stroke_input.handle(&mut state.board, PointerEvent::Leave);
                finish_stroke(state, outcome);
                state.window.request_redraw();
            }

            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                let (Some(button), Some(point)) = (map_button(button), state.cursor) else {
                    return;
                };
                let position = state.layout.to_board(point);
                match button_state {
                    ElementState::Pressed => {
                        if egui_wants_pointer || !state.layout.contains(point) {
                            return;
                        }
                        state
                            .stroke_input
                            .handle(&mut state.board, PointerEvent::Down { position, button });
                    }
                    ElementState::Released => {
                        let outcome = state
                            .stroke_input
                            .handle(&mut state.board, PointerEvent::Up { position, button });
                        finish_stroke(state, outcome);
                    }
                }
                state.window.request_redraw();
            }

            WindowEvent::RedrawRequested => {
                pump_remote(state);
                #[cfg(not(target_arch = "wasm32"))]
                autosave_tick(state, false);

                // Run egui and apply any action
                sync_ui_state(state);
                let egui_input = state.egui_state.take_egui_input(&state.window);
                let mut action = None;
                let egui_output = state.egui_ctx.run(egui_input, |ctx| {
                    action = render_ui(ctx, &mut state.ui_state);
                });
                if let Some(action) = action {
                    apply_action(state, action);
                }

                state
                    .egui_state
                    .handle_platform_output(&state.window, egui_output.platform_output);
                let egui_primitives = state
                    .egui_ctx
                    .tessellate(egui_output.shapes, egui_output.pixels_per_point);

                // Build the board scene
                let width = state.surface.config.width;
                let height = state.surface.config.height;
                let over_ui = state.egui_ctx.is_pointer_over_area();
                let cursor = state
                    .cursor
                    .filter(|p| !over_ui && state.layout.contains(*p));
                let render_ctx = RenderContext::new(
                    &state.board,
                    state.layout,
                    Size::new(width as f64, height as f64),
                )
                .with_scale_factor(state.window.scale_factor())
                .with_background(state.config.background_color)
                .with_cursor(cursor);
                state.board_renderer.build_scene(&render_ctx);
                let base_color = state.board_renderer.background_color(&render_ctx);

                let Some(render_cx) = self.render_cx.as_ref() else {
                    return;
                };

                let device_handle = &render_cx.devices[state.surface.dev_id];
                let device = &device_handle.device;
                let queue = &device_handle.queue;

                let surface_texture = match state.surface.surface.get_current_texture() {
                    Ok(t) => t,
                    Err(e) => {
                        log::warn!("Failed to get surface texture: {:?}", e);
                        return;
                    }
                };

                let params = RenderParams {
                    base_color,
                    width,
                    height,
                    antialiasing_method: AaConfig::Area,
                };

                // Vello needs a storage texture, which WebGPU only offers as Rgba8Unorm.
                let render_texture = device.create_texture(&vello::wgpu::TextureDescriptor {
                    label: Some("vello render texture"),
                    size: vello::wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: vello::wgpu::TextureDimension::D2,
                    format: vello::wgpu::TextureFormat::Rgba8Unorm,
                    usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                        | vello::wgpu::TextureUsages::COPY_SRC
                        | vello::wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                });
                let render_texture_view =
                    render_texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

                if let Err(e) = state.vello_renderer.render_to_texture(
                    device,
                    queue,
                    state.board_renderer.scene(),
                    &render_texture_view,
                    &params,
                ) {
                    log::error!("Failed to render: {:?}", e);
                    return;
                }

                let surface_view = surface_texture
                    .texture
                    .create_view(&vello::wgpu::TextureViewDescriptor::default());

                {
                    let mut blit_encoder =
                        device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                            label: Some("blit encoder"),
                        });
                    state
                        .texture_blitter
                        .copy(device, &mut blit_encoder, &render_texture_view, &surface_view);
                    queue.submit(std::iter::once(blit_encoder.finish()));
                }

                for (id, image_delta) in &egui_output.textures_delta.set {
                    state.egui_renderer.update_texture(device, queue, *id, image_delta);
                }

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [width, height],
                    pixels_per_point: egui_output.pixels_per_point,
                };

                {
                    let mut egui_encoder =
                        device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
                            label: Some("egui encoder"),
                        });

                    state.egui_renderer.update_buffers(
                        device,
                        queue,
                        &mut egui_encoder,
                        &egui_primitives,
                        &screen_descriptor,
                    );

                    let render_pass = egui_encoder.begin_render_pass(&vello::wgpu::RenderPassDescriptor {
                        label: Some("egui render pass"),
                        color_attachments: &[Some(vello::wgpu::RenderPassColorAttachment {
                            view: &surface_view,
                            resolve_target: None,
                            ops: vello::wgpu::Operations {
                                load: vello::wgpu::LoadOp::Load,
                                store: vello::wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });

                    // egui-wgpu wants a 'static pass
                    let mut render_pass = render_pass.forget_lifetime();
                    state
                        .egui_renderer
                        .render(&mut render_pass, &egui_primitives, &screen_descriptor);
                    drop(render_pass);

                    queue.submit(std::iter::once(egui_encoder.finish()));
                }

                for id in &egui_output.textures_delta.free {
                    state.egui_renderer.free_texture(id);
                }
                surface_texture.present();

                // Keep polling the board store.
                state.window.request_redraw();
            }

            _ => {}
        }
    }
}
