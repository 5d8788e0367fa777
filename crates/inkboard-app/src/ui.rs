//! UI components using egui.

use egui::{Align2, Color32, Context, Pos2, Vec2};
use inkboard_core::brush::{DEFAULT_LINE_WIDTH, MAX_LINE_WIDTH, MIN_LINE_WIDTH};
use inkboard_core::color::Rgba;
use inkboard_core::input::KeyAction;
use inkboard_core::sync::ConnectionState;
use inkboard_widgets::{
    colors_match, panel_frame, section_label, status_dot, toolbar_frame, vertical_separator,
    ColorSwatch, StatusTone, TextButton, QUICK_COLORS,
};

use crate::shortcuts::ShortcutRegistry;

/// Height reserved at the top of the window for the toolbar, in points.
pub const TOOLBAR_HEIGHT: f32 = 60.0;

/// What the status indicator shows about the board store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// A server is configured.
    pub enabled: bool,
    pub state: ConnectionState,
    pub board: String,
    pub subscribed: bool,
    pub subscriber_count: usize,
    /// Local changes not yet acknowledged by the store.
    pub unsaved: bool,
}

impl ConnectionInfo {
    /// Working without a store.
    pub fn local(board: &str) -> Self {
        Self {
            enabled: false,
            state: ConnectionState::Disconnected,
            board: board.to_string(),
            subscribed: false,
            subscriber_count: 0,
            unsaved: false,
        }
    }

    pub fn tone(&self) -> StatusTone {
        if !self.enabled {
            return StatusTone::Offline;
        }
        match self.state {
            ConnectionState::Connected if self.subscribed => StatusTone::Online,
            ConnectionState::Connected | ConnectionState::Connecting => StatusTone::Connecting,
            ConnectionState::Disconnected => StatusTone::Offline,
            ConnectionState::Error => StatusTone::Error,
        }
    }

    pub fn label(&self) -> String {
        if !self.enabled {
            return "Local only".to_string();
        }
        match self.tone() {
            StatusTone::Online => {
                let noun = if self.subscriber_count == 1 {
                    "viewer"
                } else {
                    "viewers"
                };
                format!("{} · {} {}", self.board, self.subscriber_count, noun)
            }
            StatusTone::Connecting => "Connecting...".to_string(),
            StatusTone::Offline => "Disconnected".to_string(),
            StatusTone::Error => "Connection error".to_string(),
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match (self.enabled, self.unsaved) {
            (false, _) => "No board store configured",
            (true, true) => "Unsaved changes",
            (true, false) => "All changes saved",
        }
    }
}

/// UI state mirrored from the board each frame.
pub struct UiState {
    pub brush_color: Color32,
    pub line_width: f64,
    pub can_undo: bool,
    pub can_redo: bool,
    pub is_blank: bool,
    pub connection: ConnectionInfo,
    /// Whether the keyboard shortcuts modal is open.
    pub shortcuts_modal_open: bool,
    /// Message shown at the bottom of the window until dismissed.
    pub notice: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            brush_color: Color32::BLACK,
            line_width: DEFAULT_LINE_WIDTH,
            can_undo: false,
            can_redo: false,
            is_blank: true,
            connection: ConnectionInfo::local(inkboard_core::config::DEFAULT_BOARD),
            shortcuts_modal_open: false,
            notice: None,
        }
    }
}

/// Actions that can be triggered by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SetColor(Color32),
    SetLineWidth(f64),
    Clear,
    Undo,
    Redo,
    Export,
    ToggleShortcuts,
    DismissNotice,
}

impl From<KeyAction> for UiAction {
    fn from(action: KeyAction) -> Self {
        match action {
            KeyAction::Undo => UiAction::Undo,
            KeyAction::Redo => UiAction::Redo,
            KeyAction::Export => UiAction::Export,
            KeyAction::Clear => UiAction::Clear,
        }
    }
}

pub fn to_rgba(color: Color32) -> Rgba {
    Rgba::opaque(color.r(), color.g(), color.b())
}

pub fn to_color32(color: Rgba) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

/// Render the whole UI and return the first triggered action.
pub fn render_ui(ctx: &Context, ui_state: &mut UiState) -> Option<UiAction> {
    let toolbar_action = render_toolbar(ctx, ui_state);
    let notice_action = render_notice(ctx, ui_state);
    if ui_state.shortcuts_modal_open {
        render_shortcuts_modal(ctx, ui_state);
    }
    toolbar_action.or(notice_action)
}

fn render_toolbar(ctx: &Context, ui_state: &mut UiState) -> Option<UiAction> {
    let mut action = None;

    egui::Area::new(egui::Id::new("toolbar"))
        .anchor(Align2::CENTER_TOP, Vec2::new(0.0, 12.0))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            toolbar_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.spacing_mut().item_spacing = Vec2::new(6.0, 0.0);

                    // Colors
                    section_label(ui, "Color");
                    for (color, name) in QUICK_COLORS {
                        let selected = colors_match(ui_state.brush_color, *color);
                        let (clicked, _) = ColorSwatch::new(*color, name).selected(selected).show(ui);
                        if clicked {
                            action = Some(UiAction::SetColor(*color));
                        }
                    }
                    let mut picked = ui_state.brush_color;
                    let picker = egui::color_picker::color_edit_button_srgba(
                        ui,
                        &mut picked,
                        egui::color_picker::Alpha::Opaque,
                    );
                    if picker.on_hover_text("Custom color").changed() {
                        action = Some(UiAction::SetColor(picked));
                    }

                    ui.add_space(4.0);
                    vertical_separator(ui);
                    ui.add_space(4.0);

                    // Width
                    section_label(ui, "Width");
                    let mut width = ui_state.line_width;
                    let slider = egui::Slider::new(&mut width, MIN_LINE_WIDTH..=MAX_LINE_WIDTH)
                        .step_by(1.0)
                        .integer();
                    if ui.add(slider).changed() {
                        action = Some(UiAction::SetLineWidth(width));
                    }

                    ui.add_space(4.0);
                    vertical_separator(ui);
                    ui.add_space(4.0);

                    // Board commands
                    let undo_hint = ShortcutRegistry::hint(KeyAction::Undo);
                    if TextButton::new("Undo")
                        .shortcut(undo_hint.as_deref())
                        .enabled(ui_state.can_undo)
                        .show(ui)
                    {
                        action = Some(UiAction::Undo);
                    }
                    let redo_hint = ShortcutRegistry::hint(KeyAction::Redo);
                    if TextButton::new("Redo")
                        .shortcut(redo_hint.as_deref())
                        .enabled(ui_state.can_redo)
                        .show(ui)
                    {
                        action = Some(UiAction::Redo);
                    }
                    let clear_hint = ShortcutRegistry::hint(KeyAction::Clear);
                    if TextButton::new("Clear")
                        .tooltip("Clear board")
                        .shortcut(clear_hint.as_deref())
                        .enabled(!ui_state.is_blank)
                        .show(ui)
                    {
                        action = Some(UiAction::Clear);
                    }
                    let export_hint = ShortcutRegistry::hint(KeyAction::Export);
                    if TextButton::new("Export")
                        .tooltip("Export PNG")
                        .shortcut(export_hint.as_deref())
                        .emphasized(true)
                        .show(ui)
                    {
                        action = Some(UiAction::Export);
                    }
                    if TextButton::new("?").tooltip("Keyboard shortcuts").show(ui) {
                        action = Some(UiAction::ToggleShortcuts);
                    }

                    ui.add_space(4.0);
                    vertical_separator(ui);
                    ui.add_space(4.0);

                    // Connection
                    let connection = &ui_state.connection;
                    status_dot(ui, connection.tone(), connection.tooltip());
                    ui.label(
                        egui::RichText::new(connection.label())
                            .size(11.0)
                            .color(Color32::from_gray(100)),
                    );
                });
            });
        });

    action
}

fn render_notice(ctx: &Context, ui_state: &UiState) -> Option<UiAction> {
    let notice = ui_state.notice.as_ref()?;
    let mut action = None;

    egui::Area::new(egui::Id::new("notice"))
        .anchor(Align2::CENTER_BOTTOM, Vec2::new(0.0, -16.0))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            panel_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(notice).size(12.0));
                    if TextButton::new("Dismiss").show(ui) {
                        action = Some(UiAction::DismissNotice);
                    }
                });
            });
        });

    action
}

/// Render the keyboard shortcuts modal.
fn render_shortcuts_modal(ctx: &Context, ui_state: &mut UiState) {
    // Backdrop
    egui::Area::new(egui::Id::new("shortcuts_backdrop"))
        .fixed_pos(Pos2::ZERO)
        .order(egui::Order::Background)
        .show(ctx, |ui| {
            let screen_rect = ctx.input(|i| i.content_rect());
            let response = ui.allocate_rect(screen_rect, egui::Sense::click());
            ui.painter()
                .rect_filled(screen_rect, 0.0, Color32::from_black_alpha(80));
            if response.clicked() {
                ui_state.shortcuts_modal_open = false;
            }
        });

    egui::Area::new(egui::Id::new("shortcuts_modal"))
        .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            panel_frame().show(ui, |ui| {
                ui.set_width(320.0);
                ui.vertical(|ui| {
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new("Keyboard Shortcuts").size(16.0).strong());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if TextButton::new("Close").show(ui) {
                                ui_state.shortcuts_modal_open = false;
                            }
                        });
                    });

                    ui.add_space(12.0);

                    for shortcut in ShortcutRegistry::all() {
                        ui.horizontal(|ui| {
                            ui.label(
                                egui::RichText::new(shortcut.format())
                                    .size(12.0)
                                    .family(egui::FontFamily::Monospace)
                                    .color(Color32::from_rgb(100, 116, 139)),
                            );
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                ui.label(
                                    egui::RichText::new(shortcut.description())
                                        .size(12.0)
                                        .color(Color32::from_gray(90)),
                                );
                            });
                        });
                        ui.add_space(4.0);
                    }
                });
            });
        });
}
