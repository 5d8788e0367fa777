//! Small egui widget kit for the whiteboard toolbar.
//!
//! - **Buttons**: text buttons with hover and disabled states
//! - **Colors**: quick palette swatches and the custom color swatch
//! - **Frames**: floating toolbar and panel frames
//! - **Layout**: separators, section labels and the connection dot

pub mod buttons;
pub mod colors;
pub mod layout;
pub mod menu;

pub use buttons::TextButton;
pub use colors::{colors_match, ColorSwatch, QUICK_COLORS};
pub use layout::{section_label, status_dot, vertical_separator, StatusTone};
pub use menu::{panel_frame, toolbar_frame};

/// Standard sizing constants used across widgets.
pub mod sizing {
    /// Color swatches
    pub const SMALL: f32 = 20.0;
    /// Toolbar buttons
    pub const MEDIUM: f32 = 28.0;
    pub const CORNER_RADIUS: u8 = 4;
    pub const PANEL_RADIUS: u8 = 8;
}

/// Standard colors used across widgets.
pub mod theme {
    use egui::Color32;

    pub const TEXT: Color32 = Color32::from_rgb(60, 60, 60);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(120, 120, 120);
    pub const TEXT_DISABLED: Color32 = Color32::from_rgb(180, 180, 180);
    pub const BORDER: Color32 = Color32::from_rgb(220, 220, 220);
    /// Selection/active color (blue)
    pub const ACCENT: Color32 = Color32::from_rgb(59, 130, 246);
    pub const HOVER_BG: Color32 = Color32::from_rgb(245, 245, 245);
    pub const PANEL_BG: Color32 = Color32::from_rgba_premultiplied(250, 250, 252, 250);
    pub const ONLINE: Color32 = Color32::from_rgb(34, 197, 94);
    pub const CONNECTING: Color32 = Color32::from_rgb(234, 179, 8);
    pub const OFFLINE: Color32 = Color32::from_rgb(156, 163, 175);
    pub const ERROR: Color32 = Color32::from_rgb(239, 68, 68);
}
