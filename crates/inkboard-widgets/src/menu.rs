//! Floating frames.

use egui::{epaint, Color32, CornerRadius, Frame, Margin, Stroke};

use crate::{sizing, theme};

/// Frame for the floating toolbar along the top of the window.
pub fn toolbar_frame() -> Frame {
    Frame::new()
        .fill(theme::PANEL_BG)
        .corner_radius(CornerRadius::same(sizing::PANEL_RADIUS))
        .stroke(Stroke::new(1.0, theme::BORDER))
        .shadow(epaint::Shadow {
            spread: 0,
            blur: 8,
            offset: [0, 2],
            color: Color32::from_black_alpha(20),
        })
        .inner_margin(Margin::symmetric(12, 6))
}

/// Frame for popups and notices.
pub fn panel_frame() -> Frame {
    Frame::new()
        .fill(theme::PANEL_BG)
        .corner_radius(CornerRadius::same(sizing::PANEL_RADIUS))
        .stroke(Stroke::new(1.0, theme::BORDER))
        .shadow(epaint::Shadow {
            spread: 0,
            blur: 12,
            offset: [0, 4],
            color: Color32::from_black_alpha(25),
        })
        .inner_margin(Margin::same(10))
}
