//! Layout helpers: separators, section labels, status dot.

use egui::{vec2, Color32, Sense, Stroke, Ui};

use crate::theme;

/// Draw a vertical separator line (small height).
pub fn vertical_separator(ui: &mut Ui) {
    let rect = ui.available_rect_before_wrap();
    let height = 14.0;
    let x = rect.left() + 1.0;
    let top = rect.center().y - height / 2.0;
    ui.painter().line_segment(
        [egui::Pos2::new(x, top), egui::Pos2::new(x, top + height)],
        Stroke::new(1.0, Color32::from_gray(210)),
    );
    ui.add_space(3.0);
}

/// Draw a section label (small, muted text).
pub fn section_label(ui: &mut Ui, text: &str) {
    ui.label(egui::RichText::new(text).size(10.0).color(theme::TEXT_MUTED));
}

/// Color of the connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Online,
    Connecting,
    Offline,
    Error,
}

impl StatusTone {
    pub fn color(self) -> Color32 {
        match self {
            StatusTone::Online => theme::ONLINE,
            StatusTone::Connecting => theme::CONNECTING,
            StatusTone::Offline => theme::OFFLINE,
            StatusTone::Error => theme::ERROR,
        }
    }
}

/// A small colored dot with a tooltip.
pub fn status_dot(ui: &mut Ui, tone: StatusTone, tooltip: &str) {
    let (rect, response) = ui.allocate_exact_size(vec2(10.0, 10.0), Sense::hover());
    if ui.is_rect_visible(rect) {
        ui.painter().circle_filled(rect.center(), 4.0, tone.color());
    }
    response.on_hover_text(tooltip);
}
