//! Toolbar buttons.

use egui::{vec2, Color32, CornerRadius, CursorIcon, FontId, Sense, Stroke, StrokeKind, Ui};

use crate::{sizing, theme};

/// A compact text button with an optional shortcut hint in its tooltip.
pub struct TextButton<'a> {
    label: &'a str,
    shortcut: Option<&'a str>,
    tooltip: Option<&'a str>,
    enabled: bool,
    emphasized: bool,
}

impl<'a> TextButton<'a> {
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            shortcut: None,
            tooltip: None,
            enabled: true,
            emphasized: false,
        }
    }

    /// Add a shortcut hint, if the action has one.
    pub fn shortcut(mut self, shortcut: Option<&'a str>) -> Self {
        self.shortcut = shortcut;
        self
    }

    pub fn tooltip(mut self, tooltip: &'a str) -> Self {
        self.tooltip = Some(tooltip);
        self
    }

    /// Disabled buttons are drawn muted and never report clicks.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Draw with the accent outline.
    pub fn emphasized(mut self, emphasized: bool) -> Self {
        self.emphasized = emphasized;
        self
    }

    /// Hover text: the tooltip (or label) followed by the shortcut.
    fn hover_text(&self) -> String {
        let base = self.tooltip.unwrap_or(self.label);
        match self.shortcut {
            Some(shortcut) => format!("{} ({})", base, shortcut),
            None => base.to_string(),
        }
    }

    /// Show the button and return true if clicked.
    pub fn show(self, ui: &mut Ui) -> bool {
        let font = FontId::proportional(12.0);
        let text_width = ui
            .painter()
            .layout_no_wrap(self.label.to_string(), font.clone(), theme::TEXT)
            .size()
            .x;
        let size = vec2(text_width + 16.0, sizing::MEDIUM);
        let sense = if self.enabled {
            Sense::click()
        } else {
            Sense::hover()
        };
        let (rect, response) = ui.allocate_exact_size(size, sense);

        if ui.is_rect_visible(rect) {
            let radius = CornerRadius::same(sizing::CORNER_RADIUS);
            let bg_color = if self.enabled && response.hovered() {
                theme::HOVER_BG
            } else {
                Color32::TRANSPARENT
            };
            ui.painter().rect_filled(rect, radius, bg_color);

            if self.emphasized && self.enabled {
                ui.painter().rect_stroke(
                    rect,
                    radius,
                    Stroke::new(1.0, theme::ACCENT),
                    StrokeKind::Inside,
                );
            }

            let text_color = if self.enabled {
                theme::TEXT
            } else {
                theme::TEXT_DISABLED
            };
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                self.label,
                font,
                text_color,
            );
        }

        let hover_text = self.hover_text();
        let clicked = self.enabled && response.clicked();
        let response = response.on_hover_text(hover_text);
        if self.enabled {
            response.on_hover_cursor(CursorIcon::PointingHand);
        }
        clicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hover_text_with_shortcut() {
        let button = TextButton::new("Undo").shortcut(Some("Ctrl+Z"));
        assert_eq!(button.hover_text(), "Undo (Ctrl+Z)");

        let button = TextButton::new("Clear").tooltip("Clear board").shortcut(Some("Ctrl+Delete"));
        assert_eq!(button.hover_text(), "Clear board (Ctrl+Delete)");
    }

    #[test]
    fn test_hover_text_without_shortcut() {
        let button = TextButton::new("Undo").shortcut(None);
        assert_eq!(button.hover_text(), "Undo");
    }

    #[test]
    fn test_hover_text_prefers_tooltip() {
        let button = TextButton::new("PNG").tooltip("Export as PNG");
        assert_eq!(button.hover_text(), "Export as PNG");
    }
}
