//! Color swatches for the brush palette.

use egui::{vec2, Color32, CursorIcon, Rect, Sense, Stroke, Ui};

use crate::{sizing, theme};

/// Colors offered as one-click swatches, with their tooltips.
pub const QUICK_COLORS: &[(Color32, &str)] = &[
    (Color32::from_rgb(0, 0, 0), "Black"),
    (Color32::from_rgb(239, 68, 68), "Red"),
    (Color32::from_rgb(249, 115, 22), "Orange"),
    (Color32::from_rgb(234, 179, 8), "Yellow"),
    (Color32::from_rgb(34, 197, 94), "Green"),
    (Color32::from_rgb(59, 130, 246), "Blue"),
    (Color32::from_rgb(168, 85, 247), "Purple"),
    (Color32::from_rgb(255, 255, 255), "White"),
];

/// A clickable circular color swatch.
pub struct ColorSwatch<'a> {
    color: Color32,
    tooltip: &'a str,
    selected: bool,
}

impl<'a> ColorSwatch<'a> {
    pub fn new(color: Color32, tooltip: &'a str) -> Self {
        Self {
            color,
            tooltip,
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Show the swatch and return (clicked, rect).
    pub fn show(self, ui: &mut Ui) -> (bool, Rect) {
        let (rect, response) = ui.allocate_exact_size(vec2(sizing::SMALL, sizing::SMALL), Sense::click());

        if ui.is_rect_visible(rect) {
            let center = rect.center();
            let radius = rect.width().min(rect.height()) / 2.0;

            ui.painter().circle_filled(center, radius, self.color);
            // Light swatches need an outline against the panel.
            if is_light(self.color) {
                ui.painter()
                    .circle_stroke(center, radius - 0.5, Stroke::new(1.0, theme::BORDER));
            }

            if self.selected {
                // Inner offset ring
                let ring = if is_light(self.color) {
                    Color32::from_gray(30)
                } else {
                    Color32::WHITE
                };
                ui.painter()
                    .circle_stroke(center, radius - 3.0, Stroke::new(2.0, ring));
            } else if response.hovered() {
                ui.painter()
                    .circle_stroke(center, radius + 1.0, Stroke::new(1.0, theme::ACCENT));
            }
        }

        let clicked = response.clicked();
        response
            .on_hover_text(self.tooltip)
            .on_hover_cursor(CursorIcon::PointingHand);
        (clicked, rect)
    }
}

/// Check if two colors match, ignoring alpha.
pub fn colors_match(a: Color32, b: Color32) -> bool {
    a.r() == b.r() && a.g() == b.g() && a.b() == b.b()
}

fn is_light(color: Color32) -> bool {
    let luma = 0.299 * color.r() as f32 + 0.587 * color.g() as f32 + 0.114 * color.b() as f32;
    luma > 200.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_match_ignores_alpha() {
        let a = Color32::from_rgba_unmultiplied(10, 20, 30, 255);
        let b = Color32::from_rgba_unmultiplied(10, 20, 30, 255);
        assert!(colors_match(a, b));
        assert!(!colors_match(a, Color32::from_rgb(10, 20, 31)));
    }

    #[test]
    fn test_quick_colors_start_with_black() {
        assert_eq!(QUICK_COLORS[0].0, Color32::BLACK);
        assert!(QUICK_COLORS.iter().any(|(c, _)| *c == Color32::WHITE));
    }

    #[test]
    fn test_is_light() {
        assert!(is_light(Color32::WHITE));
        assert!(!is_light(Color32::BLACK));
        assert!(!is_light(Color32::from_rgb(59, 130, 246)));
    }
}
