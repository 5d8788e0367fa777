//! Brush settings used for freehand strokes.

use crate::color::Rgba;
use serde::{Deserialize, Serialize};

/// Thinnest stroke the width control allows.
pub const MIN_LINE_WIDTH: f64 = 1.0;
/// Thickest stroke the width control allows.
pub const MAX_LINE_WIDTH: f64 = 20.0;
/// Width used for a fresh board.
pub const DEFAULT_LINE_WIDTH: f64 = 5.0;

/// How the ends of a stroke segment are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    /// Half-disc caps, so consecutive segments join smoothly.
    #[default]
    Round,
    /// Flat caps flush with the segment ends.
    Butt,
}

/// Color, width and cap of the pen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBrush")]
pub struct BrushSettings {
    pub color: Rgba,
    width: f64,
    pub cap: LineCap,
}

/// Brush as stored, before the width is clamped.
#[derive(Deserialize)]
struct RawBrush {
    color: Rgba,
    width: f64,
    #[serde(default)]
    cap: LineCap,
}

impl From<RawBrush> for BrushSettings {
    fn from(raw: RawBrush) -> Self {
        Self::new(raw.color, raw.width).with_cap(raw.cap)
    }
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            width: DEFAULT_LINE_WIDTH,
            cap: LineCap::Round,
        }
    }
}

impl BrushSettings {
    pub fn new(color: Rgba, width: f64) -> Self {
        let mut brush = Self {
            color,
            ..Self::default()
        };
        brush.set_width(width);
        brush
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Set the stroke width, clamped to the allowed range. Non-finite values are ignored.
    pub fn set_width(&mut self, width: f64) {
        if width.is_finite() {
            self.width = width.clamp(MIN_LINE_WIDTH, MAX_LINE_WIDTH);
        }
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    /// Half the stroke width.
    pub fn radius(&self) -> f64 {
        self.width / 2.0
    }
}
