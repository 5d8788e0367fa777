//! Renderer trait abstraction.

use crate::layout::BoardLayout;
use inkboard_core::whiteboard::Whiteboard;
use kurbo::{Point, Size};
use peniko::Color;

/// Everything needed to draw one frame.
pub struct RenderContext<'a> {
    pub board: &'a Whiteboard,
    pub layout: BoardLayout,
    /// Viewport size in physical pixels.
    pub viewport_size: Size,
    /// Device pixel ratio (for HiDPI).
    pub scale_factor: f64,
    /// Window color around the paper.
    pub background_color: Color,
    /// Color under transparent board pixels.
    pub paper_color: Color,
    /// Pointer position in screen pixels, when over the paper.
    pub cursor: Option<Point>,
}

impl<'a> RenderContext<'a> {
    pub fn new(board: &'a Whiteboard, layout: BoardLayout, viewport_size: Size) -> Self {
        Self {
            board,
            layout,
            viewport_size,
            scale_factor: 1.0,
            background_color: Color::from_rgba8(243, 244, 246, 255),
            paper_color: Color::WHITE,
            cursor: None,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_cursor(mut self, cursor: Option<Point>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Build the drawing commands for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Color the target is cleared to.
    fn background_color(&self, ctx: &RenderContext) -> Color {
        ctx.background_color
    }
}
