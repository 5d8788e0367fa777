//! Vello-based renderer implementation.

use crate::renderer::{RenderContext, Renderer};
use inkboard_core::whiteboard::Whiteboard;
use kurbo::{Affine, Circle, Point, Rect, Stroke};
use peniko::{Blob, Color, Fill, ImageAlphaType, ImageBrush, ImageData, ImageFormat};
use std::sync::Arc;
use vello::Scene;

/// Board bitmap uploaded as a peniko image, valid for one revision.
struct CachedImage {
    revision: u64,
    size: (u32, u32),
    image: ImageData,
}

/// Vello renderer for the board: backdrop, paper, bitmap and brush cursor.
pub struct BoardRenderer {
    scene: Scene,
    cached: Option<CachedImage>,
}

impl Default for BoardRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardRenderer {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            cached: None,
        }
    }

    /// The scene built by the last [`Renderer::build_scene`] call.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Drop the cached bitmap so the next frame re-uploads it.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Peniko image of the board, rebuilt only when its revision changed.
    fn board_image(&mut self, board: &Whiteboard) -> ImageData {
        let revision = board.revision();
        let size = board.size();
        if let Some(cached) = &self.cached {
            if cached.revision == revision && cached.size == size {
                return cached.image.clone();
            }
        }

        let image = ImageData {
            data: Blob::new(Arc::new(board.surface().as_rgba().to_vec())),
            format: ImageFormat::Rgba8,
            width: size.0,
            height: size.1,
            alpha_type: ImageAlphaType::Alpha,
        };
        self.cached = Some(CachedImage {
            revision,
            size,
            image: image.clone(),
        });
        image
    }

    fn render_paper(&mut self, rect: Rect, paper: Color, scale_factor: f64) {
        // Soft drop shadow under the paper.
        self.scene.draw_blurred_rounded_rect(
            Affine::translate((0.0, 4.0 * scale_factor)),
            rect,
            Color::from_rgba8(0, 0, 0, 40),
            2.0 * scale_factor,
            10.0 * scale_factor,
        );
        self.scene.fill(Fill::NonZero, Affine::IDENTITY, paper, None, &rect);
    }

    fn render_border(&mut self, rect: Rect, scale_factor: f64) {
        self.scene.stroke(
            &Stroke::new(scale_factor),
            Affine::IDENTITY,
            Color::from_rgba8(209, 213, 219, 255),
            None,
            &rect,
        );
    }

    /// Ring the size of the pen at the pointer.
    fn render_cursor(&mut self, position: Point, radius: f64, color: Color, scale_factor: f64) {
        let circle = Circle::new(position, radius.max(1.0));
        self.scene.stroke(
            &Stroke::new(2.5 * scale_factor),
            Affine::IDENTITY,
            Color::from_rgba8(255, 255, 255, 200),
            None,
            &circle,
        );
        self.scene.stroke(
            &Stroke::new(scale_factor),
            Affine::IDENTITY,
            color.with_alpha(0.9),
            None,
            &circle,
        );
    }
}

impl Renderer for BoardRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        self.scene.reset();

        let viewport = Rect::new(0.0, 0.0, ctx.viewport_size.width, ctx.viewport_size.height);
        self.scene
            .fill(Fill::NonZero, Affine::IDENTITY, ctx.background_color, None, &viewport);

        let paper = ctx.layout.board_rect();
        self.render_paper(paper, ctx.paper_color, ctx.scale_factor);

        let image = self.board_image(ctx.board);
        self.scene.draw_image(&ImageBrush::from(image), ctx.layout.transform());

        self.render_border(paper, ctx.scale_factor);

        if let Some(cursor) = ctx.cursor.filter(|p| ctx.layout.contains(*p)) {
            let brush = ctx.board.brush();
            let radius = brush.radius() * ctx.layout.scale;
            self.render_cursor(cursor, radius, brush.color.into(), ctx.scale_factor);
        }
    }
}
