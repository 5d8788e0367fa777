//! Placement of the board bitmap inside the window.

use kurbo::{Affine, Point, Rect, Size, Vec2};

/// Share of the window width a fresh board takes.
pub const BOARD_WIDTH_FRACTION: f64 = 0.9;
/// Share of the window height a fresh board takes.
pub const BOARD_HEIGHT_FRACTION: f64 = 0.7;

/// Space kept around the paper, in physical pixels.
const BOARD_MARGIN: f64 = 16.0;

/// Board size for a window of the given size.
pub fn default_board_size(viewport: Size) -> (u32, u32) {
    let width = (viewport.width * BOARD_WIDTH_FRACTION).round().max(1.0);
    let height = (viewport.height * BOARD_HEIGHT_FRACTION).round().max(1.0);
    (width as u32, height as u32)
}

/// Where the board sits on screen. Boards larger than the free area are scaled down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    /// Screen position of the board's top-left corner.
    pub origin: Point,
    /// Screen pixels per board pixel, at most 1.
    pub scale: f64,
    /// Board size in board pixels.
    pub board_size: Size,
}

impl BoardLayout {
    /// Center the board in the area below the toolbar.
    pub fn fit(viewport: Size, board_size: (u32, u32), toolbar_height: f64) -> Self {
        let board = Size::new(board_size.0.max(1) as f64, board_size.1.max(1) as f64);
        let area = Rect::new(
            BOARD_MARGIN,
            toolbar_height + BOARD_MARGIN,
            viewport.width - BOARD_MARGIN,
            viewport.height - BOARD_MARGIN,
        );

        let scale = if area.width() <= 0.0 || area.height() <= 0.0 {
            1.0
        } else {
            (area.width() / board.width)
                .min(area.height() / board.height)
                .min(1.0)
        };

        let shown = board * scale;
        let origin = Point::new(
            (area.x0 + (area.width() - shown.width) / 2.0).max(0.0).round(),
            (area.y0 + (area.height() - shown.height) / 2.0).max(0.0).round(),
        );

        Self {
            origin,
            scale,
            board_size: board,
        }
    }

    /// The paper in screen coordinates.
    pub fn board_rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.board_size * self.scale)
    }

    /// Board-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.origin.to_vec2()) * Affine::scale(self.scale)
    }

    pub fn to_board(&self, screen: Point) -> Point {
        ((screen - self.origin) / self.scale).to_point()
    }

    pub fn to_screen(&self, board: Point) -> Point {
        self.origin + Vec2::new(board.x, board.y) * self.scale
    }

    /// Whether a screen point falls on the paper.
    pub fn contains(&self, screen: Point) -> bool {
        let rect = self.board_rect();
        screen.x >= rect.x0 && screen.x < rect.x1 && screen.y >= rect.y0 && screen.y < rect.y1
    }
}
