//! Inkboard Render Library
//!
//! Maps the board onto the window and builds the frame's vector scene.
//! The default implementation uses Vello for GPU-accelerated rendering.

mod layout;
mod renderer;

#[cfg(feature = "vello-renderer")]
mod vello_impl;

pub use layout::{default_board_size, BoardLayout, BOARD_HEIGHT_FRACTION, BOARD_WIDTH_FRACTION};
pub use renderer::{RenderContext, Renderer};

#[cfg(feature = "vello-renderer")]
pub use vello_impl::BoardRenderer;
