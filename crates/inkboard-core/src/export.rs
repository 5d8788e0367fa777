//! PNG export of the board image.

use crate::color::Rgba;
use crate::snapshot::encode_png;
use crate::whiteboard::Whiteboard;
use thiserror::Error;

/// File name offered when exporting.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "whiteboard.png";

/// Export errors.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How the board is turned into an image file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Flatten onto this color. `None` keeps transparency.
    pub background: Option<Rgba>,
}

impl ExportOptions {
    pub fn with_background(background: Rgba) -> Self {
        Self {
            background: Some(background),
        }
    }
}

/// Encode the board as PNG bytes.
pub fn export_png(board: &Whiteboard, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let surface = board.surface();
    let (width, height) = surface.size();
    let png = match options.background {
        Some(background) => encode_png(surface.flattened(background).as_rgba(), width, height)?,
        None => encode_png(surface.as_rgba(), width, height)?,
    };
    log::debug!("Exported {}x{} PNG ({} bytes)", width, height, png.len());
    Ok(png)
}

/// Encode the board and write it to `path`.
#[cfg(not(target_arch = "wasm32"))]
pub fn export_png_to_path(
    board: &Whiteboard,
    options: &ExportOptions,
    path: &std::path::Path,
) -> Result<(), ExportError> {
    let png = export_png(board, options)?;
    std::fs::write(path, png)?;
    log::info!("Exported PNG to: {:?}", path);
    Ok(())
}
