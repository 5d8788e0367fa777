//! PNG snapshots of the board bitmap.
//!
//! A [`Snapshot`] is the unit of both undo history and remote persistence.
//! On the wire it travels as a `data:image/png;base64,...` URL.

use crate::surface::Surface;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Prefix of every snapshot data URL.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Snapshot encoding/decoding errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),
    #[error("PNG decoding failed: {0}")]
    Decode(#[from] png::DecodingError),
    #[error("Not a PNG data URL")]
    InvalidDataUrl,
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported PNG layout: {0}")]
    Unsupported(String),
}

/// A PNG-encoded copy of the board at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl Snapshot {
    /// Encode a surface as RGBA8 PNG.
    pub fn capture(surface: &Surface) -> Result<Self, SnapshotError> {
        let (width, height) = surface.size();
        let png = encode_png(surface.as_rgba(), width, height)?;
        Ok(Self { png, width, height })
    }

    /// Wrap PNG bytes, validating the header.
    pub fn from_png(png: Vec<u8>) -> Result<Self, SnapshotError> {
        let decoder = png::Decoder::new(png.as_slice());
        let reader = decoder.read_info()?;
        let (width, height) = (reader.info().width, reader.info().height);
        Ok(Self { png, width, height })
    }

    /// Parse a `data:image/png;base64,` URL.
    pub fn from_data_url(url: &str) -> Result<Self, SnapshotError> {
        let payload = url
            .trim()
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or(SnapshotError::InvalidDataUrl)?;
        let bytes = STANDARD.decode(payload)?;
        Self::from_png(bytes)
    }

    pub fn to_data_url(&self) -> String {
        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + self.png.len().div_ceil(3) * 4);
        url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&self.png, &mut url);
        url
    }

    /// Decode back into an RGBA surface.
    pub fn decode(&self) -> Result<Surface, SnapshotError> {
        let mut decoder = png::Decoder::new(self.png.as_slice());
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            other => return Err(SnapshotError::Unsupported(format!("{:?}", other))),
        };

        Surface::from_rgba(info.width, info.height, rgba)
            .map_err(|e| SnapshotError::Unsupported(e.to_string()))
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn into_png_bytes(self) -> Vec<u8> {
        self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Encode RGBA pixel data to PNG bytes.
pub fn encode_png(rgba_data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, png::EncodingError> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba_data)?;
        writer.finish()?;
    }
    Ok(png_data)
}
