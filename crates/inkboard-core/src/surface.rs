//! The whiteboard bitmap and its stroke rasterizer.

use crate::brush::{BrushSettings, LineCap};
use crate::color::Rgba;
use kurbo::Point;
use thiserror::Error;

/// Surface construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("Pixel buffer has {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// An RGBA8 bitmap with straight alpha, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Create a fully transparent surface. Zero dimensions are bumped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wrap an existing RGBA8 buffer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, SurfaceError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(SurfaceError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.pixels
    }

    /// Color at a pixel, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some(Rgba::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    /// True when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Make every pixel transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Overwrite every pixel with a color.
    pub fn fill(&mut self, color: Rgba) {
        let rgba = color.to_array();
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Rasterize one anti-aliased stroke segment.
    ///
    /// Returns true if any pixel was painted.
    pub fn stroke_segment(&mut self, from: Point, to: Point, brush: &BrushSettings) -> bool {
        if brush.color.a == 0 || !is_finite(from) || !is_finite(to) {
            return false;
        }

        let radius = brush.radius();
        let length = (to - from).hypot();
        if brush.cap == LineCap::Butt && length < f64::EPSILON {
            return false;
        }

        // Pixel bounds of the segment, padded by the radius plus the AA fringe.
        let pad = radius + 1.0;
        let x0 = (from.x.min(to.x) - pad).floor().max(0.0);
        let y0 = (from.y.min(to.y) - pad).floor().max(0.0);
        let x1 = (from.x.max(to.x) + pad).ceil().min(self.width as f64);
        let y1 = (from.y.max(to.y) + pad).ceil().min(self.height as f64);
        if x0 >= x1 || y0 >= y1 {
            return false;
        }

        let mut painted = false;
        for y in y0 as u32..y1 as u32 {
            for x in x0 as u32..x1 as u32 {
                let center = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let coverage = match brush.cap {
                    LineCap::Round => {
                        let d = distance_to_segment(center, from, to);
                        (radius + 0.5 - d).clamp(0.0, 1.0)
                    }
                    LineCap::Butt => butt_coverage(center, from, to, length, radius),
                };
                if coverage > 0.0 {
                    self.blend(x, y, brush.color, coverage);
                    painted = true;
                }
            }
        }
        painted
    }

    /// Composite another surface on top of this one with its top-left at `(x, y)`.
    pub fn draw_surface(&mut self, src: &Surface, x: i64, y: i64) {
        for sy in 0..src.height {
            let dy = y + sy as i64;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x + sx as i64;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                let i = src.index(sx, sy);
                let px = &src.pixels[i..i + 4];
                if px[3] == 0 {
                    continue;
                }
                let color = Rgba::new(px[0], px[1], px[2], px[3]);
                self.blend(dx as u32, dy as u32, color, 1.0);
            }
        }
    }

    /// A copy resized to `width` x `height`, content anchored at the top-left.
    pub fn resized(&self, width: u32, height: u32) -> Surface {
        let mut out = Surface::new(width, height);
        let copy_w = self.width.min(out.width) as usize * 4;
        for y in 0..self.height.min(out.height) {
            let src = self.index(0, y);
            let dst = out.index(0, y);
            out.pixels[dst..dst + copy_w].copy_from_slice(&self.pixels[src..src + copy_w]);
        }
        out
    }

    /// This bitmap composited over a solid background.
    pub fn flattened(&self, background: Rgba) -> Surface {
        let mut out = Surface::new(self.width, self.height);
        out.fill(background);
        out.draw_surface(self, 0, 0);
        out
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Source-over blend of `color` scaled by `coverage` into one pixel.
    fn blend(&mut self, x: u32, y: u32, color: Rgba, coverage: f64) {
        let i = self.index(x, y);
        let dst = &mut self.pixels[i..i + 4];

        let sa = color.a as f64 / 255.0 * coverage;
        let da = dst[3] as f64 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        if out_a <= 0.0 {
            dst.fill(0);
            return;
        }

        let src = [color.r, color.g, color.b];
        for c in 0..3 {
            let value = (src[c] as f64 * sa + dst[c] as f64 * da * (1.0 - sa)) / out_a;
            dst[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

/// Distance from `p` to the closed segment `a`-`b`.
fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq < f64::EPSILON {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}

/// Coverage of a pixel center by a flat-capped segment of half-width `radius`.
fn butt_coverage(p: Point, a: Point, b: Point, length: f64, radius: f64) -> f64 {
    let dir = (b - a) / length;
    let rel = p - a;
    let along = rel.dot(dir);
    let across = rel.cross(dir).abs();

    let side = (radius + 0.5 - across).clamp(0.0, 1.0);
    let start = (along + 0.5).clamp(0.0, 1.0);
    let end = (length - along + 0.5).clamp(0.0, 1.0);
    side.min(start).min(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brush(width: f64) -> BrushSettings {
        BrushSettings::new(Rgba::BLACK, width)
    }

    #[test]
    fn test_new_surface_is_blank() {
        let surface = Surface::new(10, 8);
        assert_eq!(surface.size(), (10, 8));
        assert_eq!(surface.as_rgba().len(), 10 * 8 * 4);
        assert!(surface.is_blank());
    }

    #[test]
    fn test_zero_size_is_bumped() {
        assert_eq!(Surface::new(0, 0).size(), (1, 1));
    }

    #[test]
    fn test_from_rgba_validates_length() {
        assert!(Surface::from_rgba(2, 2, vec![0; 16]).is_ok());
        let err = Surface::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, SurfaceError::BufferSize { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn test_horizontal_stroke_covers_center_line() {
        let mut surface = Surface::new(40, 20);
        let painted = surface.stroke_segment(Point::new(5.0, 10.0), Point::new(35.0, 10.0), &brush(4.0));
        assert!(painted);
        assert_eq!(surface.pixel(20, 9), Some(Rgba::BLACK));
        assert_eq!(surface.pixel(20, 10), Some(Rgba::BLACK));
        // Well outside the stroke width.
        assert_eq!(surface.pixel(20, 2).unwrap().a, 0);
        assert_eq!(surface.pixel(20, 17).unwrap().a, 0);
    }

    #[test]
    fn test_round_cap_extends_past_endpoints() {
        let mut surface = Surface::new(40, 20);
        surface.stroke_segment(Point::new(10.0, 10.0), Point::new(30.0, 10.0), &brush(8.0));
        // Round cap reaches ~4px beyond the end point.
        assert!(surface.pixel(32, 9).unwrap().a > 0);

        let mut butt = Surface::new(40, 20);
        butt.stroke_segment(
            Point::new(10.0, 10.0),
            Point::new(30.0, 10.0),
            &brush(8.0).with_cap(LineCap::Butt),
        );
        assert_eq!(butt.pixel(32, 9).unwrap().a, 0);
        assert!(butt.pixel(29, 9).unwrap().a > 0);
    }

    #[test]
    fn test_zero_length_round_segment_draws_dot() {
        let mut surface = Surface::new(20, 20);
        let p = Point::new(10.0, 10.0);
        assert!(surface.stroke_segment(p, p, &brush(6.0)));
        assert_eq!(surface.pixel(10, 10), Some(Rgba::BLACK));

        let mut butt = Surface::new(20, 20);
        assert!(!butt.stroke_segment(p, p, &brush(6.0).with_cap(LineCap::Butt)));
        assert!(butt.is_blank());
    }

    #[test]
    fn test_offscreen_segment_is_noop() {
        let mut surface = Surface::new(20, 20);
        let painted = surface.stroke_segment(Point::new(-50.0, -50.0), Point::new(-40.0, -45.0), &brush(2.0));
        assert!(!painted);
        assert!(surface.is_blank());
    }

    #[test]
    fn test_partially_offscreen_segment_is_clipped() {
        let mut surface = Surface::new(20, 20);
        assert!(surface.stroke_segment(Point::new(-10.0, 5.0), Point::new(30.0, 5.0), &brush(2.0)));
        assert_eq!(surface.pixel(0, 4).unwrap().a, 255);
        assert_eq!(surface.pixel(19, 4).unwrap().a, 255);
    }

    #[test]
    fn test_translucent_color_blends_over_existing() {
        let mut surface = Surface::new(10, 10);
        surface.fill(Rgba::WHITE);
        let half_red = BrushSettings::new(Rgba::new(255, 0, 0, 128), 6.0);
        surface.stroke_segment(Point::new(5.0, 5.0), Point::new(5.0, 5.0), &half_red);
        let px = surface.pixel(5, 5).unwrap();
        assert_eq!(px.a, 255);
        assert_eq!(px.r, 255);
        assert!(px.g > 120 && px.g < 135);
    }

    #[test]
    fn test_clear() {
        let mut surface = Surface::new(10, 10);
        surface.fill(Rgba::BLACK);
        assert!(!surface.is_blank());
        surface.clear();
        assert!(surface.is_blank());
    }

    #[test]
    fn test_resized_keeps_top_left() {
        let mut surface = Surface::new(4, 4);
        surface.fill(Rgba::BLACK);
        let bigger = surface.resized(6, 5);
        assert_eq!(bigger.size(), (6, 5));
        assert_eq!(bigger.pixel(3, 3), Some(Rgba::BLACK));
        assert_eq!(bigger.pixel(4, 0).unwrap().a, 0);
        assert_eq!(bigger.pixel(0, 4).unwrap().a, 0);

        let smaller = surface.resized(2, 2);
        assert_eq!(smaller.as_rgba().len(), 16);
        assert!(!smaller.is_blank());
    }

    #[test]
    fn test_draw_surface_with_offset() {
        let mut dst = Surface::new(6, 6);
        let mut src = Surface::new(2, 2);
        src.fill(Rgba::opaque(0, 0, 255));
        dst.draw_surface(&src, 4, 4);
        dst.draw_surface(&src, -1, -1);
        assert_eq!(dst.pixel(5, 5), Some(Rgba::opaque(0, 0, 255)));
        assert_eq!(dst.pixel(0, 0), Some(Rgba::opaque(0, 0, 255)));
        assert_eq!(dst.pixel(1, 1).unwrap().a, 0);
    }

    #[test]
    fn test_flattened_is_opaque() {
        let mut surface = Surface::new(3, 3);
        surface.stroke_segment(Point::new(1.5, 1.5), Point::new(1.5, 1.5), &brush(1.0));
        let flat = surface.flattened(Rgba::WHITE);
        assert!(flat.as_rgba().chunks_exact(4).all(|px| px[3] == 255));
        assert_eq!(flat.pixel(0, 0), Some(Rgba::WHITE));
        assert_eq!(flat.pixel(1, 1), Some(Rgba::BLACK));
    }
}
