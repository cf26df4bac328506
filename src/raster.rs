// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Software RGBA8 raster backend.
//!
//! Integer-only arithmetic, so the same operations give the same bytes on any
//! architecture. Pixels are straight alpha; a pixel with alpha 0 is always
//! stored as `[0, 0, 0, 0]`, which keeps `duplicate` byte-exact.
//!
//! # Serialized layout
//! ```text
//! [magic: u32 LE][width: u32 LE][height: u32 LE][RGBA8 pixels, row-major]
//! ```

use core::any::Any;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::RasterError;
use crate::proxy::{CanvasProxy, CanvasProxyFactory};
use crate::types::geometry::{Color, Position, Size};

const MAGIC: u32 = 0x4C53_4145; // "EASL"
const HEADER_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    size: Size,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![0u8; size.area() * 4],
        }
    }

    /// Parses `serialize_to_bytes` output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Bitmap, RasterError> {
        let mut reader = bytes;
        let header_err = |e: std::io::Error| RasterError::InvalidImage(e.to_string());

        let magic = reader.read_u32::<LittleEndian>().map_err(header_err)?;
        if magic != MAGIC {
            return Err(RasterError::InvalidImage(format!("bad magic {magic:#010x}")));
        }
        let width = reader.read_u32::<LittleEndian>().map_err(header_err)?;
        let height = reader.read_u32::<LittleEndian>().map_err(header_err)?;
        let size = Size::new(width, height);

        let mut pixels = Vec::with_capacity(reader.len());
        reader.read_to_end(&mut pixels).map_err(header_err)?;
        if pixels.len() != size.area() * 4 {
            return Err(RasterError::InvalidImage(format!(
                "expected {} pixel bytes, found {}",
                size.area() * 4,
                pixels.len()
            )));
        }
        for p in pixels.chunks_exact_mut(4) {
            if p[3] == 0 {
                p.fill(0);
            }
        }

        Ok(Bitmap { size, pixels })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = self.index(x, y);
        let p = &self.pixels[i..i + 4];
        Some(Color::rgba(p[0], p[1], p[2], p[3]))
    }

    /// Number of pixels with non-zero alpha.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] != 0).count()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.width as usize + x as usize) * 4
    }

    /// Pixels covered by a round-capped polyline of `width`.
    fn coverage(&self, positions: &[Position], width: u32) -> Result<Vec<usize>, RasterError> {
        let first = positions.first().ok_or(RasterError::EmptyStroke)?;
        let radius = i64::from(width.max(1) / 2);

        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (i64::from(first.x), i64::from(first.y), i64::from(first.x), i64::from(first.y));
        for p in positions {
            min_x = min_x.min(i64::from(p.x));
            min_y = min_y.min(i64::from(p.y));
            max_x = max_x.max(i64::from(p.x));
            max_y = max_y.max(i64::from(p.y));
        }

        // Clip the bounding box to the surface.
        let left = (min_x - radius).max(0);
        let top = (min_y - radius).max(0);
        let right = (max_x + radius).min(i64::from(self.size.width) - 1);
        let bottom = (max_y + radius).min(i64::from(self.size.height) - 1);
        if left > right || top > bottom {
            return Ok(Vec::new());
        }

        let box_w = (right - left + 1) as usize;
        let box_h = (bottom - top + 1) as usize;
        let mut mask = vec![false; box_w * box_h];

        // Offsets are clamped to the clipped box; cost is bounded by the surface.
        let mut stamp = |cx: i64, cy: i64| {
            for dy in (-radius).max(top - cy)..=radius.min(bottom - cy) {
                for dx in (-radius).max(left - cx)..=radius.min(right - cx) {
                    if dx * dx + dy * dy > radius * radius {
                        continue;
                    }
                    let (x, y) = (cx + dx, cy + dy);
                    mask[(y - top) as usize * box_w + (x - left) as usize] = true;
                }
            }
        };

        if positions.len() == 1 {
            stamp(i64::from(first.x), i64::from(first.y));
        }
        for pair in positions.windows(2) {
            bresenham(pair[0], pair[1], &mut stamp);
        }

        let mut covered = Vec::new();
        for (i, hit) in mask.iter().enumerate() {
            if *hit {
                let x = left as u32 + (i % box_w) as u32;
                let y = top as u32 + (i / box_w) as u32;
                covered.push(self.index(x, y));
            }
        }
        Ok(covered)
    }
}

fn bresenham(from: Position, to: Position, plot: &mut impl FnMut(i64, i64)) {
    let (mut x0, mut y0) = (i64::from(from.x), i64::from(from.y));
    let (x1, y1) = (i64::from(to.x), i64::from(to.y));
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        plot(x0, y0);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Straight-alpha source-over.
fn blend_over(dst: &mut [u8], src: [u8; 4]) {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return;
    }
    let da = u32::from(dst[3]);
    let da_part = da * (255 - sa) / 255;
    let out_a = sa + da_part;

    for c in 0..3 {
        dst[c] = ((u32::from(src[c]) * sa + u32::from(dst[c]) * da_part) / out_a) as u8;
    }
    dst[3] = out_a as u8;
}

impl CanvasProxy for Bitmap {
    fn size(&self) -> Size {
        self.size
    }

    fn stroke(&mut self, positions: &[Position], color: Color, width: u32) -> Result<(), RasterError> {
        let src = [color.r, color.g, color.b, color.a];
        for i in self.coverage(positions, width)? {
            blend_over(&mut self.pixels[i..i + 4], src);
        }
        Ok(())
    }

    fn erase(&mut self, positions: &[Position], opacity: u8, width: u32) -> Result<(), RasterError> {
        let keep = 255 - u32::from(opacity);
        for i in self.coverage(positions, width)? {
            let alpha = u32::from(self.pixels[i + 3]) * keep / 255;
            if alpha == 0 {
                self.pixels[i..i + 4].fill(0);
            } else {
                self.pixels[i + 3] = alpha as u8;
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RasterError> {
        self.pixels.fill(0);
        Ok(())
    }

    fn fill_rect(&mut self, position: Position, size: Size, color: Color) -> Result<(), RasterError> {
        let left = i64::from(position.x).max(0);
        let top = i64::from(position.y).max(0);
        let right = (i64::from(position.x) + i64::from(size.width)).min(i64::from(self.size.width));
        let bottom = (i64::from(position.y) + i64::from(size.height)).min(i64::from(self.size.height));

        let src = [color.r, color.g, color.b, color.a];
        for y in top..bottom {
            for x in left..right {
                let i = self.index(x as u32, y as u32);
                blend_over(&mut self.pixels[i..i + 4], src);
            }
        }
        Ok(())
    }

    fn composite_from(&mut self, other: &dyn CanvasProxy) -> Result<(), RasterError> {
        let other = other
            .as_any()
            .downcast_ref::<Bitmap>()
            .ok_or(RasterError::IncompatibleSurface)?;
        if other.size != self.size {
            return Err(RasterError::SizeMismatch {
                expected_w: self.size.width,
                expected_h: self.size.height,
                found_w: other.size.width,
                found_h: other.size.height,
            });
        }

        for (dst, src) in self.pixels.chunks_exact_mut(4).zip(other.pixels.chunks_exact(4)) {
            blend_over(dst, [src[0], src[1], src[2], src[3]]);
        }
        Ok(())
    }

    fn serialize_to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.pixels.len());
        // Writes into a Vec cannot fail.
        let _ = out.write_u32::<LittleEndian>(MAGIC);
        let _ = out.write_u32::<LittleEndian>(self.size.width);
        let _ = out.write_u32::<LittleEndian>(self.size.height);
        let _ = out.write_all(&self.pixels);
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Allocates `Bitmap` surfaces.
#[derive(Clone, Copy, Debug, Default)]
pub struct BitmapFactory;

impl CanvasProxyFactory for BitmapFactory {
    fn create(&self, size: Size) -> Box<dyn CanvasProxy> {
        Box::new(Bitmap::new(size))
    }

    fn from_bytes(&self, bytes: &[u8]) -> Result<Box<dyn CanvasProxy>, RasterError> {
        Ok(Box::new(Bitmap::from_bytes(bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Color {
        Color::rgb(255, 0, 0)
    }

    #[test]
    fn test_stroke_paints_path_and_endpoints() {
        let mut bmp = Bitmap::new(Size::new(16, 16));
        bmp.stroke(&[Position::new(2, 2), Position::new(10, 2)], red(), 1).unwrap();

        for x in 2..=10 {
            assert_eq!(bmp.pixel(x, 2), Some(red()));
        }
        assert_eq!(bmp.pixel(1, 2), Some(Color::TRANSPARENT));
        assert_eq!(bmp.painted_pixels(), 9);
    }

    #[test]
    fn test_translucent_stroke_blends_once_per_pixel() {
        let mut bmp = Bitmap::new(Size::new(16, 16));
        // Self-overlapping path: the mask must not double-blend.
        let path = [Position::new(3, 3), Position::new(8, 3), Position::new(3, 3)];
        bmp.stroke(&path, Color::rgba(0, 0, 255, 128), 3).unwrap();
        assert_eq!(bmp.pixel(5, 3).unwrap().a, 128);
    }

    #[test]
    fn test_full_erase_normalizes_pixel() {
        let mut bmp = Bitmap::new(Size::new(8, 8));
        bmp.fill_rect(Position::new(0, 0), Size::new(8, 8), red()).unwrap();
        bmp.erase(&[Position::new(4, 4)], 255, 1).unwrap();
        assert_eq!(bmp.pixel(4, 4), Some(Color::TRANSPARENT));
        assert_eq!(bmp.pixel(3, 4), Some(red()));
    }

    #[test]
    fn test_partial_erase_keeps_color() {
        let mut bmp = Bitmap::new(Size::new(8, 8));
        bmp.fill_rect(Position::new(0, 0), Size::new(8, 8), red()).unwrap();
        bmp.erase(&[Position::new(1, 1)], 128, 1).unwrap();
        let p = bmp.pixel(1, 1).unwrap();
        assert_eq!((p.r, p.a), (255, 127));
    }

    #[test]
    fn test_out_of_bounds_geometry_is_clipped() {
        let mut bmp = Bitmap::new(Size::new(8, 8));
        bmp.stroke(&[Position::new(-20, -20), Position::new(-10, -10)], red(), 2).unwrap();
        bmp.fill_rect(Position::new(6, 6), Size::new(100, 100), red()).unwrap();
        assert_eq!(bmp.painted_pixels(), 4);
    }

    #[test]
    fn test_empty_stroke_is_rejected() {
        let mut bmp = Bitmap::new(Size::new(8, 8));
        assert_eq!(bmp.stroke(&[], red(), 1), Err(RasterError::EmptyStroke));
    }

    #[test]
    fn test_duplicate_is_byte_exact_and_independent() {
        let factory = BitmapFactory;
        let mut src = Bitmap::new(Size::new(12, 12));
        src.stroke(&[Position::new(0, 0), Position::new(11, 11)], Color::rgba(10, 200, 30, 77), 3).unwrap();
        src.erase(&[Position::new(5, 5)], 255, 3).unwrap();

        let mut copy = factory.duplicate(&src).unwrap();
        assert_eq!(copy.serialize_to_bytes(), src.serialize_to_bytes());

        copy.clear().unwrap();
        assert_ne!(copy.serialize_to_bytes(), src.serialize_to_bytes());
    }

    #[test]
    fn test_bytes_roundtrip_and_rejects_garbage() {
        let factory = BitmapFactory;
        let mut src = Bitmap::new(Size::new(4, 3));
        src.fill_rect(Position::new(1, 1), Size::new(2, 1), red()).unwrap();

        let restored = factory.from_bytes(&src.serialize_to_bytes()).unwrap();
        assert_eq!(restored.serialize_to_bytes(), src.serialize_to_bytes());

        let mut bad = src.serialize_to_bytes();
        bad.pop();
        assert!(factory.from_bytes(&bad).is_err());
        assert!(factory.from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_huge_width_covers_surface_once() {
        let mut bmp = Bitmap::new(Size::new(24, 24));
        bmp.stroke(&[Position::new(1, 1)], red(), u32::MAX).unwrap();
        assert_eq!(bmp.painted_pixels(), 24 * 24);

        let mut bmp = Bitmap::new(Size::new(24, 24));
        bmp.stroke(&[Position::new(1, 1), Position::new(20, 3)], red(), 1_000_000).unwrap();
        assert_eq!(bmp.painted_pixels(), 24 * 24);
    }

    #[test]
    fn test_from_bytes_zeroes_transparent_pixels() {
        let factory = BitmapFactory;
        let mut bytes = Bitmap::new(Size::new(2, 1)).serialize_to_bytes();
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&[9, 8, 7, 0]);

        let loaded = Bitmap::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.pixel(0, 0), Some(Color::TRANSPARENT));
        let copy = factory.duplicate(&loaded).unwrap();
        assert_eq!(copy.serialize_to_bytes(), loaded.serialize_to_bytes());
    }

    #[test]
    fn test_composite_size_mismatch() {
        let mut a = Bitmap::new(Size::new(4, 4));
        let b = Bitmap::new(Size::new(5, 4));
        assert!(matches!(a.composite_from(&b), Err(RasterError::SizeMismatch { .. })));
    }
}
