//! Frame rasterization: pixel buffer to text grid.

use std::fmt;

use super::quantize::glyph_for;
use crate::source::PixelBuffer;

/// Default vertical sampling stride.
///
/// Glyph cells are roughly twice as tall as they are wide, so sampling
/// every other row keeps the rendered image close to its true aspect
/// ratio. The right value depends on the rendering font; callers with an
/// unusual font can pass their own stride to [`rasterize_with_stride`].
pub const DEFAULT_ROW_STRIDE: u32 = 2;

/// One frame of converted text: an ordered list of lines, one per
/// sampled pixel row, each holding one glyph per pixel column.
///
/// Built fresh per frame and handed to the caller; the rasterizer keeps
/// no reference to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    lines: Vec<String>,
}

impl AsciiFrame {
    /// The text lines, top to bottom.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines (sampled rows).
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Width in glyphs (zero for an empty frame).
    pub fn width(&self) -> usize {
        self.lines.first().map(|l| l.chars().count()).unwrap_or(0)
    }
}

impl fmt::Display for AsciiFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Convert a pixel buffer to an [`AsciiFrame`] using the default stride.
///
/// Samples rows at [`DEFAULT_ROW_STRIDE`] and every column, quantizing
/// the R,G,B channels of each sampled pixel (alpha is ignored). Output
/// has `ceil(height / 2)` lines of `width` glyphs each.
pub fn rasterize(buffer: &PixelBuffer) -> AsciiFrame {
    rasterize_with_stride(buffer, DEFAULT_ROW_STRIDE)
}

/// Convert a pixel buffer to an [`AsciiFrame`] with a custom row stride.
///
/// A stride of 0 is treated as 1. Rows that fall between strides are not
/// sampled; an odd trailing row is simply dropped, never padded.
pub fn rasterize_with_stride(buffer: &PixelBuffer, stride: u32) -> AsciiFrame {
    let stride = stride.max(1);

    let mut lines = Vec::with_capacity(buffer.height.div_ceil(stride) as usize);
    for y in (0..buffer.height).step_by(stride as usize) {
        let mut line = String::with_capacity(buffer.width as usize);
        for x in 0..buffer.width {
            let [r, g, b, _] = buffer.rgba_at(x, y);
            line.push(glyph_for(r, g, b));
        }
        lines.push(line);
    }

    AsciiFrame { lines }
}
