//! ASCII conversion module.
//!
//! Two pure stages:
//!
//! 1. **Quantization** - an RGB triple is reduced to a perceptual
//!    luminance and mapped onto a fixed glyph ramp.
//! 2. **Rasterization** - a whole [`crate::source::PixelBuffer`] is
//!    sampled row by row into an [`AsciiFrame`], one glyph per pixel.
//!
//! Both stages are stateless and deterministic: the same buffer always
//! produces byte-identical text.

mod quantize;
mod rasterize;

pub use quantize::{glyph_for, luminance, GLYPH_RAMP};
pub use rasterize::{rasterize, rasterize_with_stride, AsciiFrame, DEFAULT_ROW_STRIDE};
