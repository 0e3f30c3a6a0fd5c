//! Brightness quantization: RGB triple to glyph.

/// Glyph ramp ordered from darkest-appearing to lightest-appearing.
/// The brightest class is a blank, so white regions render as empty space.
pub const GLYPH_RAMP: &[char] = &['@', '%', '#', '*', '+', '=', '-', ':', '.', ' '];

/// Compute perceptual luminance using the ITU-R BT.601 formula.
///
/// The formula is: Y = 0.299*R + 0.587*G + 0.114*B
///
/// Integer math keeps this allocation- and float-free in the per-pixel
/// hot path; the coefficients are scaled by 1000 (299 + 587 + 114 = 1000).
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Map an RGB triple to one glyph from [`GLYPH_RAMP`].
///
/// Normalized brightness `b = luminance / 255` selects ramp index
/// `floor(b * (len - 1))`, so pure black maps to the densest glyph and
/// pure white maps to the blank at the end of the ramp.
#[inline]
pub fn glyph_for(r: u8, g: u8, b: u8) -> char {
    let levels = GLYPH_RAMP.len();
    let idx = luminance(r, g, b) as usize * (levels - 1) / 255;
    GLYPH_RAMP[idx.min(levels - 1)]
}
