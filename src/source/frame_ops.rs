//! Pixel-level frame transformations shared by the capture sources.

use super::types::PixelBuffer;

/// Scale raw RGB bytes to the target resolution and expand to RGBA.
///
/// Nearest-neighbor sampling: each destination pixel reads the source
/// pixel whose coordinates scale proportionally. Cheap enough to run
/// per tick at webcam resolutions, and exact for the identity case.
/// Alpha is set fully opaque.
pub fn scale_rgb_to_rgba(
    rgb: &[u8],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity((dst_width * dst_height * 4) as usize);
    for dy in 0..dst_height {
        let sy = (dy as u64 * src_height as u64 / dst_height as u64) as u32;
        for dx in 0..dst_width {
            let sx = (dx as u64 * src_width as u64 / dst_width as u64) as u32;
            let offset = ((sy * src_width + sx) * 3) as usize;
            out.push(rgb[offset]);
            out.push(rgb[offset + 1]);
            out.push(rgb[offset + 2]);
            out.push(255);
        }
    }
    out
}

/// Mirror a buffer horizontally (flip left-right) for selfie mode.
pub fn mirror_horizontal(buffer: &mut PixelBuffer) {
    let width = buffer.width as usize;
    let height = buffer.height as usize;

    for y in 0..height {
        let row_start = y * width * 4;
        let row = &mut buffer.data[row_start..row_start + width * 4];
        for x in 0..width / 2 {
            let left = x * 4;
            let right = (width - 1 - x) * 4;
            for channel in 0..4 {
                row.swap(left + channel, right + channel);
            }
        }
    }
}
