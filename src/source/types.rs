//! Frame source types and data structures.

use std::time::Instant;

use thiserror::Error;

/// An immutable snapshot of raw color data for one frame.
///
/// `data` holds `width * height * 4` bytes in R,G,B,A channel order,
/// row-major, top to bottom. A buffer is produced fresh for every frame;
/// listener callbacks borrow it for the duration of the call only and
/// must copy anything they want to keep across frames.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Raw pixel data, RGBA
    pub data: Vec<u8>,
    /// Timestamp when the frame was produced
    pub timestamp: Instant,
}

impl PixelBuffer {
    /// Create a buffer from raw RGBA bytes.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "pixel data length must be width * height * 4"
        );
        Self {
            width,
            height,
            data,
            timestamp: Instant::now(),
        }
    }

    /// The R,G,B,A bytes of the pixel at (x, y).
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]
    }
}

/// Configuration handed to [`crate::source::FrameSource::init`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Target render width in pixels (frames are scaled to fit, whatever
    /// the native resolution of the underlying source)
    pub width: u32,
    /// Target render height in pixels
    pub height: u32,
    /// Resource locator: a file path for image and media sources, unused
    /// by the camera
    pub locator: Option<String>,
    /// Refresh cadence of the render loop in frames per second. Delivery
    /// is best-effort; a slow consumer simply lowers the achieved rate.
    pub refresh_fps: u32,
}

impl SourceConfig {
    /// Config for a source without a resource locator.
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Config pointing at a file path.
    pub fn with_locator(width: u32, height: u32, locator: impl Into<String>) -> Self {
        Self {
            width,
            height,
            locator: Some(locator.into()),
            ..Self::default()
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            locator: None,
            refresh_fps: 30,
        }
    }
}

/// Lifecycle state of a frame source.
///
/// `stop()` returns a source all the way to `Uninitialized`: the
/// underlying resource is released and the listener set cleared, so the
/// source is immediately ready for another `init()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No resource held; `init()` is required before anything else
    #[default]
    Uninitialized,
    /// Resource acquired, render loop not running
    Initialized,
    /// Render loop running, listeners receiving frames
    Playing,
}

/// Errors that can occur while acquiring or decoding a visual source.
///
/// Every fallible operation reports its failure to the immediate caller;
/// the core never retries. Retry policy, if any, belongs to whoever
/// drives the source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The host environment lacks a required capability (no camera
    /// backend, no decoder binary). Fatal for this source instance.
    #[error("required capability unavailable: {0}")]
    UnsupportedCapability(String),
    /// The resource exists but could not be opened: permission denied,
    /// missing file, stream failure. Retryable by calling `init` again.
    #[error("failed to acquire source: {0}")]
    ResourceAcquisitionFailed(String),
    /// Malformed or unreadable static input. Fatal for this one
    /// conversion only; other sources are unaffected.
    #[error("failed to decode input: {0}")]
    DecodeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_buffer_rgba_at() {
        let buf = PixelBuffer::new(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(buf.rgba_at(0, 0), [1, 2, 3, 4]);
        assert_eq!(buf.rgba_at(1, 0), [5, 6, 7, 8]);
    }

    #[test]
    #[should_panic(expected = "width * height * 4")]
    fn test_pixel_buffer_length_checked() {
        let _ = PixelBuffer::new(2, 2, vec![0; 3]);
    }

    #[test]
    fn test_source_config_default() {
        let config = SourceConfig::default();
        assert_eq!(config.width, 400);
        assert_eq!(config.height, 300);
        assert_eq!(config.refresh_fps, 30);
        assert!(config.locator.is_none());
    }

    #[test]
    fn test_source_config_with_locator() {
        let config = SourceConfig::with_locator(320, 240, "clip.mp4");
        assert_eq!(config.locator.as_deref(), Some("clip.mp4"));
        assert_eq!(config.width, 320);
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::UnsupportedCapability("no camera backend".into());
        assert!(err.to_string().contains("no camera backend"));
        let err = SourceError::ResourceAcquisitionFailed("denied".into());
        assert!(err.to_string().contains("acquire"));
        let err = SourceError::DecodeFailed("bad header".into());
        assert!(err.to_string().contains("decode"));
    }
}
