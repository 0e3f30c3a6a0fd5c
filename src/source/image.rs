//! Static image source: a degenerate one-shot frame producer.

use std::sync::{Arc, Mutex};

use image::imageops::FilterType;

use super::listeners::{FrameListener, ListenerId, ListenerRegistry};
use super::types::{LifecycleState, PixelBuffer, SourceConfig, SourceError};
use super::FrameSource;
use crate::ascii::{rasterize, AsciiFrame};

/// Frame source backed by a single still image.
///
/// `init` decodes the image at the locator path into an off-screen
/// raster at the target resolution; `start` delivers exactly one frame
/// to the registered listeners and the source is then exhausted. It
/// exists for interface uniformity with the continuous sources -
/// `stop()` still applies for teardown parity.
#[derive(Default)]
pub struct StaticImageSource {
    config: SourceConfig,
    state: LifecycleState,
    listeners: Arc<Mutex<ListenerRegistry>>,
    frame: Option<PixelBuffer>,
}

impl StaticImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the decoded raster without touching the listener set.
    /// Re-init goes through here; only `stop()` clears listeners.
    fn release_resource(&mut self) {
        self.frame = None;
        self.state = LifecycleState::Uninitialized;
    }
}

impl FrameSource for StaticImageSource {
    fn init(&mut self, config: SourceConfig) -> Result<(), SourceError> {
        // Re-init drops any previously decoded raster first.
        self.release_resource();

        let path = config.locator.clone().ok_or_else(|| {
            SourceError::ResourceAcquisitionFailed("no image path given".to_string())
        })?;
        let bytes = std::fs::read(&path).map_err(|e| {
            SourceError::ResourceAcquisitionFailed(format!("failed to read '{}': {}", path, e))
        })?;

        self.frame = Some(decode_to_buffer(&bytes, config.width, config.height)?);
        self.config = config;
        self.state = LifecycleState::Initialized;
        log::debug!("static image '{}' decoded to {}x{}", path, self.config.width, self.config.height);
        Ok(())
    }

    fn start(&mut self) {
        if self.state != LifecycleState::Initialized {
            return;
        }
        self.state = LifecycleState::Playing;
        // One frame, delivered synchronously; the source is exhausted
        // afterwards but stays Playing until stopped.
        if let (Some(frame), Ok(mut registry)) = (self.frame.as_ref(), self.listeners.lock()) {
            registry.notify(frame);
        }
    }

    fn stop(&mut self) {
        self.release_resource();
        if let Ok(mut registry) = self.listeners.lock() {
            registry.clear();
        }
    }

    fn add_frame_listener(&mut self, listener: FrameListener) -> ListenerId {
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .add(listener)
    }

    fn remove_frame_listener(&mut self, id: ListenerId) {
        if let Ok(mut registry) = self.listeners.lock() {
            registry.remove(id);
        }
    }

    fn width(&self) -> u32 {
        self.config.width
    }

    fn height(&self) -> u32 {
        self.config.height
    }

    fn state(&self) -> LifecycleState {
        self.state
    }
}

/// One-shot conversion of encoded image bytes to ASCII text.
///
/// Bypasses the listener and lifecycle machinery entirely: decode,
/// scale to `width` x `height`, rasterize.
///
/// # Errors
/// `DecodeFailed` if the bytes are not a decodable image.
pub fn convert_image_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> Result<AsciiFrame, SourceError> {
    let buffer = decode_to_buffer(bytes, width, height)?;
    Ok(rasterize(&buffer))
}

/// Decode encoded image bytes into an RGBA buffer at the target size.
fn decode_to_buffer(bytes: &[u8], width: u32, height: u32) -> Result<PixelBuffer, SourceError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| SourceError::DecodeFailed(e.to_string()))?;
    let scaled = decoded
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8();
    Ok(PixelBuffer::new(width, height, scaled.into_raw()))
}
