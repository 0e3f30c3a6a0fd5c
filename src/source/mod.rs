//! Frame sources: uniform producers of raw pixel buffers.
//!
//! Three variants implement the same lifecycle contract:
//! - [`StaticImageSource`] - decodes one still image and delivers a
//!   single frame on `start()`,
//! - [`LoopingVideoSource`] - plays a media file on an endless silent
//!   loop through a decoder process,
//! - [`CameraSource`] - captures a live camera feed.
//!
//! All of them hand frames to registered listeners at the configured
//! target resolution; the continuous variants drive a shared
//! [`render_loop`] on a background thread.

mod camera;
mod frame_ops;
mod image;
mod listeners;
mod render_loop;
mod types;
mod video;

pub use camera::CameraSource;
pub use image::{convert_image_bytes, StaticImageSource};
pub use listeners::{FrameListener, ListenerId};
pub use render_loop::StopHandle;
pub use types::{LifecycleState, PixelBuffer, SourceConfig, SourceError};
pub use video::LoopingVideoSource;

/// Shared lifecycle contract over the three frame source variants.
///
/// State machine: `Uninitialized -> Initialized -> Playing`, with
/// `stop()` resetting any state back to `Uninitialized` (resource
/// released, listeners cleared). Listeners are never invoked outside
/// `Playing`.
pub trait FrameSource {
    /// Acquire the underlying visual resource at the configured target
    /// resolution. Re-initializing tears down any prior resource first.
    ///
    /// # Errors
    /// * `UnsupportedCapability` - the host lacks a required capability
    /// * `ResourceAcquisitionFailed` - the resource exists but could not
    ///   be opened
    /// * `DecodeFailed` - static input could not be decoded
    fn init(&mut self, config: SourceConfig) -> Result<(), SourceError>;

    /// Begin producing frames. No-op unless the source is `Initialized`;
    /// calling it again while `Playing` never duplicates the loop.
    fn start(&mut self);

    /// Halt frame production, release the resource, and clear the
    /// listener set. Synchronous: the resource is fully released before
    /// this returns. Safe to call in any state, any number of times.
    fn stop(&mut self);

    /// Register a frame listener. Insertion order is notification
    /// order; registering the same callback twice delivers each frame
    /// twice. Callable in any state; listeners are inert until
    /// `Playing`.
    fn add_frame_listener(&mut self, listener: FrameListener) -> ListenerId;

    /// Remove a previously registered listener.
    fn remove_frame_listener(&mut self, id: ListenerId);

    /// Configured target render width.
    fn width(&self) -> u32;

    /// Configured target render height.
    fn height(&self) -> u32;

    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;
}
