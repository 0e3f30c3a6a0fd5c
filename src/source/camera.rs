//! Live camera source built on nokhwa.

use std::sync::{Arc, Mutex};

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{query, Camera};

use super::frame_ops::{mirror_horizontal, scale_rgb_to_rgba};
use super::listeners::{FrameListener, ListenerId, ListenerRegistry};
use super::render_loop::{FrameGrabber, RenderLoop, StopHandle};
use super::types::{LifecycleState, PixelBuffer, SourceConfig, SourceError};
use super::video::tick_interval;
use super::FrameSource;

/// Frame source capturing a live camera feed.
///
/// `init` checks for capture capability synchronously and opens the
/// device; the camera itself lives on the render loop thread, which is
/// the only thread that touches it. `stop()` joins that thread, so the
/// device is fully released before the call returns.
pub struct CameraSource {
    config: SourceConfig,
    state: LifecycleState,
    listeners: Arc<Mutex<ListenerRegistry>>,
    render_loop: Option<RenderLoop>,
    device_index: u32,
    mirror: bool,
}

impl Default for CameraSource {
    fn default() -> Self {
        Self::new(0, true)
    }
}

impl CameraSource {
    /// A source bound to the camera at `device_index`. `mirror` flips
    /// frames horizontally for a selfie view.
    pub fn new(device_index: u32, mirror: bool) -> Self {
        Self {
            config: SourceConfig::default(),
            state: LifecycleState::Uninitialized,
            listeners: Arc::new(Mutex::new(ListenerRegistry::new())),
            render_loop: None,
            device_index,
            mirror,
        }
    }

    /// Handle for requesting cancellation from inside a listener.
    /// `None` unless the source is initialized.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.render_loop.as_ref().map(|l| l.stop_handle())
    }

    /// Close the device without touching the listener set. Re-init goes
    /// through here; only `stop()` clears listeners.
    fn release_resource(&mut self) {
        if let Some(mut render_loop) = self.render_loop.take() {
            render_loop.stop();
        }
        self.state = LifecycleState::Uninitialized;
    }
}

impl FrameSource for CameraSource {
    fn init(&mut self, config: SourceConfig) -> Result<(), SourceError> {
        // Release any previously held device before reacquiring.
        self.release_resource();

        // Capability check happens here, synchronously, before any
        // thread is spawned: a missing backend or an empty device list
        // means the host cannot capture at all.
        let devices = query(ApiBackend::Auto).map_err(|e| {
            SourceError::UnsupportedCapability(format!("camera backend unavailable: {}", e))
        })?;
        if devices.is_empty() {
            return Err(SourceError::UnsupportedCapability(
                "no camera devices present".to_string(),
            ));
        }
        if !devices
            .iter()
            .any(|d| d.index().as_index().ok() == Some(self.device_index))
        {
            return Err(SourceError::ResourceAcquisitionFailed(format!(
                "camera device {} not found ({} available)",
                self.device_index,
                devices.len()
            )));
        }

        let grabber_config = CameraGrabberConfig {
            device_index: self.device_index,
            width: config.width,
            height: config.height,
            fps: config.refresh_fps,
            mirror: self.mirror,
        };
        let tick = tick_interval(config.refresh_fps);
        // The device is opened on the loop thread (nokhwa cameras are
        // not meant to cross threads); spawn blocks until it reports.
        let render_loop = RenderLoop::spawn(
            move || CameraGrabber::open(grabber_config),
            Arc::clone(&self.listeners),
            tick,
        )?;

        self.render_loop = Some(render_loop);
        self.config = config;
        self.state = LifecycleState::Initialized;
        log::info!("camera {} initialized", self.device_index);
        Ok(())
    }

    fn start(&mut self) {
        if self.state != LifecycleState::Initialized {
            return;
        }
        if let Some(render_loop) = &self.render_loop {
            // State first: the loop may fan out a frame as soon as it
            // is armed, and listeners only ever fire while Playing.
            self.state = LifecycleState::Playing;
            render_loop.start();
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

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Copy)]
struct CameraGrabberConfig {
    device_index: u32,
    width: u32,
    height: u32,
    fps: u32,
    mirror: bool,
}

/// Owns the open camera on the render loop thread.
struct CameraGrabber {
    camera: Camera,
    config: CameraGrabberConfig,
}

impl CameraGrabber {
    fn open(config: CameraGrabberConfig) -> Result<Self, SourceError> {
        let index = CameraIndex::Index(config.device_index);
        let mut camera = open_with_fallback(&index, &config)?;
        camera
            .open_stream()
            .map_err(|e| SourceError::ResourceAcquisitionFailed(e.to_string()))?;
        log::debug!(
            "camera stream open at native {}x{}",
            camera.resolution().width(),
            camera.resolution().height()
        );
        Ok(Self { camera, config })
    }
}

impl FrameGrabber for CameraGrabber {
    fn grab(&mut self) -> Option<PixelBuffer> {
        let raw = self.camera.frame().ok()?;
        // decode_image handles MJPEG, YUYV, NV12 and friends
        let decoded = raw.decode_image::<RgbFormat>().ok()?;
        let native = raw.resolution();
        let rgba = scale_rgb_to_rgba(
            decoded.as_raw(),
            native.width(),
            native.height(),
            self.config.width,
            self.config.height,
        );
        let mut frame = PixelBuffer::new(self.config.width, self.config.height, rgba);
        if self.config.mirror {
            mirror_horizontal(&mut frame);
        }
        Some(frame)
    }

    fn release(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

/// Try a few capture format strategies in order of preference.
fn open_with_fallback(
    index: &CameraIndex,
    config: &CameraGrabberConfig,
) -> Result<Camera, SourceError> {
    let requested_resolution = Resolution::new(config.width, config.height);
    let attempts: Vec<RequestedFormat> = vec![
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_resolution,
            FrameFormat::NV12,
            config.fps,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_resolution,
            FrameFormat::MJPEG,
            config.fps,
        ))),
        // Let the camera pick whatever works
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for requested in attempts {
        match Camera::new(index.clone(), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => last_error = Some(e),
        }
    }

    let e = last_error.expect("at least one open attempt was made");
    let msg = e.to_string();
    let lowered = msg.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("access") {
        Err(SourceError::ResourceAcquisitionFailed(format!(
            "camera permission denied: {}",
            msg
        )))
    } else {
        Err(SourceError::ResourceAcquisitionFailed(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_without_init_is_noop() {
        let mut source = CameraSource::default();
        source.start();
        assert_eq!(source.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_stop_any_number_of_times() {
        let mut source = CameraSource::new(0, false);
        source.stop();
        source.stop();
        assert_eq!(source.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_init_without_capability_fails_synchronously() {
        // On hosts without any camera this must surface a typed error
        // from init itself, never reaching Playing. On hosts with a
        // camera the init may succeed; both outcomes are valid here,
        // what matters is that a failure is UnsupportedCapability or
        // ResourceAcquisitionFailed and leaves the source resettable.
        let mut source = CameraSource::new(99, false);
        match source.init(SourceConfig::sized(32, 24)) {
            Ok(()) => source.stop(),
            Err(SourceError::UnsupportedCapability(_))
            | Err(SourceError::ResourceAcquisitionFailed(_)) => {
                assert_eq!(source.state(), LifecycleState::Uninitialized);
            }
            Err(other) => panic!("unexpected error kind: {:?}", other),
        }
    }
}
