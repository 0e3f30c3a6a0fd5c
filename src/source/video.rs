//! Looping media source backed by an ffmpeg decoder process.
//!
//! ffmpeg handles demuxing, decoding, looping, and scaling; this module
//! reads raw RGBA frames off its stdout pipe, one per render-loop tick:
//!
//! ```text
//! ffmpeg -stream_loop -1 -re -i <file> -f rawvideo -pix_fmt rgba ... | render loop
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::listeners::{FrameListener, ListenerId, ListenerRegistry};
use super::render_loop::{FrameGrabber, RenderLoop, StopHandle};
use super::types::{LifecycleState, PixelBuffer, SourceConfig, SourceError};
use super::FrameSource;

/// Frame source that plays a media file on an endless silent loop.
///
/// `init` spawns the decoder scaled to the target resolution; frames are
/// then pulled from the pipe at refresh cadence once `start()` arms the
/// render loop. `stop()` terminates the decoder process before
/// returning.
#[derive(Default)]
pub struct LoopingVideoSource {
    config: SourceConfig,
    state: LifecycleState,
    listeners: Arc<Mutex<ListenerRegistry>>,
    render_loop: Option<RenderLoop>,
}

impl LoopingVideoSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for requesting cancellation from inside a listener.
    /// `None` unless the source is initialized.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.render_loop.as_ref().map(|l| l.stop_handle())
    }

    /// Terminate the decoder without touching the listener set.
    /// Re-init goes through here; only `stop()` clears listeners.
    fn release_resource(&mut self) {
        if let Some(mut render_loop) = self.render_loop.take() {
            render_loop.stop();
        }
        self.state = LifecycleState::Uninitialized;
    }
}

impl FrameSource for LoopingVideoSource {
    fn init(&mut self, config: SourceConfig) -> Result<(), SourceError> {
        // Never leak a previously spawned decoder.
        self.release_resource();

        let path = config.locator.clone().ok_or_else(|| {
            SourceError::ResourceAcquisitionFailed("no media path given".to_string())
        })?;
        if !Path::new(&path).is_file() {
            return Err(SourceError::ResourceAcquisitionFailed(format!(
                "media file '{}' not found",
                path
            )));
        }

        let (width, height) = (config.width, config.height);
        let tick = tick_interval(config.refresh_fps);
        let render_loop = RenderLoop::spawn(
            move || VideoGrabber::spawn(&path, width, height),
            Arc::clone(&self.listeners),
            tick,
        )?;

        self.render_loop = Some(render_loop);
        self.config = config;
        self.state = LifecycleState::Initialized;
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

impl Drop for LoopingVideoSource {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(super) fn tick_interval(refresh_fps: u32) -> Duration {
    Duration::from_secs(1) / refresh_fps.max(1)
}

/// Owns the ffmpeg child process and reads one frame per grab.
struct VideoGrabber {
    child: Child,
    stdout: ChildStdout,
    stderr_thread: Option<JoinHandle<()>>,
    width: u32,
    height: u32,
    /// First frame, read during acquisition to prove the input decodes
    first_frame: Option<PixelBuffer>,
    /// Set once the decoder process is known to have exited
    decoder_exited: bool,
}

impl VideoGrabber {
    /// Spawn ffmpeg decoding `path` on an infinite loop, silent, scaled
    /// to the target resolution, raw RGBA on stdout.
    ///
    /// Spawn success alone proves nothing: a corrupt input makes the
    /// decoder exit immediately with no output. The first frame is read
    /// here, up front, so an unreadable input surfaces as a typed
    /// failure from acquisition rather than an endless run of empty
    /// ticks.
    ///
    /// # Errors
    /// * `UnsupportedCapability` - no ffmpeg binary on this host
    /// * `ResourceAcquisitionFailed` - the process could not be
    ///   spawned, or exited before producing a single frame
    fn spawn(path: &str, width: u32, height: u32) -> Result<Self, SourceError> {
        let size = format!("{}x{}", width, height);
        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            // Loop the input forever; -re paces decoding at native rate
            "-stream_loop",
            "-1",
            "-re",
            "-i",
            path,
            "-an",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &size,
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SourceError::UnsupportedCapability(
                    "ffmpeg not found; install it to play media files".to_string(),
                )
            } else {
                SourceError::ResourceAcquisitionFailed(format!("failed to spawn ffmpeg: {}", e))
            }
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SourceError::ResourceAcquisitionFailed("ffmpeg stdout unavailable".to_string())
        })?;

        // Drain stderr so the decoder never blocks on a full pipe.
        let stderr_thread = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    log::debug!("[ffmpeg] {}", line);
                }
            })
        });

        let mut grabber = Self {
            child,
            stdout,
            stderr_thread,
            width,
            height,
            first_frame: None,
            decoder_exited: false,
        };

        match grabber.read_frame() {
            Some(frame) => {
                grabber.first_frame = Some(frame);
                Ok(grabber)
            }
            None => {
                let status = grabber
                    .child
                    .try_wait()
                    .ok()
                    .flatten()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown status".to_string());
                grabber.release();
                Err(SourceError::ResourceAcquisitionFailed(format!(
                    "media decoder produced no frames for '{}' ({}); input is unreadable or corrupt",
                    path, status
                )))
            }
        }
    }

    /// Read one raw RGBA frame off the decoder pipe.
    fn read_frame(&mut self) -> Option<PixelBuffer> {
        let mut data = vec![0u8; (self.width * self.height * 4) as usize];
        self.stdout.read_exact(&mut data).ok()?;
        Some(PixelBuffer::new(self.width, self.height, data))
    }
}

impl FrameGrabber for VideoGrabber {
    fn grab(&mut self) -> Option<PixelBuffer> {
        if let Some(frame) = self.first_frame.take() {
            return Some(frame);
        }
        if self.decoder_exited {
            return None;
        }
        match self.read_frame() {
            Some(frame) => Some(frame),
            None => {
                // A dead decoder never comes back; say so once, loudly.
                // A failed read on a live process is mid-teardown noise.
                if let Ok(Some(status)) = self.child.try_wait() {
                    log::error!(
                        "media decoder exited ({}); no further frames will be produced",
                        status
                    );
                    self.decoder_exited = true;
                } else {
                    log::debug!("ffmpeg frame read failed; skipping tick");
                }
                None
            }
        }
    }

    fn release(&mut self) {
        // Ask ffmpeg to finish cleanly, then force it if it lingers.
        #[cfg(unix)]
        unsafe {
            libc::kill(self.child.id() as i32, libc::SIGINT);
        }
        #[cfg(not(unix))]
        let _ = self.child.kill();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(50));
                }
                _ => {
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }

        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_missing_file_is_acquisition_failure() {
        let mut source = LoopingVideoSource::new();
        let config = SourceConfig::with_locator(8, 8, "/nonexistent/clip.mp4");
        let result = source.init(config);
        assert!(matches!(
            result,
            Err(SourceError::ResourceAcquisitionFailed(_))
        ));
        assert_eq!(source.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_init_without_locator_fails() {
        let mut source = LoopingVideoSource::new();
        let result = source.init(SourceConfig::sized(8, 8));
        assert!(matches!(
            result,
            Err(SourceError::ResourceAcquisitionFailed(_))
        ));
    }

    #[test]
    fn test_start_without_init_is_noop() {
        let mut source = LoopingVideoSource::new();
        source.start();
        assert_eq!(source.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_stop_before_start_is_safe() {
        let mut source = LoopingVideoSource::new();
        source.stop();
        source.stop();
        assert_eq!(source.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(tick_interval(30), Duration::from_secs(1) / 30);
        // A zero rate must not divide by zero
        assert_eq!(tick_interval(0), Duration::from_secs(1));
    }
}
