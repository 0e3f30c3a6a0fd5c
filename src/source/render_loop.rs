//! Shared render loop for continuous frame sources.
//!
//! The loop owns the underlying capture resource on a background thread
//! and walks an explicit state machine:
//!
//! ```text
//! Idle (resource acquired, waiting for Start)
//!   -> Armed (Start received, no frame delivered yet)
//!   -> Ticking (re-arms itself every tick until stopped)
//! ```
//!
//! Cancellation is checked at the top of every tick and again before
//! fan-out, so a stop requested mid-tick turns the rest of that tick
//! into a no-op instead of racing the teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::listeners::ListenerRegistry;
use super::types::{PixelBuffer, SourceError};

/// Produces one pixel buffer per tick from an acquired resource.
///
/// Implementations own the resource outright; `release` is called on the
/// loop thread before it exits, so teardown completes before the
/// controlling `stop()` call returns.
pub(crate) trait FrameGrabber {
    /// Capture the current visual state as an RGBA buffer at the target
    /// resolution. `None` skips this tick (e.g. a transient decode
    /// failure); the loop keeps ticking.
    fn grab(&mut self) -> Option<PixelBuffer>;

    /// Release the underlying resource.
    fn release(&mut self);
}

/// Commands sent to the loop thread.
enum LoopCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Armed,
    Ticking,
}

/// Lets a listener callback request cancellation without deadlocking.
///
/// A full `stop()` joins the loop thread, which would deadlock if called
/// from inside a listener (listeners run on that very thread). The
/// handle only raises the stop flag; the tick in flight finishes, the
/// next one never begins, and the owner still calls `stop()` afterwards
/// for synchronous resource release.
#[derive(Debug, Clone)]
pub struct StopHandle {
    stop_signal: Arc<AtomicBool>,
}

impl StopHandle {
    /// Mark the loop for cancellation at the next tick boundary.
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }
}

/// Handle to a running render loop.
///
/// Spawning acquires the resource on the loop thread and blocks until
/// acquisition succeeds or fails, so the caller gets a typed error
/// synchronously. Dropping the handle stops the loop.
pub(crate) struct RenderLoop {
    thread: Option<JoinHandle<()>>,
    command_tx: Option<Sender<LoopCommand>>,
    stop_signal: Arc<AtomicBool>,
}

impl RenderLoop {
    /// Spawn the loop thread and run `acquire` on it.
    ///
    /// `acquire` opens the capture resource inside the thread that will
    /// use it, which sidesteps Send requirements on the grabber itself.
    /// The loop stays in `Idle` (listeners inert) until [`Self::start`].
    ///
    /// # Errors
    /// Whatever `acquire` reports, or `ResourceAcquisitionFailed` if the
    /// thread dies before reporting.
    pub fn spawn<G, F>(
        acquire: F,
        listeners: Arc<Mutex<ListenerRegistry>>,
        tick_interval: Duration,
    ) -> Result<Self, SourceError>
    where
        G: FrameGrabber + 'static,
        F: FnOnce() -> Result<G, SourceError> + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SourceError>>();

        let stop = Arc::clone(&stop_signal);
        let thread = thread::spawn(move || {
            run_loop(acquire, listeners, stop, command_rx, ready_tx, tick_interval);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                thread: Some(thread),
                command_tx: Some(command_tx),
                stop_signal,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SourceError::ResourceAcquisitionFailed(
                    "render loop thread terminated during acquisition".to_string(),
                ))
            }
        }
    }

    /// Arm the loop. Idempotent: a loop that is already ticking ignores
    /// further Start commands.
    pub fn start(&self) {
        if let Some(tx) = &self.command_tx {
            let _ = tx.send(LoopCommand::Start);
        }
    }

    /// Halt the loop and join its thread.
    ///
    /// The grabber's `release` runs on the loop thread before the join
    /// completes, so the resource is fully released when this returns.
    /// Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(LoopCommand::Stop);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// A handle for requesting cancellation from listener context.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop_signal: Arc::clone(&self.stop_signal),
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<G, F>(
    acquire: F,
    listeners: Arc<Mutex<ListenerRegistry>>,
    stop: Arc<AtomicBool>,
    command_rx: Receiver<LoopCommand>,
    ready_tx: Sender<Result<(), SourceError>>,
    tick_interval: Duration,
) where
    G: FrameGrabber,
    F: FnOnce() -> Result<G, SourceError>,
{
    let mut grabber = match acquire() {
        Ok(grabber) => {
            let _ = ready_tx.send(Ok(()));
            grabber
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Idle: resource held, nothing delivered until a Start arrives.
    let mut state = LoopState::Idle;
    while state == LoopState::Idle {
        match command_rx.recv() {
            Ok(LoopCommand::Start) => {
                state = LoopState::Armed;
                log::debug!("render loop armed");
            }
            // Stopped before ever starting, or the controlling handle
            // went away: release and bail out.
            Ok(LoopCommand::Stop) | Err(_) => {
                grabber.release();
                return;
            }
        }
    }

    while !stop.load(Ordering::Relaxed) {
        match command_rx.try_recv() {
            Ok(LoopCommand::Stop) => break,
            // Start while already running must not duplicate the loop.
            Ok(LoopCommand::Start) | Err(_) => {}
        }

        let tick_began = Instant::now();
        if let Some(frame) = grabber.grab() {
            // A stop raised during the capture makes this tick a no-op.
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if state == LoopState::Armed {
                state = LoopState::Ticking;
                log::debug!("render loop ticking, first frame delivered");
            }
            if let Ok(mut registry) = listeners.lock() {
                registry.notify(&frame);
            }
        }

        // Yield until the next refresh tick.
        let elapsed = tick_began.elapsed();
        if elapsed < tick_interval {
            thread::sleep(tick_interval - elapsed);
        }
    }

    grabber.release();
    log::debug!("render loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Grabber producing a solid 2x2 white frame, counting releases.
    struct TestGrabber {
        released: Arc<AtomicBool>,
        grabs: Arc<AtomicUsize>,
    }

    impl FrameGrabber for TestGrabber {
        fn grab(&mut self) -> Option<PixelBuffer> {
            self.grabs.fetch_add(1, Ordering::SeqCst);
            Some(PixelBuffer::new(2, 2, vec![255; 16]))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn spawn_test_loop(
        listeners: Arc<Mutex<ListenerRegistry>>,
        released: Arc<AtomicBool>,
        grabs: Arc<AtomicUsize>,
    ) -> RenderLoop {
        RenderLoop::spawn(
            move || Ok(TestGrabber { released, grabs }),
            listeners,
            Duration::from_millis(5),
        )
        .expect("test grabber acquisition cannot fail")
    }

    #[test]
    fn test_idle_until_started() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let released = Arc::new(AtomicBool::new(false));
        let grabs = Arc::new(AtomicUsize::new(0));
        let mut render_loop =
            spawn_test_loop(listeners, Arc::clone(&released), Arc::clone(&grabs));

        thread::sleep(Duration::from_millis(30));
        assert_eq!(grabs.load(Ordering::SeqCst), 0, "no grabs before start");

        render_loop.stop();
        assert!(released.load(Ordering::SeqCst), "stop releases the grabber");
    }

    #[test]
    fn test_ticks_fan_out_to_listeners() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        listeners.lock().unwrap().add(Box::new(move |frame| {
            assert_eq!(frame.width, 2);
            hits_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let released = Arc::new(AtomicBool::new(false));
        let grabs = Arc::new(AtomicUsize::new(0));
        let mut render_loop = spawn_test_loop(
            Arc::clone(&listeners),
            Arc::clone(&released),
            Arc::clone(&grabs),
        );

        render_loop.start();
        thread::sleep(Duration::from_millis(50));
        render_loop.stop();

        assert!(hits.load(Ordering::SeqCst) > 0, "listeners saw frames");
        assert!(released.load(Ordering::SeqCst));

        // No further deliveries after stop, even though a tick may have
        // been in flight when the flag went up.
        let after_stop = hits.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_before_start_releases() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let released = Arc::new(AtomicBool::new(false));
        let grabs = Arc::new(AtomicUsize::new(0));
        let mut render_loop =
            spawn_test_loop(listeners, Arc::clone(&released), Arc::clone(&grabs));

        render_loop.stop();
        render_loop.stop(); // idempotent
        assert!(released.load(Ordering::SeqCst));
        assert_eq!(grabs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_handle_cancels_from_listener_context() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let released = Arc::new(AtomicBool::new(false));
        let grabs = Arc::new(AtomicUsize::new(0));
        let mut render_loop = spawn_test_loop(
            Arc::clone(&listeners),
            Arc::clone(&released),
            Arc::clone(&grabs),
        );

        let handle = render_loop.stop_handle();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        listeners.lock().unwrap().add(Box::new(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            // Re-entrant cancellation: the current tick completes, the
            // next one never starts.
            handle.request_stop();
        }));

        render_loop.start();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        render_loop.stop();
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_spawn_reports_acquisition_failure() {
        let listeners = Arc::new(Mutex::new(ListenerRegistry::new()));
        let result = RenderLoop::spawn(
            || -> Result<TestGrabber, SourceError> {
                Err(SourceError::ResourceAcquisitionFailed("no device".into()))
            },
            listeners,
            Duration::from_millis(5),
        );
        assert!(matches!(
            result,
            Err(SourceError::ResourceAcquisitionFailed(_))
        ));
    }
}
