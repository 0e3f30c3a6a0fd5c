//! Frame listener registry.

use std::panic::{self, AssertUnwindSafe};

use super::types::PixelBuffer;

/// Callback invoked with every produced frame while a source is playing.
///
/// The buffer is borrowed for the duration of the call; a listener that
/// wants pixels past this tick must copy them out.
pub type FrameListener = Box<dyn FnMut(&PixelBuffer) + Send + 'static>;

/// Handle identifying one registered listener.
///
/// Registering the same closure twice yields two distinct ids and two
/// deliveries per frame; there is no deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered set of frame listeners.
///
/// Insertion order is notification order. Registration is an amortized
/// O(1) push; removal compacts the vector.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    entries: Vec<(ListenerId, FrameListener)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its id.
    pub fn add(&mut self, listener: FrameListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove the listener with the given id, if still registered.
    pub fn remove(&mut self, id: ListenerId) {
        self.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    /// Drop all listeners.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deliver one frame to every listener, in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and logged,
    /// and the remaining listeners in this tick still run.
    pub fn notify(&mut self, frame: &PixelBuffer) {
        for (id, listener) in &mut self.entries {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(frame)));
            if outcome.is_err() {
                log::warn!("frame listener {:?} panicked; continuing fan-out", id);
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
