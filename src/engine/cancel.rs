//! Shared cancellation signal for an early, coordinated shutdown.

use std::convert::Infallible;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

/// Creates a connected handle/signal pair.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (trigger, signal) = bounded::<Infallible>(0);
    (CancelHandle { trigger }, CancelSignal { signal })
}

/// Raises the signal when cancelled or dropped.
#[derive(Debug)]
pub struct CancelHandle {
    // never sends, disconnecting is the signal
    trigger: Sender<Infallible>,
}

impl CancelHandle {
    pub fn cancel(self) {
        drop(self.trigger);
    }
}

/// Observing side of the cancellation, cloned into every pipeline thread.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    signal: Receiver<Infallible>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel becoming ready once the signal is raised, for use in `select!`.
    pub(crate) fn channel(&self) -> &Receiver<Infallible> {
        &self.signal
    }
}
