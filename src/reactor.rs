//! The event reactor interface the engine expects, consumed but not
//! implemented here.
//!
//! A PID-1 supervisor owns its own main loop — typically a raw `poll(2)`
//! over a signalfd and its control-socket listener — and that loop varies a
//! lot between deployments. This trait lets a real daemon plug in whatever
//! reactor it already runs (`mio`, `tokio`, a bespoke `poll` loop) rather
//! than being handed one.

use std::os::unix::io::RawFd;

/// Signals the engine needs delivered on the reactor's single thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Child,
    Interrupt,
    Terminate,
    Quit,
}

/// What a reactor implementation must provide: callback registration for
/// signal watches and file-descriptor readiness, and a way to run one
/// iteration of its underlying loop. The engine (`ServiceSet`) never calls
/// these directly — a PID-1 front end wires them together, injecting the
/// same service set the reactor drives.
pub trait EventReactor {
    /// Invoke `callback` whenever `signal` is pending.
    fn watch_signal(&mut self, signal: Signal, callback: Box<dyn FnMut()>);

    /// Invoke `callback` when `fd` becomes readable.
    fn watch_readable(&mut self, fd: RawFd, callback: Box<dyn FnMut()>);

    /// Stop watching a previously registered file descriptor.
    fn unwatch(&mut self, fd: RawFd);

    /// Block until at least one watched event fires, then run its callbacks.
    /// Returns `false` if the reactor itself has been lost (a fatal condition): the
    /// caller should treat this as unrecoverable.
    fn run_once(&mut self) -> bool;
}
