//! Per-service-type behavioral hooks.
//!
//! `bring_up`, `bring_down`, `can_interrupt_start`, and `interrupt_start` are
//! the only operations the core calls on a service's type-specific behavior.
//! Everything else — forking/execing a process, socket activation, running a
//! script — is an external concern, deliberately out of scope here, that a
//! real `process`/`bgprocess`/`scripted` implementation would plug in here.
//! The `Internal` behavior is the only one fully specified by this crate, and
//! it always succeeds synchronously.

use crate::types::ServiceKind;

/// Outcome of asking a behavior to bring a service up.
pub enum BringUpResult {
    /// The service is already up, or came up synchronously; the engine should
    /// proceed as though `started()` had just been invoked.
    Started,
    /// Startup is continuing asynchronously; the caller (process monitor,
    /// socket-activation watcher, etc.) is responsible for eventually calling
    /// [`crate::service::ServiceRecord::started`] or
    /// [`crate::service::ServiceRecord::failed_to_start`].
    InProgress,
    /// Startup failed synchronously.
    Failed,
}

/// The capability surface the core engine calls on a service's type-specific
/// behavior. Implementations must not block: a synchronous `Failed`/`Started`
/// result is fine, but anything requiring real work should return
/// `InProgress` and drive the record's callbacks from the external reactor.
pub trait ServiceBehavior {
    /// Begin bringing the service up. Called once all dependency edges are
    /// satisfied and, if applicable, the console has been granted.
    fn bring_up(&mut self) -> BringUpResult {
        BringUpResult::Started
    }

    /// Begin bringing the service down. The default behavior completes
    /// immediately, matching `Internal` semantics where there is no external
    /// process to wait on.
    fn bring_down(&mut self) {}

    /// Whether an in-progress start can be cancelled and reverted to stopped
    /// without first reaching `Started`.
    fn can_interrupt_start(&self) -> bool {
        true
    }

    /// Perform the actual interruption of an in-progress start. Returns
    /// whether the interruption was accepted; if false, the stop is deferred
    /// until `started()` fires.
    fn interrupt_start(&mut self) -> bool {
        true
    }

    fn kind(&self) -> ServiceKind {
        ServiceKind::Internal
    }
}

/// The default, fully-specified service behavior: succeeds immediately on
/// both ends and never blocks a stop.
#[derive(Debug, Default, Clone, Copy)]
pub struct InternalBehavior;

impl ServiceBehavior for InternalBehavior {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Internal
    }
}
