//! Core enums shared across the engine and the wire protocol.

/// The service's actual, observed lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Started,
    Stopping,
}

/// The state the engine is driving a service toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Stopped,
    Started,
}

/// Behavioral category of a service. Only `Internal` is fully specified by the
/// core engine; the others override `bring_up`/`bring_down`/interrupt hooks via
/// [`crate::behavior::ServiceBehavior`] but are otherwise out of scope (process
/// execution, socket activation, and script invocation are external concerns).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Internal,
    Process,
    BgProcess,
    Scripted,
}

/// Typed link between a dependent and its dependency.
///
/// See the dependency-type semantics table below for the
/// stop/failure/acquisition matrix each variant implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepType {
    Regular,
    WaitsFor,
    Soft,
    Milestone,
}

impl DepType {
    /// Whether the dependent is dragged down when this dependency stops.
    pub fn stops_dependent_on_dep_stop(self) -> bool {
        matches!(self, DepType::Regular)
    }

    /// Whether a startup failure on the dependency fails the dependent's startup.
    pub fn fails_dependent_on_startup_failure(self) -> bool {
        matches!(self, DepType::Regular | DepType::Milestone)
    }

    /// Whether the edge holds an acquisition (`required_by` contribution) past the
    /// point the dependency has started.
    pub fn holds_after_started(self) -> bool {
        matches!(self, DepType::Regular)
    }
}

/// Sticky override recorded on a service by an operator or by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    None,
    Started,
    Stopped,
}

/// Lifecycle events delivered synchronously to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceEvent {
    Started,
    Stopped,
    FailedStart,
    StartCancelled,
    StopCancelled,
}

/// A requested whole-system shutdown action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownType {
    Continue,
    Halt,
    Reboot,
    Poweroff,
}

/// Flags governing console ownership and readiness reporting for a service
/// controlling console acquisition and readiness reporting for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OnstartFlags {
    pub starts_on_console: bool,
    pub runs_on_console: bool,
    pub rw_ready: bool,
    pub log_ready: bool,
}
