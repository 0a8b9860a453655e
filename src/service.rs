//! The service record: per-service state, flags, and edges.
//!
//! Individual services never call each other directly. A service only ever
//! references another by [`ServiceHandle`], and the algorithms that mutate
//! more than one record (start/stop propagation, `require`/`release`,
//! `failed_to_start`, ...) live as methods on [`crate::set::ServiceSet`],
//! which owns every record and can look either side of an edge up safely.
//! Records themselves only ever carry data plus handles, never references to
//! one another, so the set can hand out `&mut` access to one record while
//! another is mid-traversal.

use std::collections::VecDeque;

use crate::behavior::ServiceBehavior;
use crate::edge::{DependencyEdge, DependentRef};
use crate::handle::ServiceHandle;
use crate::listener::ListenerSet;
use crate::types::{DesiredState, OnstartFlags, Pin, ServiceState};

/// One named service and everything the engine needs to drive its lifecycle.
pub struct ServiceRecord {
    pub name: String,
    pub behavior: Box<dyn ServiceBehavior>,

    pub service_state: ServiceState,
    pub desired_state: DesiredState,

    pub depends_on: Vec<DependencyEdge>,
    pub dependents: Vec<DependentRef>,

    pub required_by: u32,
    pub start_explicit: bool,
    pub auto_restart: bool,
    pub restarting: bool,
    pub force_stop: bool,
    pub pin: Pin,
    pub waiting_for_deps: bool,

    pub prop_require: bool,
    pub prop_release: bool,
    pub prop_failure: bool,
    pub prop_start: bool,
    pub prop_stop: bool,

    pub onstart_flags: OnstartFlags,
    pub socket_path: Option<String>,
    pub socket_fd: Option<std::os::unix::io::RawFd>,

    pub listeners: ListenerSet,

    /// Whether this service currently counts toward the set's active count
    /// active (vs. inactive). Tracked here rather than recomputed so
    /// `ServiceSet::service_active`/`service_inactive` transitions are
    /// idempotent no matter how many call sites touch it.
    pub(crate) counted_active: bool,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, behavior: Box<dyn ServiceBehavior>) -> Self {
        ServiceRecord {
            name: name.into(),
            behavior,
            service_state: ServiceState::Stopped,
            desired_state: DesiredState::Stopped,
            depends_on: Vec::new(),
            dependents: Vec::new(),
            required_by: 0,
            start_explicit: false,
            auto_restart: false,
            restarting: false,
            force_stop: false,
            pin: Pin::None,
            waiting_for_deps: false,
            prop_require: false,
            prop_release: false,
            prop_failure: false,
            prop_start: false,
            prop_stop: false,
            onstart_flags: OnstartFlags::default(),
            socket_path: None,
            socket_fd: None,
            listeners: ListenerSet::new(),
            counted_active: false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.service_state == ServiceState::Stopped
    }

    pub fn pinned_started(&self) -> bool {
        self.pin == Pin::Started
    }

    pub fn pinned_stopped(&self) -> bool {
        self.pin == Pin::Stopped
    }

    /// The number of held incoming acquisitions plus the explicit-start
    /// credit. Exposed for property tests.
    pub fn expected_required_by(&self, holding_incoming: u32) -> u32 {
        holding_incoming + if self.start_explicit { 1 } else { 0 }
    }
}

/// The three FIFOs the set drains in `process_queues`. Kept as a
/// standalone struct so `ServiceSet` can borrow the queues independently of
/// the record table while draining them.
#[derive(Default)]
pub struct Queues {
    pub propagation: VecDeque<ServiceHandle>,
    pub transition: VecDeque<ServiceHandle>,
}

impl Queues {
    pub fn new() -> Self {
        Self::default()
    }
}
