//! Service dependency and state engine for a process-1-capable init / service
//! supervisor.
//!
//! The engine ([`set::ServiceSet`]) owns every registered [`service::ServiceRecord`],
//! the propagation/transition queues that drive them to a fixed point
//! (`ServiceSet::process_queues`), and a [`console::ConsoleArbiter`] for
//! exclusive console ownership. Everything a real daemon needs around it —
//! opening sockets, forking children, watching signals — is deliberately
//! external: see [`reactor`] and [`protocol`] for the seams.

pub mod behavior;
pub mod cli;
pub mod console;
pub mod edge;
pub mod error;
pub mod handle;
pub mod listener;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod reactor;
pub mod service;
pub mod set;
pub mod types;

pub use behavior::{BringUpResult, InternalBehavior, ServiceBehavior};
pub use console::ConsoleArbiter;
pub use edge::{DependencyEdge, DependentRef};
pub use error::{FatalReactorLoss, LoadError, ProtocolError, SocketError};
pub use handle::ServiceHandle;
pub use listener::{ListenerId, ServiceListener};
pub use loader::{DirectoryLoader, Loader};
pub use service::ServiceRecord;
pub use set::ServiceSet;
pub use types::{
    DepType, DesiredState, OnstartFlags, Pin, ServiceEvent, ServiceKind, ServiceState,
    ShutdownType,
};
