//! Dependency edges between service records.

use crate::handle::ServiceHandle;
use crate::types::DepType;

/// A typed, directed link from a dependent service (`from`) to a dependency
/// (`to`). Edges are owned by the dependent's `depends_on` list; the
/// dependency's `dependents` list holds non-owning back-references to the
/// same logical edge via `(from, dep_type)` pairs, so an edge is never
/// represented by two independently-mutable copies.
#[derive(Debug, Clone, Copy)]
pub struct DependencyEdge {
    pub from: ServiceHandle,
    pub to: ServiceHandle,
    pub dep_type: DepType,
    /// During a startup, true while `to` has not yet reached `Started`.
    pub waiting_on: bool,
    /// True iff `from` currently contributes to `to.required_by` via this edge.
    pub holding_acq: bool,
}

impl DependencyEdge {
    pub fn new(from: ServiceHandle, to: ServiceHandle, dep_type: DepType) -> Self {
        DependencyEdge {
            from,
            to,
            dep_type,
            waiting_on: false,
            holding_acq: false,
        }
    }
}

/// A back-reference held by a dependency to one of its dependents. Carries
/// just enough to look the real edge back up on the dependent's side; it does
/// not own the edge and must never be mutated independently of it.
#[derive(Debug, Clone, Copy)]
pub struct DependentRef {
    pub from: ServiceHandle,
    pub dep_type: DepType,
}
