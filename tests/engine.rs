//! End-to-end seed scenarios and the global invariants, driven
//! directly against the public `ServiceSet` API rather than through the wire
//! protocol (the protocol has its own focused tests in `src/protocol/*`).

use svinit::behavior::{BringUpResult, InternalBehavior, ServiceBehavior};
use svinit::{DepType, DesiredState, ServiceHandle, ServiceRecord, ServiceSet, ServiceState};

fn internal(name: &str) -> ServiceRecord {
    ServiceRecord::new(name, Box::new(InternalBehavior))
}

fn state(set: &ServiceSet, h: ServiceHandle) -> ServiceState {
    set.get(h).service_state
}

/// A behavior that never completes on its own; the test drives `started()`
/// by hand to simulate an external process monitor reporting readiness.
#[derive(Default)]
struct AsyncBehavior;

impl ServiceBehavior for AsyncBehavior {
    fn bring_up(&mut self) -> BringUpResult {
        BringUpResult::InProgress
    }
}

fn assert_invariants(set: &ServiceSet) {
    for (h, record) in set.list_services() {
        // holding_acq implies the acquisition is reflected in required_by.
        for edge in &record.depends_on {
            if edge.holding_acq {
                assert!(
                    set.get(edge.to).required_by > 0,
                    "{:?} holds an acquisition on {:?} with required_by == 0",
                    record.name,
                    set.get(edge.to).name
                );
            }
            // waiting_on implies the dependent is STARTING.
            if edge.waiting_on {
                assert_eq!(
                    record.service_state,
                    ServiceState::Starting,
                    "{:?} has waiting_on set while not STARTING",
                    record.name
                );
            }
        }

        // required_by == 0 && STOPPED implies not active.
        if record.required_by == 0 && record.service_state == ServiceState::Stopped {
            assert!(
                !record_is_active(set, h),
                "{:?} counted active with required_by == 0 and STOPPED",
                record.name
            );
        }

        // never STARTED + desired STOPPED unless pinned started.
        if record.service_state == ServiceState::Started
            && record.desired_state == DesiredState::Stopped
        {
            assert!(
                record.pinned_started(),
                "{:?} is STARTED with desired STOPPED but not pinned",
                record.name
            );
        }
    }
}

fn record_is_active(set: &ServiceSet, h: ServiceHandle) -> bool {
    // `counted_active` is crate-private; approximate the same condition here:
    // service_state != STOPPED or required_by > 0.
    let r = set.get(h);
    r.service_state != ServiceState::Stopped || r.required_by > 0
}

#[test]
fn scenario_1_chain_start_stop() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let s2 = set.add_service(internal("s2"));
    let s3 = set.add_service(internal("s3"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);

    set.start(s3, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_invariants(&set);

    set.stop(s3, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn scenario_2_multiple_dependents() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let s2 = set.add_service(internal("s2"));
    let s3 = set.add_service(internal("s3"));
    let s4 = set.add_service(internal("s4"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);
    set.add_dependency(s4, s2, DepType::Regular);

    set.start(s3, true);
    set.start(s4, true);
    set.process_queues();
    for h in [s1, s2, s3, s4] {
        assert_eq!(state(&set, h), ServiceState::Started);
    }

    set.stop(s3, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_eq!(state(&set, s4), ServiceState::Started);

    set.stop(s4, true);
    set.process_queues();
    for h in [s1, s2, s3, s4] {
        assert_eq!(state(&set, h), ServiceState::Stopped);
    }
    assert_invariants(&set);
}

#[test]
fn scenario_3_forced_dependency_stop_cascades() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let s2 = set.add_service(internal("s2"));
    let s3 = set.add_service(internal("s3"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);

    set.start(s3, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Started);
    }

    set.stop(s1, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Stopped);
    }
    assert_invariants(&set);
}

#[test]
fn scenario_4_auto_restart_with_restart_propagation() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let mut s2_record = internal("s2");
    s2_record.auto_restart = true;
    let s2 = set.add_service(s2_record);
    let s3 = set.add_service(internal("s3"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);

    set.start(s3, true);
    set.start(s2, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Started);
    }

    set.stop(s1, true);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn scenario_5_staged_startup_via_asynchronous_bring_up() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(ServiceRecord::new("s1", Box::new(AsyncBehavior)));
    let s2 = set.add_service(ServiceRecord::new("s2", Box::new(AsyncBehavior)));
    let s3 = set.add_service(ServiceRecord::new("s3", Box::new(AsyncBehavior)));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);

    set.start(s3, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Starting);
    }

    set.started(s1);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Starting);
    assert_eq!(state(&set, s3), ServiceState::Starting);

    set.started(s2);
    set.process_queues();
    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s3), ServiceState::Starting);

    set.started(s3);
    set.process_queues();
    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_invariants(&set);
}

#[test]
fn scenario_6_pinning() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let mut s2_record = internal("s2");
    s2_record.auto_restart = true;
    let s2 = set.add_service(s2_record);
    let s3 = set.add_service(internal("s3"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::Regular);

    set.pin_start(s3);
    set.start(s3, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Started);
    }

    set.forced_stop(s2);
    set.stop(s2, true);
    set.process_queues();
    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Stopping);
    assert_eq!(state(&set, s1), ServiceState::Started);

    set.unpin(s3);
    set.process_queues();
    assert_eq!(state(&set, s3), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn scenario_7_waits_for_isolation() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let s2 = set.add_service(internal("s2"));
    let s3 = set.add_service(internal("s3"));
    set.add_dependency(s2, s1, DepType::Regular);
    set.add_dependency(s3, s2, DepType::WaitsFor);

    set.start(s3, true);
    set.process_queues();
    for h in [s1, s2, s3] {
        assert_eq!(state(&set, h), ServiceState::Started);
    }

    set.stop(s1, true);
    set.process_queues();

    assert_eq!(state(&set, s3), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn scenario_8_milestone_success_detaches() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let s2 = set.add_service(internal("s2"));
    set.add_dependency(s2, s1, DepType::Milestone);

    set.start(s2, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(state(&set, s2), ServiceState::Started);

    set.stop(s1, true);
    set.process_queues();

    assert_eq!(state(&set, s2), ServiceState::Started);
    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn scenario_9_milestone_failure_at_startup_fails_dependent() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(ServiceRecord::new("s1", Box::new(AsyncBehavior)));
    let s2 = set.add_service(internal("s2"));
    set.add_dependency(s2, s1, DepType::Milestone);

    set.start(s2, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Starting);
    assert_eq!(state(&set, s2), ServiceState::Starting);

    set.failed_to_start(s1, false);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Stopped);
    assert_eq!(state(&set, s2), ServiceState::Stopped);
    assert_invariants(&set);
}

#[test]
fn property_5_round_trip_leaf_preserves_active_count() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    let before = set.count_active_services();

    set.start(s1, true);
    set.process_queues();
    set.stop(s1, true);
    set.process_queues();

    assert_eq!(set.count_active_services(), before);
    assert_invariants(&set);
}

#[test]
fn property_6_starting_an_already_started_service_is_idempotent() {
    let mut set = ServiceSet::new();
    let s1 = set.add_service(internal("s1"));
    set.start(s1, true);
    set.process_queues();
    assert_eq!(state(&set, s1), ServiceState::Started);

    let required_by_before = set.get(s1).required_by;
    set.start(s1, true);
    set.process_queues();

    assert_eq!(state(&set, s1), ServiceState::Started);
    assert_eq!(set.get(s1).required_by, required_by_before);
    assert_invariants(&set);
}
