//! The service set: registry, propagation/transition/console queues, and the
//! cooperative scheduler `process_queues()`.
//!
//! Every cross-service algorithm is implemented here rather than on
//! `ServiceRecord` directly, because a record only ever knows its neighbors
//! by [`ServiceHandle`] — only the owning set can safely borrow both sides of
//! an edge. Each method below is named after its `service_record::` original
//! counterpart (`start`, `do_stop`, ...).

use std::collections::HashMap;

use slab::Slab;

use crate::behavior::BringUpResult;
use crate::console::ConsoleArbiter;
use crate::edge::{DependencyEdge, DependentRef};
use crate::error::LoadError;
use crate::handle::ServiceHandle;
use crate::loader::Loader;
use crate::service::{Queues, ServiceRecord};
use crate::types::{DepType, DesiredState, Pin, ServiceEvent, ServiceState, ShutdownType};

/// Owner of every service record and the queues that drive them to a fixed
/// point. Not a singleton: callers inject one.
pub struct ServiceSet {
    records: Slab<ServiceRecord>,
    by_name: HashMap<String, ServiceHandle>,
    queues: Queues,
    console: ConsoleArbiter,
    active_services: u32,
    auto_restart: bool,
    shutdown_type: ShutdownType,
    loader: Option<Box<dyn Loader>>,
}

impl ServiceSet {
    pub fn new() -> Self {
        ServiceSet {
            records: Slab::new(),
            by_name: HashMap::new(),
            queues: Queues::new(),
            console: ConsoleArbiter::new(),
            active_services: 0,
            auto_restart: true,
            shutdown_type: ShutdownType::Continue,
            loader: None,
        }
    }

    pub fn with_loader(loader: Box<dyn Loader>) -> Self {
        let mut set = Self::new();
        set.loader = Some(loader);
        set
    }

    // ---- registry ----------------------------------------------------

    /// Register `record`, returning its handle. Panics if the name is
    /// already registered; service names are unique, and callers are
    /// expected to `find_service` first.
    pub fn add_service(&mut self, record: ServiceRecord) -> ServiceHandle {
        assert!(
            !self.by_name.contains_key(&record.name),
            "service {:?} is already registered",
            record.name
        );
        let name = record.name.clone();
        let handle = ServiceHandle::from(self.records.insert(record));
        self.by_name.insert(name, handle);
        handle
    }

    pub fn find_service(&self, name: &str) -> Option<ServiceHandle> {
        self.by_name.get(name).copied()
    }

    /// Look the service up; if absent, delegate to the configured loader and
    /// register what it returns.
    pub fn load_service(&mut self, name: &str) -> Result<ServiceHandle, LoadError> {
        if let Some(h) = self.find_service(name) {
            return Ok(h);
        }
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        let record = loader.load(name)?;
        Ok(self.add_service(record))
    }

    pub fn get(&self, h: ServiceHandle) -> &ServiceRecord {
        &self.records[h.index()]
    }

    pub fn get_mut(&mut self, h: ServiceHandle) -> &mut ServiceRecord {
        &mut self.records[h.index()]
    }

    pub fn try_get(&self, h: ServiceHandle) -> Option<&ServiceRecord> {
        self.records.get(h.index())
    }

    /// Snapshot of every registered service, for external listeners / the
    /// LISTSERVICES reply.
    pub fn list_services(&self) -> Vec<(ServiceHandle, &ServiceRecord)> {
        self.records
            .iter()
            .map(|(i, r)| (ServiceHandle::from(i), r))
            .collect()
    }

    pub fn count_active_services(&self) -> u32 {
        self.active_services
    }

    pub fn get_auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn set_auto_restart(&mut self, enabled: bool) {
        self.auto_restart = enabled;
    }

    pub fn shutdown_type(&self) -> ShutdownType {
        self.shutdown_type
    }

    /// Add a REGULAR/WAITS_FOR/SOFT/MILESTONE edge from `from` to `to`.
    pub fn add_dependency(&mut self, from: ServiceHandle, to: ServiceHandle, dep_type: DepType) {
        self.records[from.index()]
            .depends_on
            .push(DependencyEdge::new(from, to, dep_type));
        self.records[to.index()]
            .dependents
            .push(DependentRef { from, dep_type });
    }

    // ---- convenience wrappers ----------------------------------------

    pub fn start_service(&mut self, name: &str) -> Result<(), LoadError> {
        let h = self.load_service(name)?;
        self.start(h, true);
        self.process_queues();
        Ok(())
    }

    pub fn stop_service(&mut self, name: &str) -> Result<(), LoadError> {
        let h = self.find_service(name).ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        self.stop(h, true);
        self.process_queues();
        Ok(())
    }

    /// Record a shutdown type and request every registered service to stop.
    pub fn stop_all_services(&mut self, shutdown_type: ShutdownType) {
        self.shutdown_type = shutdown_type;
        let handles: Vec<ServiceHandle> = self.records.iter().map(|(i, _)| ServiceHandle::from(i)).collect();
        for h in handles {
            self.stop(h, true);
        }
        self.process_queues();
    }

    // ---- active-count bookkeeping ------------------------------------------

    fn service_active(&mut self, h: ServiceHandle) {
        if !self.records[h.index()].counted_active {
            self.records[h.index()].counted_active = true;
            self.active_services += 1;
        }
    }

    fn service_inactive(&mut self, h: ServiceHandle) {
        if self.records[h.index()].counted_active {
            self.records[h.index()].counted_active = false;
            self.active_services -= 1;
        }
    }

    // ---- the scheduler ---------------------------------------------------

    fn add_prop_queue(&mut self, h: ServiceHandle) {
        self.queues.propagation.push_back(h);
    }

    fn add_transition_queue(&mut self, h: ServiceHandle) {
        self.queues.transition.push_back(h);
    }

    /// Drain the propagation queue, then the transition queue, repeating
    /// until both are empty in the same pass. Methods called from here may
    /// re-enqueue work; the loop keeps going until a pass does nothing.
    pub fn process_queues(&mut self) {
        loop {
            let mut did_work = false;

            while let Some(h) = self.queues.propagation.pop_front() {
                did_work = true;
                self.do_propagation(h);
            }

            if let Some(h) = self.queues.transition.pop_front() {
                did_work = true;
                self.execute_transition(h);
            }

            if !did_work {
                break;
            }
        }
    }

    /// Apply pending propagation flags in a fixed order: require, release,
    /// failure, start, stop. Any other order can leave `required_by` out of
    /// sync with the held acquisitions (a release must see a prior require
    /// reflected before it runs).
    fn do_propagation(&mut self, h: ServiceHandle) {
        if self.records[h.index()].prop_require {
            self.records[h.index()].prop_require = false;
            let deps: Vec<ServiceHandle> = self.records[h.index()]
                .depends_on
                .iter()
                .map(|e| e.to)
                .collect();
            for to in deps {
                self.require(to);
            }
            for edge in self.records[h.index()].depends_on.iter_mut() {
                edge.holding_acq = true;
            }
        }

        if self.records[h.index()].prop_release {
            self.records[h.index()].prop_release = false;
            self.release_dependencies(h);
        }

        if self.records[h.index()].prop_failure {
            self.records[h.index()].prop_failure = false;
            self.failed_to_start(h, true);
        }

        if self.records[h.index()].prop_start {
            self.records[h.index()].prop_start = false;
            self.start(h, false);
        }

        if self.records[h.index()].prop_stop {
            self.records[h.index()].prop_stop = false;
            self.do_stop(h);
        }
    }

    /// Dispatch a dequeued transition: for a starting/smooth-recovering
    /// service whose edges are all satisfied, proceed with startup; for a
    /// stopping service whose regular dependents have all stopped, bring it
    /// down.
    fn execute_transition(&mut self, h: ServiceHandle) {
        let state = self.records[h.index()].service_state;
        let restarting = self.records[h.index()].restarting;

        if state == ServiceState::Starting || (state == ServiceState::Started && restarting) {
            if self.check_deps_started(h) {
                let have_console =
                    state == ServiceState::Started && self.records[h.index()].onstart_flags.runs_on_console;
                self.all_deps_started(h, have_console);
            }
        } else if state == ServiceState::Stopping && self.stop_check_dependents(h) {
            self.bring_down(h);
        }
    }

    // ---- requirement counting ---------------------------------------------

    fn require(&mut self, h: ServiceHandle) {
        let r = &mut self.records[h.index()];
        r.required_by += 1;
        if r.required_by == 1 {
            r.prop_require = !r.prop_release;
            r.prop_release = false;
            self.add_prop_queue(h);
        }
    }

    fn release(&mut self, h: ServiceHandle) {
        let r = &mut self.records[h.index()];
        r.required_by -= 1;
        if r.required_by == 0 {
            r.desired_state = DesiredState::Stopped;
            r.prop_release = !r.prop_require;
            r.prop_require = false;
            self.add_prop_queue(h);

            if self.records[h.index()].service_state == ServiceState::Stopped {
                self.service_inactive(h);
            } else {
                self.do_stop(h);
            }
        }
    }

    fn release_dependencies(&mut self, h: ServiceHandle) {
        let holding: Vec<ServiceHandle> = self.records[h.index()]
            .depends_on
            .iter()
            .filter(|e| e.holding_acq)
            .map(|e| e.to)
            .collect();
        for to in holding {
            self.release(to);
        }
        for edge in self.records[h.index()].depends_on.iter_mut() {
            edge.holding_acq = false;
        }
    }

    // ---- startup ------------------------------------------------------------

    /// `service_record::start`.
    pub fn start(&mut self, h: ServiceHandle, activate: bool) {
        if activate && !self.records[h.index()].start_explicit {
            self.require(h);
            self.records[h.index()].start_explicit = true;
        }

        let r = &self.records[h.index()];
        if r.desired_state == DesiredState::Started && r.service_state != ServiceState::Stopped {
            return;
        }

        let was_active =
            r.service_state != ServiceState::Stopped || r.desired_state != DesiredState::Stopped;
        self.records[h.index()].desired_state = DesiredState::Started;

        let state = self.records[h.index()].service_state;
        if state != ServiceState::Stopped {
            if state != ServiceState::Stopping || !self.can_interrupt_stop(h) {
                return;
            }
            self.notify(h, ServiceEvent::StopCancelled);
        } else if !was_active {
            self.service_active(h);
        }

        self.records[h.index()].service_state = ServiceState::Starting;
        self.records[h.index()].waiting_for_deps = true;

        if self.start_check_dependencies(h) {
            self.add_transition_queue(h);
        }
    }

    /// A STOPPING service can always be reverted to STARTING in this engine;
    /// only `pinned_stopped` blocks re-entering STARTING.
    fn can_interrupt_stop(&self, h: ServiceHandle) -> bool {
        !self.records[h.index()].pinned_stopped()
    }

    fn start_check_dependencies(&mut self, h: ServiceHandle) -> bool {
        let deps: Vec<(usize, ServiceHandle, ServiceState)> = self.records[h.index()]
            .depends_on
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e.to, self.records[e.to.index()].service_state))
            .collect();

        let mut all_started = true;
        for (i, to, to_state) in deps {
            if to_state != ServiceState::Started {
                if to_state != ServiceState::Starting {
                    self.records[to.index()].prop_start = true;
                    self.add_prop_queue(to);
                }
                self.records[h.index()].depends_on[i].waiting_on = true;
                all_started = false;
            }
        }
        all_started
    }

    fn check_deps_started(&self, h: ServiceHandle) -> bool {
        self.records[h.index()]
            .depends_on
            .iter()
            .all(|e| !e.waiting_on)
    }

    /// Called when a dependency reaches STARTED; re-checks whether `h` can
    /// proceed.
    fn dependency_started(&mut self, h: ServiceHandle) {
        let r = &self.records[h.index()];
        if (r.service_state == ServiceState::Starting || r.service_state == ServiceState::Started)
            && r.waiting_for_deps
        {
            self.add_transition_queue(h);
        }
    }

    /// Activation socket setup (`socket_path`/`socket_fd`). Real socket
    /// binding is out of scope for this engine (process-type service
    /// execution lives outside it); a declared socket is acknowledged but not
    /// opened.
    fn open_socket(&mut self, h: ServiceHandle) -> bool {
        let r = &self.records[h.index()];
        if r.socket_path.is_none() || r.socket_fd.is_some() {
            return true;
        }
        log::debug!(
            "service {:?} declares an activation socket; binding it is outside this engine's scope",
            r.name
        );
        true
    }

    fn all_deps_started(&mut self, h: ServiceHandle, has_console: bool) {
        if self.records[h.index()].onstart_flags.starts_on_console && !has_console {
            self.records[h.index()].waiting_for_deps = true;
            if self.console.enqueue(h) {
                // Nobody held the console, so `h` was granted it immediately;
                // proceed exactly as the release-driven grant path would.
                self.acquired_console(h);
            }
            return;
        }

        self.records[h.index()].waiting_for_deps = false;

        if !self.open_socket(h) {
            self.failed_to_start(h, false);
            return;
        }

        let result = self.records[h.index()].behavior.bring_up();
        match result {
            BringUpResult::Started => self.started(h),
            BringUpResult::InProgress => {}
            BringUpResult::Failed => self.failed_to_start(h, false),
        }
    }

    /// Called by the console arbiter's grant path.
    fn acquired_console(&mut self, h: ServiceHandle) {
        if self.records[h.index()].service_state != ServiceState::Starting {
            self.release_console(h);
        } else if self.check_deps_started(h) {
            self.all_deps_started(h, true);
        } else {
            self.release_console(h);
        }
    }

    fn release_console(&mut self, h: ServiceHandle) {
        if let Some(next) = self.console.release(h) {
            self.acquired_console(next);
        }
    }

    /// `service_record::started`.
    pub fn started(&mut self, h: ServiceHandle) {
        let starts_on_console = self.records[h.index()].onstart_flags.starts_on_console;
        let runs_on_console = self.records[h.index()].onstart_flags.runs_on_console;
        if starts_on_console && !runs_on_console {
            self.release_console(h);
        }

        self.records[h.index()].service_state = ServiceState::Started;
        self.notify(h, ServiceEvent::Started);

        let r = &self.records[h.index()];
        if r.force_stop || r.desired_state == DesiredState::Stopped {
            self.do_stop(h);
            return;
        }

        let dependents: Vec<ServiceHandle> = self.records[h.index()].dependents.iter().map(|d| d.from).collect();
        for dependent in dependents {
            self.dependency_started(dependent);
            if let Some(idx) = self.records[dependent.index()]
                .depends_on
                .iter()
                .position(|e| e.to == h)
            {
                self.records[dependent.index()].depends_on[idx].waiting_on = false;
            }
        }
    }

    /// `service_record::failed_to_start`.
    pub fn failed_to_start(&mut self, h: ServiceHandle, depfailed: bool) {
        let starts_on_console = self.records[h.index()].onstart_flags.starts_on_console;
        if !depfailed && starts_on_console {
            self.release_console(h);
        }

        self.records[h.index()].service_state = ServiceState::Stopped;
        if self.records[h.index()].start_explicit {
            self.records[h.index()].start_explicit = false;
            self.release(h);
        }
        self.notify(h, ServiceEvent::FailedStart);

        let dependents: Vec<DependentRef> = self.records[h.index()].dependents.to_vec();
        for dept in dependents {
            if dept.dep_type.fails_dependent_on_startup_failure() {
                if self.records[dept.from.index()].service_state == ServiceState::Starting {
                    self.records[dept.from.index()].prop_failure = true;
                    self.add_prop_queue(dept.from);
                }
            } else if let Some(idx) = self.records[dept.from.index()]
                .depends_on
                .iter()
                .position(|e| e.to == h)
            {
                let (waiting_on, holding_acq) = {
                    let edge = &self.records[dept.from.index()].depends_on[idx];
                    (edge.waiting_on, edge.holding_acq)
                };
                if waiting_on {
                    self.records[dept.from.index()].depends_on[idx].waiting_on = false;
                    self.dependency_started(dept.from);
                }
                if holding_acq {
                    self.records[dept.from.index()].depends_on[idx].holding_acq = false;
                    self.release(h);
                }
            }
        }
    }

    // ---- shutdown -------------------------------------------------------------

    fn do_auto_restart(&self, h: ServiceHandle) -> bool {
        self.records[h.index()].auto_restart && self.auto_restart
    }

    /// `service_record::forced_stop`.
    pub fn forced_stop(&mut self, h: ServiceHandle) {
        if self.records[h.index()].service_state != ServiceState::Stopped {
            self.records[h.index()].force_stop = true;
            self.add_transition_queue(h);
        }
    }

    fn dependent_stopped(&mut self, h: ServiceHandle) {
        let r = &self.records[h.index()];
        if r.service_state == ServiceState::Stopping && r.waiting_for_deps {
            self.add_transition_queue(h);
        }
    }

    /// `service_record::stop`.
    pub fn stop(&mut self, h: ServiceHandle, bring_down: bool) {
        if self.records[h.index()].start_explicit {
            self.records[h.index()].start_explicit = false;
            self.release(h);
        }
        if bring_down {
            self.do_stop(h);
        }
    }

    /// `service_record::do_stop`.
    fn do_stop(&mut self, h: ServiceHandle) {
        if self.records[h.index()].pinned_started() {
            return;
        }

        if self.records[h.index()].start_explicit && !self.do_auto_restart(h) {
            self.records[h.index()].start_explicit = false;
            self.release(h);
            if self.records[h.index()].required_by == 0 {
                return;
            }
        }

        let all_deps_stopped = self.stop_dependents(h);

        let state = self.records[h.index()].service_state;
        if state != ServiceState::Started {
            if state == ServiceState::Starting {
                let waiting_for_deps = self.records[h.index()].waiting_for_deps;
                if !waiting_for_deps {
                    if !self.records[h.index()].behavior.can_interrupt_start() {
                        return;
                    }
                    let interrupted = self.records[h.index()].behavior.interrupt_start();
                    self.console.unqueue(h);
                    if !interrupted {
                        return;
                    }
                }
                self.notify(h, ServiceEvent::StartCancelled);
            } else {
                return;
            }
        }

        self.records[h.index()].service_state = ServiceState::Stopping;
        self.records[h.index()].waiting_for_deps = true;
        if all_deps_stopped {
            self.add_transition_queue(h);
        }
    }

    fn stop_check_dependents(&self, h: ServiceHandle) -> bool {
        self.records[h.index()].dependents.iter().all(|dept| {
            !dept.dep_type.stops_dependent_on_dep_stop() || self.records[dept.from.index()].is_stopped()
        })
    }

    fn stop_dependents(&mut self, h: ServiceHandle) -> bool {
        let dependents: Vec<DependentRef> = self.records[h.index()].dependents.to_vec();
        let force_stop = self.records[h.index()].force_stop;

        let mut all_stopped = true;
        for dept in dependents {
            if !dept.dep_type.stops_dependent_on_dep_stop() {
                continue;
            }
            if !self.records[dept.from.index()].is_stopped() {
                all_stopped = false;
            }
            if force_stop {
                self.forced_stop(dept.from);
            }
            self.records[dept.from.index()].prop_stop = true;
            self.add_prop_queue(dept.from);
        }
        all_stopped
    }

    /// `service_record::bring_down`: all regular dependents have stopped.
    fn bring_down(&mut self, h: ServiceHandle) {
        self.records[h.index()].waiting_for_deps = false;
        self.records[h.index()].behavior.bring_down();
        self.stopped(h);
    }

    /// `service_record::stopped`.
    fn stopped(&mut self, h: ServiceHandle) {
        if self.records[h.index()].onstart_flags.runs_on_console {
            self.release_console(h);
        }

        self.records[h.index()].force_stop = false;

        let dependents: Vec<DependentRef> = self.records[h.index()].dependents.to_vec();
        for dept in &dependents {
            if !dept.dep_type.holds_after_started() {
                if let Some(idx) = self.records[dept.from.index()]
                    .depends_on
                    .iter()
                    .position(|e| e.to == h)
                {
                    let holding = self.records[dept.from.index()].depends_on[idx].holding_acq;
                    if holding {
                        self.records[dept.from.index()].depends_on[idx].holding_acq = false;
                        self.release(h);
                    }
                }
            }
        }

        let will_restart =
            self.records[h.index()].desired_state == DesiredState::Started && self.auto_restart;

        let depends_on: Vec<ServiceHandle> =
            self.records[h.index()].depends_on.iter().map(|e| e.to).collect();
        for to in depends_on {
            self.dependent_stopped(to);
        }

        self.records[h.index()].service_state = ServiceState::Stopped;

        if will_restart {
            self.records[h.index()].restarting = false;
            self.start(h, false);
        } else {
            self.records[h.index()].socket_fd = None;
            if self.records[h.index()].start_explicit {
                self.records[h.index()].start_explicit = false;
                self.release(h);
            } else if self.records[h.index()].required_by == 0 {
                self.service_inactive(h);
            }
        }

        self.notify(h, ServiceEvent::Stopped);
    }

    // ---- pinning --------------------------------------------------------------

    pub fn pin_start(&mut self, h: ServiceHandle) {
        self.records[h.index()].pin = Pin::Started;
    }

    pub fn pin_stop(&mut self, h: ServiceHandle) {
        self.records[h.index()].pin = Pin::Stopped;
    }

    /// `service_record::unpin`.
    pub fn unpin(&mut self, h: ServiceHandle) {
        match self.records[h.index()].pin {
            Pin::Started => {
                self.records[h.index()].pin = Pin::None;
                let r = &self.records[h.index()];
                if r.desired_state == DesiredState::Stopped || r.force_stop {
                    self.do_stop(h);
                    self.process_queues();
                }
            }
            Pin::Stopped => {
                self.records[h.index()].pin = Pin::None;
                if self.records[h.index()].desired_state == DesiredState::Started {
                    self.start(h, false);
                    self.process_queues();
                }
            }
            Pin::None => {}
        }
    }

    fn notify(&mut self, h: ServiceHandle, event: ServiceEvent) {
        self.records[h.index()].listeners.notify_all(h, event);
    }
}

impl Default for ServiceSet {
    fn default() -> Self {
        Self::new()
    }
}

