//! Connection-local state for the control protocol: a handle table mapping
//! the small integers handed out to a control client back to
//! [`ServiceHandle`]s, plus the bad-connection latch.
//!
//! One `ConnectionState` per accepted connection, holding only what that
//! connection needs. The handle table is a `slab::Slab` so handle reuse
//! directly follows the "smallest non-negative integer not currently in
//! use" allocation rule rather than needing a hand-rolled free list.

use crate::error::ProtocolError;
use crate::handle::{HandleTable, ServiceHandle};
use crate::protocol::request::Request;
use crate::protocol::response::{state_byte, Response};
use crate::protocol::MAX_PACKET_SIZE;
use crate::set::ServiceSet;
use crate::types::{DesiredState, Pin};

/// Protocol version advertised in reply to QUERYVERSION. There is one wire
/// format, so min and max are equal.
const CP_VERSION: u16 = 1;

/// Per-connection state: the client's view of which service handles it has
/// obtained, and whether this connection has been latched closed after a bad
/// request.
pub struct ConnectionState {
    handles: HandleTable<ServiceHandle>,
    bad: bool,
}

impl ConnectionState {
    pub fn new() -> Self {
        ConnectionState {
            handles: HandleTable::new(),
            bad: false,
        }
    }

    pub fn is_bad(&self) -> bool {
        self.bad
    }

    fn allocate(&mut self, h: ServiceHandle) -> u32 {
        self.handles.insert(h) as u32
    }

    fn resolve(&self, conn_handle: u32) -> Result<ServiceHandle, ProtocolError> {
        self.handles
            .get(conn_handle as usize)
            .copied()
            .ok_or(ProtocolError::UnknownHandle(conn_handle))
    }

    /// Consume one already-length-delimited packet and produce the reply
    /// bytes, driving `set` as a side effect. Once a connection goes bad this
    /// always returns a single BADREQ byte; the caller is expected to close
    /// the connection after writing it.
    pub fn handle_packet(&mut self, set: &mut ServiceSet, bytes: &[u8]) -> Vec<u8> {
        if self.bad {
            return Response::BadReq.encode();
        }

        if bytes.len() > MAX_PACKET_SIZE {
            self.bad = true;
            return Response::BadReq.encode();
        }

        let request = match Request::decode(bytes) {
            Ok(req) => req,
            Err(_) => {
                self.bad = true;
                return Response::BadReq.encode();
            }
        };

        self.dispatch(set, request).encode()
    }

    fn dispatch(&mut self, set: &mut ServiceSet, request: Request) -> Response {
        match request {
            Request::QueryVersion => Response::CpVersion {
                min: CP_VERSION,
                max: CP_VERSION,
            },
            Request::FindService(name) => match set.find_service(&name) {
                Some(h) => self.service_record_reply(set, h),
                None => Response::NoService,
            },
            Request::LoadService(name) => match set.load_service(&name) {
                Ok(h) => self.service_record_reply(set, h),
                Err(_) => Response::NoService,
            },
            Request::Start { pin, handle } => self.start_stop_like(set, handle, pin),
            Request::Stop { pin, handle } => self.stop_forced(set, handle, pin),
            Request::Wake { pin, handle } => self.wake(set, handle, pin),
            Request::Release { pin, handle } => self.release(set, handle, pin),
            Request::Unpin { handle } => match self.resolve(handle) {
                Ok(h) => {
                    set.unpin(h);
                    Response::Ack
                }
                Err(_) => Response::BadReq,
            },
            Request::Shutdown(shutdown_type) => {
                set.stop_all_services(shutdown_type);
                Response::Ack
            }
            Request::ListServices => {
                // Handled by `list_services_replies`, not a single `Response`:
                // the wire reply is a run of SVCINFO records then LISTDONE.
                // Callers that need the list use that entry point directly;
                // dispatch to a single reply here only so `Request` stays one
                // enum.
                Response::ListDone
            }
        }
    }

    fn service_record_reply(&mut self, set: &ServiceSet, h: ServiceHandle) -> Response {
        let record = set.get(h);
        Response::ServiceRecord {
            state: state_byte(record.service_state),
            handle: self.allocate(h),
            target_state: match record.desired_state {
                DesiredState::Started => 1,
                DesiredState::Stopped => 0,
            },
        }
    }

    /// START: pin (if requested), then activate and let the queues drain
    /// before reporting whether the service ended up already at the target
    /// state or had to transition there.
    fn start_stop_like(&mut self, set: &mut ServiceSet, handle: u32, pin: bool) -> Response {
        let h = match self.resolve(handle) {
            Ok(h) => h,
            Err(_) => return Response::BadReq,
        };

        if pin {
            set.pin_start(h);
        }
        set.start(h, true);
        set.process_queues();

        let already = set.get(h).service_state == crate::types::ServiceState::Started
            && set.get(h).desired_state == DesiredState::Started;
        if already {
            Response::AlreadySS
        } else {
            Response::Ack
        }
    }

    /// STOP always forces the stop: `forced_stop` keeps a pending auto-restart
    /// from reversing it before the queues finish draining.
    fn stop_forced(&mut self, set: &mut ServiceSet, handle: u32, pin: bool) -> Response {
        let h = match self.resolve(handle) {
            Ok(h) => h,
            Err(_) => return Response::BadReq,
        };

        if pin {
            set.pin_stop(h);
        }
        set.stop(h, true);
        set.forced_stop(h);
        set.process_queues();

        let already = set.get(h).service_state == crate::types::ServiceState::Stopped
            && set.get(h).desired_state == DesiredState::Stopped;
        if already {
            Response::AlreadySS
        } else {
            Response::Ack
        }
    }

    /// WAKE re-starts a stopped service without marking it as explicitly
    /// required, unlike START.
    fn wake(&mut self, set: &mut ServiceSet, handle: u32, pin: bool) -> Response {
        let h = match self.resolve(handle) {
            Ok(h) => h,
            Err(_) => return Response::BadReq,
        };

        if pin {
            set.pin_start(h);
        }
        set.start(h, false);
        set.process_queues();

        let already = set.get(h).service_state == crate::types::ServiceState::Started
            && set.get(h).desired_state == DesiredState::Started;
        if already {
            Response::AlreadySS
        } else {
            Response::Ack
        }
    }

    /// RELEASE drops the explicit-start credit; pinning here locks the
    /// service stopped, not started, since release is asking it to go idle.
    fn release(&mut self, set: &mut ServiceSet, handle: u32, pin: bool) -> Response {
        let h = match self.resolve(handle) {
            Ok(h) => h,
            Err(_) => return Response::BadReq,
        };
        if pin && set.get(h).pin == Pin::None {
            set.pin_stop(h);
        }
        set.stop(h, false);
        set.process_queues();
        Response::Ack
    }

    /// LISTSERVICES is the one request whose reply is a run of records rather
    /// than a single `Response`; exposed separately so the transport can
    /// stream each record as it is encoded instead of buffering the whole
    /// reply.
    pub fn list_services_replies(&self, set: &ServiceSet) -> Vec<Response> {
        let mut out: Vec<Response> = set
            .list_services()
            .into_iter()
            .map(|(_, record)| Response::SvcInfo {
                name: record.name.clone(),
                state: state_byte(record.service_state),
                target: match record.desired_state {
                    DesiredState::Started => 1,
                    DesiredState::Stopped => 0,
                },
            })
            .collect();
        out.push(Response::ListDone);
        out
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::InternalBehavior;
    use crate::service::ServiceRecord;

    fn set_with_boot() -> ServiceSet {
        let mut set = ServiceSet::new();
        set.add_service(ServiceRecord::new("boot", Box::new(InternalBehavior)));
        set
    }

    #[test]
    fn query_version_reports_matching_min_and_max() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();
        let reply = conn.handle_packet(&mut set, &Request::QueryVersion.encode());
        assert_eq!(reply[0], super::super::response::ResponseHeader::CpVersion as u8);
    }

    #[test]
    fn find_service_then_start_round_trips_through_the_handle_table() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();

        let find_reply = conn.handle_packet(&mut set, &Request::FindService("boot".into()).encode());
        assert_eq!(find_reply[0], super::super::response::ResponseHeader::ServiceRecord as u8);
        let handle = u32::from_le_bytes([find_reply[2], find_reply[3], find_reply[4], find_reply[5]]);

        let start_reply = conn.handle_packet(
            &mut set,
            &Request::Start { pin: false, handle }.encode(),
        );
        assert_eq!(start_reply[0], super::super::response::ResponseHeader::Ack as u8);
        assert_eq!(set.find_service("boot").map(|h| set.get(h).service_state), Some(crate::types::ServiceState::Started));
    }

    #[test]
    fn unknown_handle_is_bad_request_not_a_panic() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();
        let reply = conn.handle_packet(&mut set, &Request::Unpin { handle: 99 }.encode());
        assert_eq!(reply[0], super::super::response::ResponseHeader::BadReq as u8);
    }

    #[test]
    fn oversized_packet_latches_the_connection_bad() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();
        let huge = vec![0u8; MAX_PACKET_SIZE + 1];
        let reply = conn.handle_packet(&mut set, &huge);
        assert_eq!(reply[0], super::super::response::ResponseHeader::BadReq as u8);
        assert!(conn.is_bad());

        let next = conn.handle_packet(&mut set, &Request::QueryVersion.encode());
        assert_eq!(next[0], super::super::response::ResponseHeader::BadReq as u8);
    }

    #[test]
    fn find_missing_service_reports_no_service() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();
        let reply = conn.handle_packet(&mut set, &Request::FindService("ghost".into()).encode());
        assert_eq!(reply[0], super::super::response::ResponseHeader::NoService as u8);
    }

    #[test]
    fn wake_starts_a_stopped_service_without_crediting_required_by() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();

        let find_reply = conn.handle_packet(&mut set, &Request::FindService("boot".into()).encode());
        let handle = u32::from_le_bytes([find_reply[2], find_reply[3], find_reply[4], find_reply[5]]);

        let wake_reply = conn.handle_packet(&mut set, &Request::Wake { pin: false, handle }.encode());
        assert_eq!(wake_reply[0], super::super::response::ResponseHeader::Ack as u8);

        let h = set.find_service("boot").unwrap();
        assert_eq!(set.get(h).service_state, crate::types::ServiceState::Started);
        assert!(!set.get(h).start_explicit);
        assert_eq!(set.get(h).required_by, 0);
    }

    #[test]
    fn release_pins_the_service_stopped_not_started() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();

        let find_reply = conn.handle_packet(&mut set, &Request::FindService("boot".into()).encode());
        let handle = u32::from_le_bytes([find_reply[2], find_reply[3], find_reply[4], find_reply[5]]);

        conn.handle_packet(&mut set, &Request::Start { pin: false, handle }.encode());
        let release_reply = conn.handle_packet(&mut set, &Request::Release { pin: true, handle }.encode());
        assert_eq!(release_reply[0], super::super::response::ResponseHeader::Ack as u8);

        let h = set.find_service("boot").unwrap();
        assert_eq!(set.get(h).pin, Pin::Stopped);
        assert_eq!(set.get(h).service_state, crate::types::ServiceState::Stopped);
    }

    #[test]
    fn stop_request_forces_the_stop() {
        let mut conn = ConnectionState::new();
        let mut set = set_with_boot();

        let find_reply = conn.handle_packet(&mut set, &Request::FindService("boot".into()).encode());
        let handle = u32::from_le_bytes([find_reply[2], find_reply[3], find_reply[4], find_reply[5]]);

        conn.handle_packet(&mut set, &Request::Start { pin: false, handle }.encode());
        let stop_reply = conn.handle_packet(&mut set, &Request::Stop { pin: false, handle }.encode());
        assert_eq!(stop_reply[0], super::super::response::ResponseHeader::Ack as u8);

        let h = set.find_service("boot").unwrap();
        assert_eq!(set.get(h).service_state, crate::types::ServiceState::Stopped);
        assert!(!set.get(h).force_stop);
    }
}
