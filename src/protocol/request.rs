//! Request side of the control-connection wire protocol.

use crate::error::ProtocolError;
use crate::types::ShutdownType;

/// Byte 0 of every request packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestHeader {
    QueryVersion = 0,
    FindService = 1,
    LoadService = 2,
    Start = 3,
    Stop = 4,
    Wake = 5,
    Release = 6,
    Unpin = 7,
    Shutdown = 8,
    ListServices = 9,
}

impl TryFrom<u8> for RequestHeader {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use RequestHeader::*;
        Ok(match value {
            0 => QueryVersion,
            1 => FindService,
            2 => LoadService,
            3 => Start,
            4 => Stop,
            5 => Wake,
            6 => Release,
            7 => Unpin,
            8 => Shutdown,
            9 => ListServices,
            other => return Err(ProtocolError::UnrecognizedRequest(other)),
        })
    }
}

/// A parsed request from a control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    QueryVersion,
    FindService(String),
    LoadService(String),
    Start { pin: bool, handle: u32 },
    Stop { pin: bool, handle: u32 },
    Wake { pin: bool, handle: u32 },
    Release { pin: bool, handle: u32 },
    Unpin { handle: u32 },
    Shutdown(ShutdownType),
    ListServices,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.pos + n > self.buf.len() {
            return Err(ProtocolError::Truncated {
                expected: self.pos + n,
                got: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn name(&mut self) -> Result<String, ProtocolError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn shutdown_type_from_byte(b: u8) -> Result<ShutdownType, ProtocolError> {
    Ok(match b {
        0 => ShutdownType::Continue,
        1 => ShutdownType::Halt,
        2 => ShutdownType::Reboot,
        3 => ShutdownType::Poweroff,
        other => return Err(ProtocolError::UnrecognizedRequest(other)),
    })
}

impl Request {
    /// Parse one already-length-delimited packet (the cap check happens in
    /// [`crate::protocol::codec::ConnectionState::handle_packet`], before this
    /// is called).
    pub fn decode(bytes: &[u8]) -> Result<Request, ProtocolError> {
        let mut c = Cursor::new(bytes);
        let header = RequestHeader::try_from(c.u8()?)?;
        Ok(match header {
            RequestHeader::QueryVersion => Request::QueryVersion,
            RequestHeader::FindService => Request::FindService(c.name()?),
            RequestHeader::LoadService => Request::LoadService(c.name()?),
            RequestHeader::Start => Request::Start {
                pin: c.u8()? != 0,
                handle: c.u32()?,
            },
            RequestHeader::Stop => Request::Stop {
                pin: c.u8()? != 0,
                handle: c.u32()?,
            },
            RequestHeader::Wake => Request::Wake {
                pin: c.u8()? != 0,
                handle: c.u32()?,
            },
            RequestHeader::Release => Request::Release {
                pin: c.u8()? != 0,
                handle: c.u32()?,
            },
            RequestHeader::Unpin => Request::Unpin { handle: c.u32()? },
            RequestHeader::Shutdown => Request::Shutdown(shutdown_type_from_byte(c.u8()?)?),
            RequestHeader::ListServices => Request::ListServices,
        })
    }

    /// Encode this request back to wire bytes. Primarily used by
    /// `svinitctl`, the request-issuing side of the protocol.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Request::QueryVersion => out.push(RequestHeader::QueryVersion as u8),
            Request::FindService(name) => {
                out.push(RequestHeader::FindService as u8);
                push_name(&mut out, name);
            }
            Request::LoadService(name) => {
                out.push(RequestHeader::LoadService as u8);
                push_name(&mut out, name);
            }
            Request::Start { pin, handle } => {
                out.push(RequestHeader::Start as u8);
                out.push(*pin as u8);
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Request::Stop { pin, handle } => {
                out.push(RequestHeader::Stop as u8);
                out.push(*pin as u8);
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Request::Wake { pin, handle } => {
                out.push(RequestHeader::Wake as u8);
                out.push(*pin as u8);
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Request::Release { pin, handle } => {
                out.push(RequestHeader::Release as u8);
                out.push(*pin as u8);
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Request::Unpin { handle } => {
                out.push(RequestHeader::Unpin as u8);
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Request::Shutdown(shutdown_type) => {
                out.push(RequestHeader::Shutdown as u8);
                out.push(shutdown_type_to_byte(*shutdown_type));
            }
            Request::ListServices => out.push(RequestHeader::ListServices as u8),
        }
        out
    }
}

fn push_name(out: &mut Vec<u8>, name: &str) {
    let bytes = name.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn shutdown_type_to_byte(t: ShutdownType) -> u8 {
    match t {
        ShutdownType::Continue => 0,
        ShutdownType::Halt => 1,
        ShutdownType::Reboot => 2,
        ShutdownType::Poweroff => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_find_service() {
        let req = Request::FindService("boot".to_string());
        let bytes = req.encode();
        assert_eq!(Request::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn round_trips_start_with_pin() {
        let req = Request::Start { pin: true, handle: 7 };
        let bytes = req.encode();
        assert_eq!(Request::decode(&bytes).unwrap(), req);
    }

    #[test]
    fn unrecognized_header_is_a_protocol_error() {
        match Request::decode(&[0xff]) {
            Err(ProtocolError::UnrecognizedRequest(0xff)) => {}
            other => panic!("expected UnrecognizedRequest, got {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_a_protocol_error() {
        // FindService header with no length prefix at all.
        match Request::decode(&[RequestHeader::FindService as u8]) {
            Err(ProtocolError::Truncated { .. }) => {}
            other => panic!("expected Truncated, got {other:?}"),
        }
    }
}
