//! Reply side of the control-connection wire protocol.

use crate::error::ProtocolError;
use crate::types::ServiceState;

/// Byte 0 of every reply packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHeader {
    CpVersion = 0,
    ServiceRecord = 1,
    NoService = 2,
    Ack = 3,
    AlreadySS = 4,
    BadReq = 5,
    Oom = 6,
    SvcInfo = 7,
    ListDone = 8,
}

/// A reply to be written back to a control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    CpVersion { min: u16, max: u16 },
    ServiceRecord { state: u8, handle: u32, target_state: u8 },
    NoService,
    Ack,
    AlreadySS,
    BadReq,
    Oom,
    SvcInfo { name: String, state: u8, target: u8 },
    ListDone,
}

impl TryFrom<u8> for ResponseHeader {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ResponseHeader::*;
        Ok(match value {
            0 => CpVersion,
            1 => ServiceRecord,
            2 => NoService,
            3 => Ack,
            4 => AlreadySS,
            5 => BadReq,
            6 => Oom,
            7 => SvcInfo,
            8 => ListDone,
            other => return Err(ProtocolError::UnrecognizedRequest(other)),
        })
    }
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
}

pub fn state_byte(state: ServiceState) -> u8 {
    match state {
        ServiceState::Stopped => 0,
        ServiceState::Starting => 1,
        ServiceState::Started => 2,
        ServiceState::Stopping => 3,
    }
}

impl Response {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Response::CpVersion { min, max } => {
                out.push(ResponseHeader::CpVersion as u8);
                out.extend_from_slice(&min.to_le_bytes());
                out.extend_from_slice(&max.to_le_bytes());
            }
            Response::ServiceRecord {
                state,
                handle,
                target_state,
            } => {
                out.push(ResponseHeader::ServiceRecord as u8);
                out.push(*state);
                out.extend_from_slice(&handle.to_le_bytes());
                out.push(*target_state);
            }
            Response::NoService => out.push(ResponseHeader::NoService as u8),
            Response::Ack => out.push(ResponseHeader::Ack as u8),
            Response::AlreadySS => out.push(ResponseHeader::AlreadySS as u8),
            Response::BadReq => out.push(ResponseHeader::BadReq as u8),
            Response::Oom => out.push(ResponseHeader::Oom as u8),
            Response::SvcInfo { name, state, target } => {
                out.push(ResponseHeader::SvcInfo as u8);
                let name_bytes = name.as_bytes();
                out.push(name_bytes.len().min(u8::MAX as usize) as u8);
                out.push(*state);
                out.push(*target);
                out.extend_from_slice(&[0u8; 4]); // reserved
                out.extend_from_slice(&name_bytes[..name_bytes.len().min(u8::MAX as usize)]);
            }
            Response::ListDone => out.push(ResponseHeader::ListDone as u8),
        }
        out
    }

    /// Parse one already-length-delimited reply packet. Used by `svinitctl`,
    /// the reply-consuming side of the protocol.
    pub fn decode(bytes: &[u8]) -> Result<Response, ProtocolError> {
        let mut c = Cursor::new(bytes);
        let header = ResponseHeader::try_from(c.u8()?)?;
        Ok(match header {
            ResponseHeader::CpVersion => Response::CpVersion {
                min: c.u16()?,
                max: c.u16()?,
            },
            ResponseHeader::ServiceRecord => Response::ServiceRecord {
                state: c.u8()?,
                handle: c.u32()?,
                target_state: c.u8()?,
            },
            ResponseHeader::NoService => Response::NoService,
            ResponseHeader::Ack => Response::Ack,
            ResponseHeader::AlreadySS => Response::AlreadySS,
            ResponseHeader::BadReq => Response::BadReq,
            ResponseHeader::Oom => Response::Oom,
            ResponseHeader::SvcInfo => {
                let name_len = c.u8()? as usize;
                let state = c.u8()?;
                let target = c.u8()?;
                let _reserved = c.take(4)?;
                let name = String::from_utf8_lossy(c.take(name_len)?).into_owned();
                Response::SvcInfo { name, state, target }
            }
            ResponseHeader::ListDone => Response::ListDone,
        })
    }
}
