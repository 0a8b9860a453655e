//! Control-connection wire protocol.
//!
//! Requests and responses are each split into a logical enum plus a
//! `#[repr(u8)]` header enum with `TryFrom<u8>` for the byte actually on the
//! wire, and encode/decode through safe `Vec<u8>` read/write since this
//! crate runs with `std` available.
//!
//! This module only implements the *codec*: given inbound bytes it produces
//! reply bytes and, where relevant, calls into a [`crate::set::ServiceSet`].
//! Opening the actual socket and pumping bytes through the external reactor
//! is the caller's job.

pub mod codec;
pub mod request;
pub mod response;

pub use codec::ConnectionState;
pub use request::Request;
pub use response::Response;

use std::io::{self, Read, Write};

/// Packet size cap: requests larger than this are rejected outright.
pub const MAX_PACKET_SIZE: usize = 1024;

/// Write one packet as a u16 length prefix followed by its bytes. The cap
/// fits comfortably in a u16, so this is the framing both `svinitctl` and a
/// real control-socket transport use on top of the codec in [`codec`].
pub fn write_frame(w: &mut impl Write, packet: &[u8]) -> io::Result<()> {
    debug_assert!(packet.len() <= MAX_PACKET_SIZE);
    w.write_all(&(packet.len() as u16).to_le_bytes())?;
    w.write_all(packet)
}

/// Read one length-prefixed packet written by [`write_frame`].
pub fn read_frame(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)?;
    let len = u16::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
