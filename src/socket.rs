//! The `SocketDescriptor`: simultaneously a poll-set entry and a message
//! passed across a worker's control channel.

use crate::prelude::*;
use std::os::fd::RawFd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Control,
    Stop,
    Listen,
    SecureListen,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketIntent {
    Noop,
    ProcessRequest,
    FinishedKeepAlive,
    FinishedClose,
    Exit,
    SocketClosed,
    Error,
}

#[derive(Debug)]
pub struct SocketDescriptor {
    pub kind: SocketKind,
    pub raw_fd: RawFd,
    pub secure: bool,
    pub peer_ip: String,
    pub peer_port: u16,
    pub intent: SocketIntent,
}

impl SocketDescriptor {
    pub fn dynamic(raw_fd: RawFd, secure: bool, peer_ip: String, peer_port: u16) -> Self {
        SocketDescriptor {
            kind: SocketKind::Dynamic,
            raw_fd,
            secure,
            peer_ip,
            peer_port,
            intent: SocketIntent::ProcessRequest,
        }
    }

    /// Wire-encodes the descriptor for the control channel: a fixed-size
    /// header plus a variable-length peer IP, so a worker can frame a read
    /// without needing a separate length channel.
    pub fn encode(&self) -> Vec<u8> {
        let ip_bytes = self.peer_ip.as_bytes();
        let mut out = Vec::with_capacity(16 + ip_bytes.len());
        out.push(intent_tag(self.intent));
        out.push(self.secure as u8);
        out.extend_from_slice(&self.raw_fd.to_le_bytes());
        out.extend_from_slice(&self.peer_port.to_le_bytes());
        out.push(ip_bytes.len() as u8);
        out.extend_from_slice(ip_bytes);
        out
    }

    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 11 {
            return None;
        }
        let intent = intent_from_tag(buf[0])?;
        let secure = buf[1] != 0;
        let raw_fd = RawFd::from_le_bytes(buf[2..6].try_into().ok()?);
        let peer_port = u16::from_le_bytes(buf[6..8].try_into().ok()?);
        let ip_len = buf[8] as usize;
        let ip_bytes = buf.get(9..9 + ip_len)?;
        let peer_ip = String::from_utf8_lossy(ip_bytes).into_owned();
        Some(SocketDescriptor {
            kind: SocketKind::Dynamic,
            raw_fd,
            secure,
            peer_ip,
            peer_port,
            intent,
        })
    }
}

pub fn exit_descriptor() -> SocketDescriptor {
    SocketDescriptor {
        kind: SocketKind::Control,
        raw_fd: -1,
        secure: false,
        peer_ip: String::new(),
        peer_port: 0,
        intent: SocketIntent::Exit,
    }
}

pub fn noop_descriptor() -> SocketDescriptor {
    SocketDescriptor {
        kind: SocketKind::Control,
        raw_fd: -1,
        secure: false,
        peer_ip: String::new(),
        peer_port: 0,
        intent: SocketIntent::Noop,
    }
}

/// Writes a length-prefixed frame: one byte of payload length followed by
/// [`SocketDescriptor::encode`]'s output. Both directions of a worker's
/// control channel use this framing.
pub fn write_frame<W: Write>(w: &mut W, desc: &SocketDescriptor) -> io::Result<()> {
    let payload = desc.encode();
    w.write_all(&[payload.len() as u8])?;
    w.write_all(&payload)?;
    Ok(())
}

/// Blocking read of one frame. Used on a worker's own end of its control
/// channel, which is a genuinely blocking `std::os::unix::net::UnixStream`.
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<SocketDescriptor>> {
    let mut len_buf = [0u8; 1];
    if r.read_exact(&mut len_buf).is_err() {
        return Ok(None);
    }
    let mut payload = vec![0u8; len_buf[0] as usize];
    r.read_exact(&mut payload)?;
    Ok(SocketDescriptor::decode(&payload))
}

fn intent_tag(intent: SocketIntent) -> u8 {
    match intent {
        SocketIntent::Noop => 0,
        SocketIntent::ProcessRequest => 1,
        SocketIntent::FinishedKeepAlive => 2,
        SocketIntent::FinishedClose => 3,
        SocketIntent::Exit => 4,
        SocketIntent::SocketClosed => 5,
        SocketIntent::Error => 6,
    }
}

fn intent_from_tag(tag: u8) -> Option<SocketIntent> {
    Some(match tag {
        0 => SocketIntent::Noop,
        1 => SocketIntent::ProcessRequest,
        2 => SocketIntent::FinishedKeepAlive,
        3 => SocketIntent::FinishedClose,
        4 => SocketIntent::Exit,
        5 => SocketIntent::SocketClosed,
        6 => SocketIntent::Error,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let d = SocketDescriptor::dynamic(42, true, "127.0.0.1".to_string(), 5050);
        let encoded = d.encode();
        let back = SocketDescriptor::decode(&encoded).unwrap();
        assert_eq!(back.raw_fd, 42);
        assert!(back.secure);
        assert_eq!(back.peer_ip, "127.0.0.1");
        assert_eq!(back.peer_port, 5050);
        assert_eq!(back.intent, SocketIntent::ProcessRequest);
    }
}
