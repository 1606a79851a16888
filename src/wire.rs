//! Byte-level I/O over a connected socket, plain or behind a secure
//! transport, with a small put-back region so the HTTP parser can do
//! one-token lookahead without a separate peek-buffer of its own.

use crate::prelude::*;

const PUTBACK_MIN: usize = 32;

/// An opaque secure-transport handle. The TLS library binding itself is out
/// of scope for this core; a real deployment plugs a concrete
/// implementation in behind this trait.
pub trait SecureTransport: std::fmt::Debug + Send {
    fn handshake_accept(&mut self) -> Result<()>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn shutdown(&mut self) -> Result<()>;
}

#[derive(Debug)]
enum Transport {
    Plain(TcpStream),
    Secure(Box<dyn SecureTransport>),
}

/// A buffered read/write endpoint. Reads accumulate in `input`; the parser
/// consumes from the front and may push bytes back via [`WireCodec::unread`].
#[derive(Debug)]
pub struct WireCodec {
    transport: Transport,
    input: Vec<u8>,
    output: Vec<u8>,
    closed: bool,
}

impl WireCodec {
    pub fn plain(stream: TcpStream) -> Self {
        WireCodec {
            transport: Transport::Plain(stream),
            input: Vec::with_capacity(READ_BUF_SIZE),
            output: Vec::new(),
            closed: false,
        }
    }

    pub fn secure(transport: Box<dyn SecureTransport>) -> Result<Self> {
        let mut codec = WireCodec {
            transport: Transport::Secure(transport),
            input: Vec::with_capacity(READ_BUF_SIZE),
            output: Vec::new(),
            closed: false,
        };
        if let Transport::Secure(t) = &mut codec.transport {
            t.handshake_accept()?;
        }
        Ok(codec)
    }

    /// Pulls more bytes from the underlying transport into the input
    /// buffer. Returns the number of bytes newly buffered; 0 means EOF.
    pub fn fill(&mut self) -> Result<usize> {
        let mut buf = [0u8; READ_BUF_SIZE];
        let n = match &mut self.transport {
            Transport::Plain(s) => s.read(&mut buf)?,
            Transport::Secure(t) => t.read(&mut buf)?,
        };
        if n == 0 {
            self.closed = true;
        } else {
            self.input.extend_from_slice(&buf[..n]);
        }
        Ok(n)
    }

    /// Reads exactly `n` bytes, filling from the transport as needed.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        while self.input.len() < n {
            if self.fill()? == 0 {
                return Err(CserveError::TransportFailure(
                    "eof before expected bytes arrived".into(),
                ));
            }
        }
        Ok(self.input.drain(..n).collect())
    }

    /// Reads up to (and draining) the next occurrence of `needle`, filling
    /// from the transport as needed. Returns the bytes before `needle`.
    pub fn read_until(&mut self, needle: &[u8], max_len: usize) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = find_subsequence(&self.input, needle, 0) {
                if pos > max_len {
                    return Err(CserveError::ProtocolError("line too long".into()));
                }
                let line = self.input[..pos].to_vec();
                self.input.drain(..pos + needle.len());
                return Ok(line);
            }
            if self.input.len() > max_len {
                return Err(CserveError::ProtocolError("line too long".into()));
            }
            if self.fill()? == 0 {
                return Err(CserveError::TransportFailure(
                    "eof before line terminator".into(),
                ));
            }
        }
    }

    /// Pushes bytes back onto the front of the input buffer; bounded to
    /// `PUTBACK_MIN` bytes of headroom by convention (callers never push
    /// back more than a few bytes of lookahead).
    pub fn unread(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= PUTBACK_MIN);
        let mut combined = bytes.to_vec();
        combined.extend_from_slice(&self.input);
        self.input = combined;
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.output.extend_from_slice(buf);
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        while !self.output.is_empty() {
            let n = match &mut self.transport {
                Transport::Plain(s) => s.write(&self.output)?,
                Transport::Secure(t) => t.write(&self.output)?,
            };
            if n == 0 {
                return Err(CserveError::TransportFailure("write stalled".into()));
            }
            self.output.drain(..n);
        }
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        match &mut self.transport {
            Transport::Plain(s) => {
                let _ = s.shutdown(std::net::Shutdown::Both);
            }
            Transport::Secure(t) => t.shutdown()?,
        }
        Ok(())
    }

    pub fn is_eof(&self) -> bool {
        self.closed && self.input.is_empty()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        if let Transport::Plain(s) = &self.transport {
            s.set_read_timeout(timeout)?;
        }
        Ok(())
    }

    pub fn into_plain_stream(self) -> Option<TcpStream> {
        match self.transport {
            Transport::Plain(s) => Some(s),
            Transport::Secure(_) => None,
        }
    }
}

/// Finds the first occurrence of `needle` in `haystack` at or after
/// `start_offset`. Shared by the wire codec and the HTTP multipart parser.
pub fn find_subsequence(haystack: &[u8], needle: &[u8], start_offset: usize) -> Option<usize> {
    if needle.is_empty() || start_offset >= haystack.len() {
        return None;
    }
    let first = needle[0];
    let mut pos = start_offset;
    while let Some(rel) = haystack[pos..].iter().position(|&b| b == first) {
        let abs = pos + rel;
        match haystack.get(abs..abs + needle.len()) {
            Some(candidate) if candidate == needle => return Some(abs),
            Some(_) => pos = abs + 1,
            None => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_subsequence_mid_buffer() {
        let hay = b"abc--boundary\r\nrest";
        assert_eq!(find_subsequence(hay, b"--boundary", 0), Some(3));
    }

    #[test]
    fn returns_none_when_missing() {
        assert_eq!(find_subsequence(b"abcdef", b"xyz", 0), None);
    }
}
