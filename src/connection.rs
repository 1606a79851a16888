//! Per-request state: the handler's sole window onto the request/response,
//! and the only place that knows about header/body emission ordering.

use crate::http::{Request, Response, SetCookie, TransferMode};
use crate::prelude::*;
use crate::wire::WireCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Fresh,
    HeadersParsed,
    HandlerRunning,
    HeadersEmitted,
    BodyEmitted,
    Done,
    Aborted,
}

pub struct Connection {
    pub wire: WireCodec,
    pub request: Request,
    pub response: Response,
    pub state: ConnState,
    keep_alive: bool,
    keep_alive_timeout: Duration,
}

impl Connection {
    pub fn new(wire: WireCodec, request: Request, keep_alive_timeout: Duration) -> Self {
        let keep_alive = !matches!(
            request.header("connection").map(|v| v.to_ascii_lowercase()),
            Some(ref v) if v == "close"
        );
        Connection {
            wire,
            request,
            response: Response::new(),
            state: ConnState::HeadersParsed,
            keep_alive,
            keep_alive_timeout,
        }
    }

    pub fn set_status(&mut self, code: u16, phrase: Option<&str>) {
        self.response.set_status(code, phrase);
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.response.set_header(name, value)
    }

    pub fn add_cookie(&mut self, cookie: SetCookie) -> Result<()> {
        self.response.add_cookie(cookie)
    }

    pub fn set_buffered(&mut self) {
        self.response.mode = TransferMode::Buffered;
    }

    pub fn set_chunked(&mut self) {
        self.response.mode = TransferMode::Chunked;
    }

    pub fn write(&mut self, data: &[u8]) {
        self.response.write(data);
    }

    /// Emits headers (first call only) and the accumulated body.
    pub fn flush(&mut self) -> Result<()> {
        if self.state == ConnState::Aborted || self.state == ConnState::Done {
            return Ok(());
        }
        self.state = ConnState::HandlerRunning;
        let bytes = self.response.to_bytes();
        self.state = ConnState::HeadersEmitted;
        let result = self.wire.write_all(&bytes);
        self.state = ConnState::BodyEmitted;
        result
    }

    pub fn send_file(&mut self, path: &Path, from: Option<u64>, to: Option<u64>) -> Result<()> {
        let data = fs::read(path)?;
        let start = from.unwrap_or(0) as usize;
        let end = to.map(|t| t as usize + 1).unwrap_or(data.len()).min(data.len());
        if start <= end {
            self.response.write(&data[start..end]);
        }
        Ok(())
    }

    /// Whether this connection should be re-registered for another request
    /// after the handler completes.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive && self.state != ConnState::Aborted
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    pub fn abort(&mut self) {
        self.state = ConnState::Aborted;
    }

    /// Flushes if the handler never did, unlinks every uploaded temp file,
    /// and marks the connection done. Teardown errors are logged, not
    /// raised — a failed unlink should not fail the response that already
    /// went out.
    pub fn teardown(&mut self) {
        if self.state != ConnState::BodyEmitted && self.state != ConnState::Aborted {
            if let Err(e) = self.flush() {
                cserve_log::warn!("auto-flush during teardown failed: {e}");
            }
        }
        for upload in &self.request.uploads {
            if let Err(e) = fs::remove_file(&upload.temp_path) {
                cserve_log::warn!(
                    "failed to unlink upload temp file {}: {e}",
                    upload.temp_path.display()
                );
            }
        }
        self.state = ConnState::Done;
    }

    pub fn into_stream(self) -> Option<TcpStream> {
        self.wire.into_plain_stream()
    }
}
