//! Fixed-size pool of worker threads; each blocks on its control channel
//! for the next socket to own and handles it start to finish before asking
//! for another.

use crate::config::RuntimeConfig;
use crate::connection::Connection;
use crate::dispatcher::Dispatcher;
use crate::http::parse_request;
use crate::prelude::*;
use crate::socket::{read_frame, write_frame, SocketDescriptor, SocketIntent};
use crate::wire::WireCodec;
use std::os::fd::{FromRawFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::thread::JoinHandle;

/// The `AcceptLoop`'s handle onto one worker: the mio-registerable end of
/// the control channel, plus the thread join handle for clean shutdown.
pub struct WorkerHandle {
    pub control: mio::net::UnixStream,
    pub thread: Option<JoinHandle<()>>,
}

pub struct WorkerPool {
    pub workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    pub fn spawn(config: Arc<RuntimeConfig>, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let mut workers = Vec::with_capacity(config.nthreads);
        for id in 0..config.nthreads {
            let (acceptor_end, worker_end) = StdUnixStream::pair()?;
            acceptor_end.set_nonblocking(true)?;
            let control = mio::net::UnixStream::from_std(acceptor_end);

            let config = Arc::clone(&config);
            let dispatcher = Arc::clone(&dispatcher);
            let thread = std::thread::Builder::new()
                .name(format!("cserve-worker-{id}"))
                .spawn(move || worker_loop(id, worker_end, config, dispatcher))?;

            workers.push(WorkerHandle {
                control,
                thread: Some(thread),
            });
        }
        Ok(WorkerPool { workers })
    }

    pub fn join_all(&mut self) {
        for worker in &mut self.workers {
            if let Some(t) = worker.thread.take() {
                let _ = t.join();
            }
        }
    }
}

fn worker_loop(id: usize, mut channel: StdUnixStream, config: Arc<RuntimeConfig>, dispatcher: Arc<Dispatcher>) {
    loop {
        let desc = match read_frame(&mut channel) {
            Ok(Some(d)) => d,
            Ok(None) => {
                cserve_log::warn!("worker {id}: control channel closed, exiting");
                return;
            }
            Err(e) => {
                cserve_log::err!("worker {id}: control channel read failed: {e}");
                return;
            }
        };

        match desc.intent {
            SocketIntent::Exit => {
                cserve_log::debug!("worker {id}: received exit");
                return;
            }
            SocketIntent::Noop => continue,
            SocketIntent::ProcessRequest => {
                let reply = process_one(&desc, &config, &dispatcher);
                if write_frame(&mut channel, &reply).is_err() {
                    cserve_log::err!("worker {id}: failed to report completion");
                    return;
                }
            }
            _ => continue,
        }
    }
}

/// Handles exactly one request on the handed-off socket and reports back
/// whether it can be reused for another.
fn process_one(desc: &SocketDescriptor, config: &RuntimeConfig, dispatcher: &Dispatcher) -> SocketDescriptor {
    let stream = unsafe { TcpStream::from_raw_fd(desc.raw_fd) };
    if stream.set_read_timeout(Some(config.keepalive)).is_err() {
        // `stream` still owns desc.raw_fd; hand it back instead of letting
        // this return drop (and close) it, or AcceptLoop's shared close
        // routine would close a fd the kernel may have already reused.
        return finished(desc, stream.into_raw_fd(), SocketIntent::FinishedClose);
    }

    let mut wire = WireCodec::plain(stream);
    let request = match parse_request(
        &mut wire,
        desc.peer_ip.clone(),
        desc.peer_port,
        desc.secure,
        config.maxpost as usize,
        &config.tmpdir,
    ) {
        Ok(req) => req,
        Err(e) => {
            cserve_log::warn!("request parse failed from {}: {e}", desc.peer_ip);
            let mut res = crate::http::Response::new();
            res.set_status(e.status_code().max(400), None);
            res.write(e.to_string().as_bytes());
            let _ = wire.write_all(&res.to_bytes());
            let raw_fd = wire.into_plain_stream().map(IntoRawFd::into_raw_fd).unwrap_or(desc.raw_fd);
            return finished(desc, raw_fd, SocketIntent::FinishedClose);
        }
    };

    let mut conn = Connection::new(wire, request, config.keepalive);
    if let Err(e) = dispatcher.dispatch(&mut conn) {
        cserve_log::err!("handler error: {e}");
        if conn.state != crate::connection::ConnState::HeadersEmitted
            && conn.state != crate::connection::ConnState::BodyEmitted
        {
            conn.set_status(e.status_code().max(500), None);
            conn.set_buffered();
            conn.write(e.to_string().as_bytes());
        }
        conn.abort();
    }

    let keep_alive = conn.keep_alive();
    conn.teardown();

    let Some(std_stream) = conn.into_stream() else {
        // Only reachable once secure `WireCodec`s exist; its underlying
        // stream has already been dropped (and closed) by `into_stream`,
        // so there is no live fd left to hand back here.
        return finished(desc, desc.raw_fd, SocketIntent::FinishedClose);
    };
    let raw_fd = std_stream.into_raw_fd();
    let intent = if keep_alive {
        SocketIntent::FinishedKeepAlive
    } else {
        SocketIntent::FinishedClose
    };
    SocketDescriptor {
        kind: desc.kind,
        raw_fd,
        secure: desc.secure,
        peer_ip: desc.peer_ip.clone(),
        peer_port: desc.peer_port,
        intent,
    }
}

/// `raw_fd` must be a live fd the caller still owns — the accept loop's
/// shared close routine closes it exactly once on `FinishedClose`, so this
/// must never be called with an fd that's already been dropped locally.
fn finished(desc: &SocketDescriptor, raw_fd: RawFd, intent: SocketIntent) -> SocketDescriptor {
    SocketDescriptor {
        kind: desc.kind,
        raw_fd,
        secure: desc.secure,
        peer_ip: desc.peer_ip.clone(),
        peer_port: desc.peer_port,
        intent,
    }
}
