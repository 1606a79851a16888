//! Owns the poll set and the idle/waiting worker queues. The only thread
//! that touches the poll set or the idle queue.

use crate::config::RuntimeConfig;
use crate::prelude::*;
use crate::socket::{exit_descriptor, write_frame, SocketDescriptor, SocketIntent};
use crate::worker_pool::WorkerPool;
use mio::net::{TcpListener, TcpStream as MioTcpStream, UnixStream as MioUnixStream};
use std::collections::VecDeque;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd};

struct DynamicEntry {
    stream: MioTcpStream,
    secure: bool,
}

pub struct AcceptLoop {
    poll: Poll,
    listener: TcpListener,
    secure_listener: Option<TcpListener>,
    stop: MioUnixStream,
    pool: WorkerPool,
    dynamic: HashMap<Token, DynamicEntry>,
    worker_tokens: HashMap<Token, usize>,
    worker_recv_buf: Vec<Vec<u8>>,
    idle_queue: Vec<usize>,
    waiting_queue: VecDeque<SocketDescriptor>,
    next_token: usize,
    listen_token: Token,
    secure_listen_token: Option<Token>,
    stop_token: Token,
}

impl AcceptLoop {
    pub fn new(config: &RuntimeConfig, mut pool: WorkerPool, mut stop: MioUnixStream) -> Result<Self> {
        let poll = Poll::new()?;
        let mut next_token = 0usize;

        let mut worker_tokens = HashMap::new();
        let mut worker_recv_buf = Vec::new();
        for (idx, worker) in pool.workers.iter_mut().enumerate() {
            let token = Token(next_token);
            next_token += 1;
            poll.registry().register(&mut worker.control, token, Interest::READABLE)?;
            worker_tokens.insert(token, idx);
            worker_recv_buf.push(Vec::new());
        }

        let stop_token = Token(next_token);
        next_token += 1;
        poll.registry().register(&mut stop, stop_token, Interest::READABLE)?;

        let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
        let mut listener = TcpListener::bind(addr)?;
        let listen_token = Token(next_token);
        next_token += 1;
        poll.registry().register(&mut listener, listen_token, Interest::READABLE)?;

        let mut secure_listener = None;
        let mut secure_listen_token = None;
        if let Some(sslport) = config.sslport {
            let addr: SocketAddr = format!("0.0.0.0:{sslport}").parse()?;
            let mut l = TcpListener::bind(addr)?;
            let token = Token(next_token);
            next_token += 1;
            poll.registry().register(&mut l, token, Interest::READABLE)?;
            secure_listener = Some(l);
            secure_listen_token = Some(token);
        }

        let idle_queue = (0..pool.workers.len()).collect();

        Ok(AcceptLoop {
            poll,
            listener,
            secure_listener,
            stop,
            pool,
            dynamic: HashMap::new(),
            worker_tokens,
            worker_recv_buf,
            idle_queue,
            waiting_queue: VecDeque::new(),
            next_token,
            listen_token,
            secure_listen_token,
            stop_token,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(256);
        loop {
            self.poll.poll(&mut events, None)?;
            let tokens: Vec<Token> = events.iter().map(|e| e.token()).collect();
            for token in tokens {
                if token == self.stop_token {
                    self.handle_stop()?;
                    return Ok(());
                } else if token == self.listen_token {
                    self.accept_new(false)?;
                } else if self.secure_listen_token == Some(token) {
                    self.accept_new(true)?;
                } else if let Some(&widx) = self.worker_tokens.get(&token) {
                    self.handle_worker_reply(widx)?;
                } else if self.dynamic.contains_key(&token) {
                    self.handle_client_readable(token)?;
                }
            }
        }
    }

    fn accept_new(&mut self, secure: bool) -> Result<()> {
        loop {
            let result = if secure {
                self.secure_listener.as_ref().unwrap().accept()
            } else {
                self.listener.accept()
            };
            match result {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) = self.poll.registry().register(&mut stream, token, Interest::READABLE) {
                        cserve_log::err!("failed to register accepted socket: {e}");
                        continue;
                    }
                    self.dynamic.insert(token, DynamicEntry { stream, secure });
                    cserve_log::trace!("accepted {addr} (secure={secure}) as {token:?}");
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    // Accept failures are logged and the loop continues; a single bad
                    // connection attempt must not bring the listener down.
                    cserve_log::warn!("accept failed: {e}");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_client_readable(&mut self, token: Token) -> Result<()> {
        let Some(mut entry) = self.dynamic.remove(&token) else {
            return Ok(());
        };
        self.poll.registry().deregister(&mut entry.stream)?;

        let peer = entry
            .stream
            .peer_addr()
            .map(|a| (a.ip().to_string(), a.port()))
            .unwrap_or_else(|_| ("0.0.0.0".into(), 0));

        let raw_fd = entry.stream.into_raw_fd();
        let desc = SocketDescriptor::dynamic(raw_fd, entry.secure, peer.0, peer.1);
        self.dispatch_or_queue(desc)
    }

    fn dispatch_or_queue(&mut self, desc: SocketDescriptor) -> Result<()> {
        if let Some(widx) = self.idle_queue.pop() {
            self.send_to_worker(widx, &desc)?;
        } else {
            self.waiting_queue.push_back(desc);
        }
        Ok(())
    }

    fn send_to_worker(&mut self, widx: usize, desc: &SocketDescriptor) -> Result<()> {
        let stream = &mut self.pool.workers[widx].control;
        write_frame(stream, desc)?;
        Ok(())
    }

    /// Reads whatever is available off a worker's control channel and
    /// decodes as many complete length-prefixed frames as that yields.
    /// A single readiness event is not guaranteed to carry a whole frame.
    fn handle_worker_reply(&mut self, widx: usize) -> Result<()> {
        let mut buf = [0u8; 256];
        let n = {
            let stream = &mut self.pool.workers[widx].control;
            match stream.read(&mut buf) {
                Ok(0) => {
                    cserve_log::warn!("worker {widx} control channel hung up");
                    self.retire_worker(widx);
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        };
        self.worker_recv_buf[widx].extend_from_slice(&buf[..n]);

        loop {
            let Some(&len) = self.worker_recv_buf[widx].first() else {
                break;
            };
            let total = 1 + len as usize;
            if self.worker_recv_buf[widx].len() < total {
                break;
            }
            let frame: Vec<u8> = self.worker_recv_buf[widx].drain(..total).collect();
            if let Some(desc) = SocketDescriptor::decode(&frame[1..]) {
                self.on_worker_finished(widx, desc)?;
            }
        }
        Ok(())
    }

    fn on_worker_finished(&mut self, widx: usize, desc: SocketDescriptor) -> Result<()> {
        match desc.intent {
            SocketIntent::FinishedKeepAlive => {
                let mut std_stream = unsafe { std::net::TcpStream::from_raw_fd(desc.raw_fd) };
                std_stream.set_nonblocking(true)?;
                let mut mio_stream = MioTcpStream::from_std(std_stream);
                let token = Token(self.next_token);
                self.next_token += 1;
                self.poll.registry().register(&mut mio_stream, token, Interest::READABLE)?;
                self.dynamic.insert(
                    token,
                    DynamicEntry {
                        stream: mio_stream,
                        secure: desc.secure,
                    },
                );
                self.hand_off_or_idle(widx)
            }
            SocketIntent::FinishedClose => {
                drop(unsafe { std::net::TcpStream::from_raw_fd(desc.raw_fd) });
                self.hand_off_or_idle(widx)
            }
            _ => Ok(()),
        }
    }

    fn hand_off_or_idle(&mut self, widx: usize) -> Result<()> {
        if let Some(next) = self.waiting_queue.pop_front() {
            self.send_to_worker(widx, &next)
        } else {
            self.idle_queue.push(widx);
            Ok(())
        }
    }

    fn retire_worker(&mut self, widx: usize) {
        self.idle_queue.retain(|&w| w != widx);
        if self.idle_queue.is_empty() && self.waiting_queue.is_empty() && self.worker_tokens.len() == 1 {
            cserve_log::critical!("last worker is gone, no capacity remains");
        }
    }

    fn handle_stop(&mut self) -> Result<()> {
        cserve_log::info!("stop signal received, shutting down");
        self.poll.registry().deregister(&mut self.listener)?;
        if let Some(l) = &mut self.secure_listener {
            self.poll.registry().deregister(l)?;
        }
        for (_token, mut entry) in self.dynamic.drain() {
            let _ = self.poll.registry().deregister(&mut entry.stream);
            drop(unsafe { std::net::TcpStream::from_raw_fd(entry.stream.into_raw_fd()) });
        }
        let exit = exit_descriptor();
        for worker in &mut self.pool.workers {
            let _ = write_frame(&mut worker.control, &exit);
        }
        self.pool.join_all();
        Ok(())
    }
}
