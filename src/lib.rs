//! Crate root: wires the layered config, the script-backed dispatcher, the
//! worker pool, signal handling, and the accept loop into one `Server`.

pub mod accept_loop;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod http;
pub mod plugin;
pub mod prelude;
pub mod script;
pub mod signal;
pub mod socket;
pub mod wire;
pub mod worker_pool;

use crate::accept_loop::AcceptLoop;
use crate::config::RuntimeConfig;
use crate::prelude::*;
use crate::worker_pool::WorkerPool;
use std::os::unix::net::UnixStream as StdUnixStream;

/// Owns nothing by itself; `run` consumes the resolved config and blocks
/// until the stop pipe fires, either from a caught signal or a script
/// calling `server.shutdown()`.
pub struct Server {
    config: Arc<RuntimeConfig>,
}

impl Server {
    pub fn new(config: RuntimeConfig) -> Self {
        Server { config: Arc::new(config) }
    }

    pub fn run(self) -> Result<()> {
        cserve_log::init(self.config.loglevel);
        drop_privileges(&self.config)?;

        let mut plugins = plugin::PluginLoader::new();
        for spec in &self.config.plugins {
            plugins.load(&spec.name, &spec.path)?;
        }

        let (accept_end, signal_end) = StdUnixStream::pair()?;
        let script_end = Arc::new(signal_end.try_clone()?);
        accept_end.set_nonblocking(true)?;
        let mio_stop = mio::net::UnixStream::from_std(accept_end);

        let dispatcher = Arc::new(handler::build_dispatcher(&self.config, script_end)?);
        let pool = WorkerPool::spawn(Arc::clone(&self.config), dispatcher)?;

        signal::install(signal_end)?;

        cserve_log::info!(
            "cserve listening on :{} ({} workers, tls {})",
            self.config.port,
            self.config.nthreads,
            if self.config.sslport.is_some() { "on" } else { "off" }
        );

        let mut loop_ = AcceptLoop::new(&self.config, pool, mio_stop)?;
        loop_.run()
    }
}

#[cfg(unix)]
fn drop_privileges(config: &RuntimeConfig) -> Result<()> {
    let Some(name) = &config.userid else {
        return Ok(());
    };
    let cname = std::ffi::CString::new(name.as_str())
        .map_err(|e| CserveError::ConfigError(format!("invalid userid {name}: {e}")))?;
    let passwd = unsafe { libc::getpwnam(cname.as_ptr()) };
    if passwd.is_null() {
        return Err(CserveError::ConfigError(format!("unknown user {name}")));
    }
    let (uid, gid) = unsafe { ((*passwd).pw_uid, (*passwd).pw_gid) };
    unsafe {
        if libc::setgid(gid) != 0 || libc::setuid(uid) != 0 {
            return Err(CserveError::ConfigError(format!("failed to drop privileges to {name}")));
        }
    }
    cserve_log::info!("dropped privileges to {name}");
    Ok(())
}
