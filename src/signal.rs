//! Turns `SIGINT`/`SIGTERM` into a single byte on a self-pipe the
//! `AcceptLoop` already polls as its stop socket, and masks `SIGPIPE` so a
//! client hanging up mid-write doesn't take the process down.

use crate::prelude::*;
use signal_hook::consts::{SIGINT, SIGPIPE, SIGTERM};
use signal_hook::iterator::Signals;
use std::os::unix::net::UnixStream as StdUnixStream;

/// Spawns the signal-handling thread and returns the `AcceptLoop`-facing
/// end of the self-pipe, already wrapped as a non-blocking `mio` socket.
pub fn install(stop_tx: StdUnixStream) -> Result<()> {
    ignore_sigpipe();

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(CserveError::from)?;
    std::thread::Builder::new()
        .name("cserve-signal".into())
        .spawn(move || {
            for sig in signals.forever() {
                cserve_log::info!("received signal {sig}, requesting shutdown");
                let mut tx = &stop_tx;
                if tx.write_all(&[1]).is_err() {
                    break;
                }
                break;
            }
        })?;
    Ok(())
}

fn ignore_sigpipe() {
    unsafe {
        libc::signal(SIGPIPE, libc::SIG_IGN);
    }
}
