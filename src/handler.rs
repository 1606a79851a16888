//! Builds the `Dispatcher` from resolved `RouteSpec`s: every route target
//! names a script file under `scriptdir`, run fresh per request through a
//! [`ScriptBridge`].

use crate::config::RuntimeConfig;
use crate::connection::Connection;
use crate::dispatcher::Dispatcher;
use crate::http::Method;
use crate::prelude::*;
use crate::script::ScriptBridge;
use std::os::unix::net::UnixStream as StdUnixStream;

/// Builds the request-scoped dispatcher. `stop_tx` is the write end of the
/// self-pipe the accept loop polls as its stop socket — a script calling
/// `server.shutdown()` writes to it exactly like a caught `SIGTERM` would.
pub fn build_dispatcher(config: &Arc<RuntimeConfig>, stop_tx: Arc<StdUnixStream>) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();

    for route in &config.routes {
        let method: Method = route.method.parse().unwrap();
        let script_path = config.scriptdir.join(&route.target);
        let config = Arc::clone(config);
        let stop_tx = Arc::clone(&stop_tx);

        dispatcher.add_route(
            method,
            &route.path,
            Box::new(move |conn: &mut Connection| run_script(conn, &script_path, &config, &stop_tx)),
        );
    }

    dispatcher.lock();
    Ok(dispatcher)
}

fn run_script(conn: &mut Connection, script_path: &Path, config: &RuntimeConfig, stop_tx: &StdUnixStream) -> Result<()> {
    let source = fs::read_to_string(script_path)
        .map_err(|e| CserveError::ScriptError(format!("reading {}: {e}", script_path.display())))?;

    if let Some(init) = &config.initscript {
        run_one(conn, init, config)?;
    }

    let origin = script_path.display().to_string();
    let outcome = {
        let bridge = ScriptBridge::new(&conn.request, &conn.request.uploads, config)?;
        let status = bridge.execute_chunk(&source, &origin)?;
        let mut outcome = bridge.into_outcome();
        if outcome.status.is_none() && status != 0 {
            outcome.status = Some((status as u16, None));
        }
        outcome
    };

    apply_outcome(conn, outcome, stop_tx)
}

fn run_one(conn: &mut Connection, source: &str, config: &RuntimeConfig) -> Result<()> {
    let bridge = ScriptBridge::new(&conn.request, &conn.request.uploads, config)?;
    bridge.execute_chunk(source, "initscript")?;
    Ok(())
}

fn apply_outcome(conn: &mut Connection, outcome: crate::script::ScriptOutcome, stop_tx: &StdUnixStream) -> Result<()> {
    if let Some((size, _inc)) = outcome.buffered {
        conn.set_buffered();
        let _ = size;
    }
    if let Some((code, text)) = outcome.status {
        conn.set_status(code, text.as_deref());
    }
    for (key, value) in &outcome.headers {
        conn.set_header(key, value)?;
    }
    for cookie in outcome.cookies {
        conn.add_cookie(cookie)?;
    }
    for (idx, dest) in &outcome.copied_tmpfiles {
        if let Some(upload) = conn.request.uploads.get(*idx) {
            fs::copy(&upload.temp_path, dest)?;
        }
    }
    conn.write(&outcome.body);
    if outcome.shutdown_requested {
        let mut tx = stop_tx;
        let _ = tx.write_all(&[1]);
    }
    Ok(())
}
