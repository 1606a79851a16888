//! Embeds one `mlua::Lua` instance per request and wires the `server`
//! table: request metadata plus the capability functions scripts call.

use crate::config::RuntimeConfig;
use crate::http::{Request, UploadedFile};
use crate::prelude::*;
use crate::script::capabilities;
use crate::script::value::{from_lua, to_lua, LuaValue};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything a running chunk can have done to the in-flight response,
/// collected here rather than handed a live `Connection` so the Lua
/// closures stay `'static` and `Send`-free (one interpreter per thread,
/// never shared).
#[derive(Debug, Default)]
pub struct ScriptOutcome {
    pub body: Vec<u8>,
    pub status: Option<(u16, Option<String>)>,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<crate::http::SetCookie>,
    pub buffered: Option<(usize, usize)>,
    pub copied_tmpfiles: Vec<(usize, PathBuf)>,
    pub shutdown_requested: bool,
}

pub struct ScriptBridge {
    lua: mlua::Lua,
    outcome: Rc<RefCell<ScriptOutcome>>,
}

impl ScriptBridge {
    pub fn new(request: &Request, uploads: &[UploadedFile], config: &RuntimeConfig) -> Result<Self> {
        let lua = mlua::Lua::new();
        let outcome = Rc::new(RefCell::new(ScriptOutcome::default()));

        let server = lua.create_table()?;
        server.set("method", request.method.as_str())?;
        server.set("uri", request.path.clone())?;
        server.set("path", request.path.clone())?;
        server.set("host", request.host.clone())?;
        server.set("peer_ip", request.peer_ip.clone())?;
        server.set("peer_port", request.peer_port)?;
        server.set("secure", request.secure)?;

        let params = lua.create_table()?;
        for (k, v) in request.params() {
            params.set(k, v)?;
        }
        server.set("params", params)?;

        let cookies = lua.create_table()?;
        for (k, v) in &request.cookies {
            cookies.set(k.as_str(), v.as_str())?;
        }
        server.set("cookies", cookies)?;

        let files = lua.create_table()?;
        for (idx, upload) in uploads.iter().enumerate() {
            let entry = lua.create_table()?;
            entry.set("field", upload.field_name.clone())?;
            entry.set("filename", upload.original_name.clone())?;
            entry.set("content_type", upload.mime_type.clone())?;
            entry.set("size", upload.size_bytes as i64)?;
            files.set(idx + 1, entry)?;
        }
        server.set("files", files)?;

        register_output_capabilities(&lua, &server, Rc::clone(&outcome))?;
        capabilities::fs::register(&lua, &server)?;
        capabilities::http_client::register(&lua, &server)?;
        capabilities::jwt::register(&lua, &server, config.jwtkey.clone())?;
        capabilities::json_table::register(&lua, &server)?;
        capabilities::uuid::register(&lua, &server)?;
        capabilities::mime::register(&lua, &server)?;
        capabilities::sqlite::register(&lua, &server)?;
        capabilities::auth::register(&lua, &server, request)?;
        capabilities::systime::register(&lua, &server)?;

        lua.globals().set("server", server)?;

        Ok(ScriptBridge { lua, outcome })
    }

    /// Runs a complete script. The chunk's numeric return value (if any)
    /// becomes the reported status.
    pub fn execute_chunk(&self, source: &str, origin: &str) -> Result<i64> {
        let value: mlua::Value = self
            .lua
            .load(source)
            .set_name(origin)
            .eval()
            .map_err(CserveError::from)?;
        Ok(match from_lua(&value).map_err(CserveError::from)? {
            LuaValue::Int(i) => i,
            _ => 0,
        })
    }

    /// Calls a previously-defined global function by name with marshalled
    /// arguments, returning its marshalled results.
    pub fn execute_function(&self, name: &str, args: Vec<LuaValue>) -> Result<Vec<LuaValue>> {
        let func: mlua::Function = self
            .lua
            .globals()
            .get(name)
            .map_err(CserveError::from)?;
        let lua_args = args
            .iter()
            .map(|a| to_lua(&self.lua, a))
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(CserveError::from)?;
        let results: mlua::MultiValue = func
            .call(mlua::MultiValue::from_vec(lua_args))
            .map_err(CserveError::from)?;
        results
            .iter()
            .map(from_lua)
            .collect::<mlua::Result<Vec<_>>>()
            .map_err(CserveError::from)
    }

    pub fn into_outcome(self) -> ScriptOutcome {
        Rc::try_unwrap(self.outcome)
            .map(RefCell::into_inner)
            .unwrap_or_default()
    }
}

fn register_output_capabilities(
    lua: &mlua::Lua,
    server: &mlua::Table,
    outcome: Rc<RefCell<ScriptOutcome>>,
) -> Result<()> {
    let o = Rc::clone(&outcome);
    let print = lua.create_function(move |_, args: mlua::Variadic<mlua::Value>| {
        let mut out = o.borrow_mut();
        for (idx, arg) in args.iter().enumerate() {
            if idx > 0 {
                out.body.push(b' ');
            }
            out.body.extend_from_slice(lua_to_display(arg).as_bytes());
        }
        Ok(())
    })?;
    server.set("print", print)?;

    let o = Rc::clone(&outcome);
    let set_buffer = lua.create_function(move |_, (size, inc): (Option<usize>, Option<usize>)| {
        outcome_set_buffer(&o, size.unwrap_or(8192), inc.unwrap_or(4096));
        Ok(())
    })?;
    server.set("setBuffer", set_buffer)?;

    let o = Rc::clone(&outcome);
    let send_header = lua.create_function(move |_, (k, v): (String, String)| {
        o.borrow_mut().headers.push((k, v));
        Ok(())
    })?;
    server.set("sendHeader", send_header)?;

    let o = Rc::clone(&outcome);
    let send_status = lua.create_function(move |_, (code, text): (u16, Option<String>)| {
        o.borrow_mut().status = Some((code, text));
        Ok(())
    })?;
    server.set("sendStatus", send_status)?;

    let o = Rc::clone(&outcome);
    let send_cookie = lua.create_function(move |_, (k, v, opts): (String, String, Option<mlua::Table>)| {
        let mut cookie = crate::http::SetCookie::new(&k, &v);
        if let Some(opts) = opts {
            if let Ok(path) = opts.get::<String>("path") {
                cookie = cookie.path(path);
            }
            if let Ok(domain) = opts.get::<String>("domain") {
                cookie = cookie.domain(domain);
            }
            if let Ok(max_age) = opts.get::<i64>("expires") {
                cookie = cookie.max_age(max_age);
            }
            if opts.get::<bool>("secure").unwrap_or(false) {
                cookie = cookie.secure();
            }
            if opts.get::<bool>("http_only").unwrap_or(false) {
                cookie = cookie.http_only();
            }
        }
        o.borrow_mut().cookies.push(cookie);
        Ok(())
    })?;
    server.set("sendCookie", send_cookie)?;

    let o = Rc::clone(&outcome);
    let copy_tmpfile = lua.create_function(move |_, (idx, path): (usize, String)| {
        o.borrow_mut().copied_tmpfiles.push((idx, PathBuf::from(path)));
        Ok(())
    })?;
    server.set("copyTmpfile", copy_tmpfile)?;

    let o = Rc::clone(&outcome);
    let log = lua.create_function(move |_, (msg, level): (String, Option<String>)| {
        match level.as_deref() {
            Some("error") => cserve_log::err!("{msg}"),
            Some("warn") => cserve_log::warn!("{msg}"),
            Some("debug") => cserve_log::debug!("{msg}"),
            _ => cserve_log::info!("{msg}"),
        }
        let _ = &o;
        Ok(())
    })?;
    server.set("log", log)?;

    let o = Rc::clone(&outcome);
    let shutdown = lua.create_function(move |_, ()| {
        o.borrow_mut().shutdown_requested = true;
        Ok(())
    })?;
    server.set("shutdown", shutdown)?;

    Ok(())
}

fn outcome_set_buffer(outcome: &Rc<RefCell<ScriptOutcome>>, size: usize, inc: usize) {
    outcome.borrow_mut().buffered = Some((size, inc));
}

fn lua_to_display(value: &mlua::Value) -> String {
    match value {
        mlua::Value::String(s) => s.to_str().map(|s| s.to_string()).unwrap_or_default(),
        mlua::Value::Integer(i) => i.to_string(),
        mlua::Value::Number(f) => f.to_string(),
        mlua::Value::Boolean(b) => b.to_string(),
        mlua::Value::Nil => "nil".to_string(),
        other => format!("{other:?}"),
    }
}
