//! `server.http(...)` — a minimal synchronous HTTP/1.1 GET client, built on
//! the same blocking socket idiom as the inbound side rather than a pulled-in
//! HTTP client crate; the spec scopes this capability to GET only.
//!
//! Like every other capability, connection/timeout/protocol failures come
//! back as `(false, message)` rather than aborting the script.

use crate::prelude::*;
use std::net::TcpStream;
use std::time::Instant;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    let http = lua.create_function(
        |lua, (method, url, headers, timeout): (String, String, Option<mlua::Table>, Option<u64>)| {
            if !method.eq_ignore_ascii_case("get") {
                return Ok((false, mlua::Value::String(lua.create_string("only GET is supported")?)));
            }
            let started = Instant::now();
            match get(&url, headers, timeout.unwrap_or(10)) {
                Ok((status_code, body, resp_headers)) => {
                    let table = lua.create_table()?;
                    table.set("status_code", status_code)?;
                    table.set("body", body)?;
                    let header_table = lua.create_table()?;
                    for (k, v) in resp_headers {
                        header_table.set(k, v)?;
                    }
                    table.set("header", header_table)?;
                    table.set("duration", started.elapsed().as_secs_f64())?;
                    Ok((true, mlua::Value::Table(table)))
                }
                Err(e) => Ok((false, mlua::Value::String(lua.create_string(e.to_string())?))),
            }
        },
    )?;
    server.set("http", http)?;
    Ok(())
}

fn get(url: &str, headers: Option<mlua::Table>, timeout_secs: u64) -> Result<(u16, String, Vec<(String, String)>)> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| CserveError::CapabilityError("only http:// urls are supported".into()))?;
    let (authority, path) = rest.split_once('/').map(|(a, p)| (a, format!("/{p}"))).unwrap_or((rest, "/".to_string()));
    let (host, port) = authority.split_once(':').map(|(h, p)| (h, p.parse().unwrap_or(80))).unwrap_or((authority, 80));

    let mut stream = TcpStream::connect((host, port))?;
    stream.set_read_timeout(Some(Duration::from_secs(timeout_secs)))?;
    stream.set_write_timeout(Some(Duration::from_secs(timeout_secs)))?;

    let mut request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n");
    if let Some(headers) = headers {
        for pair in headers.pairs::<String, String>().flatten() {
            request.push_str(&format!("{}: {}\r\n", pair.0, pair.1));
        }
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes())?;

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;

    let header_end = crate::wire::find_subsequence(&raw, b"\r\n\r\n", 0)
        .ok_or_else(|| CserveError::CapabilityError("malformed http response".into()))?;
    let head = String::from_utf8_lossy(&raw[..header_end]);
    let mut lines = head.lines();
    let status_line = lines.next().unwrap_or_default();
    let status_code = status_line.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);

    let header_pairs = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let body = String::from_utf8_lossy(&raw[header_end + 4..]).into_owned();
    Ok((status_code, body, header_pairs))
}
