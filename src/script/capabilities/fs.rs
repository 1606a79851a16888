//! `server.fs.*` — filesystem access scoped to whatever path a script
//! passes in; the server process itself decides what's reachable via the
//! `userid`/`tmpdir`/`scriptdir` configuration, not this layer.
//!
//! Every operation returns `(success, result_or_errmsg)`: ordinary I/O
//! failures are handed back to the script as a `false` plus a message, not
//! raised as a Lua runtime error — a missing file is something a script
//! should be able to branch on, not something that aborts it.

use crate::prelude::*;
use std::fs as stdfs;
use std::os::unix::fs::PermissionsExt;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    let fs_table = lua.create_table()?;

    fs_table.set(
        "ftype",
        lua.create_function(|_, path: String| {
            Ok(match stdfs::symlink_metadata(&path) {
                Ok(m) if m.file_type().is_symlink() => (true, Some("LINK".to_string())),
                Ok(m) if m.is_dir() => (true, Some("DIRECTORY".to_string())),
                Ok(m) if m.is_file() => (true, Some("FILE".to_string())),
                Ok(_) => (true, Some("UNKNOWN".to_string())),
                Err(e) => (false, Some(e.to_string())),
            })
        })?,
    )?;

    fs_table.set(
        "modtime",
        lua.create_function(|lua, path: String| {
            Ok::<(bool, mlua::Value), mlua::Error>(match modtime_secs(&path) {
                Ok(secs) => (true, mlua::Value::Integer(secs)),
                Err(e) => (false, mlua::Value::String(lua.create_string(e.to_string())?)),
            })
        })?,
    )?;

    fs_table.set(
        "readdir",
        lua.create_function(|lua, path: String| match stdfs::read_dir(&path) {
            Ok(entries) => {
                let table = lua.create_table()?;
                for (idx, entry) in entries.flatten().enumerate() {
                    table.set(idx + 1, entry.file_name().to_string_lossy().into_owned())?;
                }
                Ok((true, mlua::Value::Table(table)))
            }
            Err(e) => Ok((false, mlua::Value::String(lua.create_string(e.to_string())?))),
        })?,
    )?;

    fs_table.set(
        "is_readable",
        lua.create_function(|_, path: String| Ok((true, access_ok(&path, 0o444))))?,
    )?;
    fs_table.set(
        "is_writeable",
        lua.create_function(|_, path: String| Ok((true, access_ok(&path, 0o222))))?,
    )?;
    fs_table.set(
        "is_executable",
        lua.create_function(|_, path: String| Ok((true, access_ok(&path, 0o111))))?,
    )?;
    fs_table.set(
        "exists",
        lua.create_function(|_, path: String| Ok((true, stdfs::metadata(&path).is_ok())))?,
    )?;
    fs_table.set(
        "unlink",
        lua.create_function(|_, path: String| Ok(as_success_pair(stdfs::remove_file(&path))))?,
    )?;
    fs_table.set(
        "mkdir",
        lua.create_function(|_, path: String| Ok(as_success_pair(stdfs::create_dir_all(&path))))?,
    )?;
    fs_table.set(
        "rmdir",
        lua.create_function(|_, path: String| Ok(as_success_pair(stdfs::remove_dir(&path))))?,
    )?;
    fs_table.set(
        "getcwd",
        lua.create_function(|_, ()| {
            Ok(match std::env::current_dir() {
                Ok(p) => (true, p.display().to_string()),
                Err(e) => (false, e.to_string()),
            })
        })?,
    )?;
    fs_table.set(
        "chdir",
        lua.create_function(|_, path: String| {
            let Ok(old) = std::env::current_dir() else {
                return Ok((false, "could not determine current directory".to_string()));
            };
            Ok(match std::env::set_current_dir(&path) {
                Ok(()) => (true, old.display().to_string()),
                Err(e) => (false, e.to_string()),
            })
        })?,
    )?;
    fs_table.set(
        "copyFile",
        lua.create_function(|_, (from, to): (String, String)| Ok(as_success_pair(stdfs::copy(&from, &to).map(|_| ()))))?,
    )?;
    fs_table.set(
        "moveFile",
        lua.create_function(|_, (from, to): (String, String)| Ok(as_success_pair(stdfs::rename(&from, &to))))?,
    )?;

    server.set("fs", fs_table)?;
    Ok(())
}

fn modtime_secs(path: &str) -> io::Result<i64> {
    let meta = stdfs::metadata(path)?;
    let modified = meta.modified()?;
    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}

/// `(true, nil)` on success, `(false, message)` on failure — the shape
/// every mutating filesystem capability returns to scripts.
fn as_success_pair(result: io::Result<()>) -> (bool, Option<String>) {
    match result {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    }
}

fn access_ok(path: &str, mask: u32) -> bool {
    stdfs::metadata(path)
        .map(|m| m.permissions().mode() & mask != 0)
        .unwrap_or(false)
}
