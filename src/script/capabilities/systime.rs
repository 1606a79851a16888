//! `server.systime()` — current epoch seconds. Unlike the rest of the
//! capability surface this has no failure mode, so it returns a single
//! plain value rather than a `(bool, ...)` pair.

use crate::prelude::*;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    server.set(
        "systime",
        lua.create_function(|_, ()| {
            Ok(SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs())
        })?,
    )?;
    Ok(())
}
