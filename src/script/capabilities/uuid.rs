//! `server.uuid()` / `server.uuid62()` — version-4 UUIDs, the latter
//! base62-encoded for use in URL path segments without escaping.

use crate::prelude::*;

const BASE62_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    server.set("uuid", lua.create_function(|_, ()| Ok(uuid::Uuid::new_v4().to_string()))?)?;
    server.set(
        "uuid62",
        lua.create_function(|_, ()| Ok(to_base62(uuid::Uuid::new_v4().as_u128())))?,
    )?;
    Ok(())
}

fn to_base62(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE62_ALPHABET[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_round_trips_length() {
        let s = to_base62(u128::MAX);
        assert!(s.chars().all(|c| BASE62_ALPHABET.contains(&(c as u8))));
    }
}
