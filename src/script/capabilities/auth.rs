//! `server.requireAuth()` — parses the inbound `Authorization` header into
//! the `{status, username?, password?, token?}` shape scripts branch on.

use crate::http::Request;
use crate::prelude::*;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

pub fn register(lua: &mlua::Lua, server: &mlua::Table, request: &Request) -> Result<()> {
    let header = request.header("authorization").map(str::to_string);
    let require_auth = lua.create_function(move |lua, ()| {
        let table = lua.create_table()?;
        match &header {
            None => table.set("status", "NOAUTH")?,
            Some(value) => match parse_authorization(value) {
                Some(AuthResult::Basic { username, password }) => {
                    table.set("status", "BASIC")?;
                    table.set("username", username)?;
                    table.set("password", password)?;
                }
                Some(AuthResult::Bearer { token }) => {
                    table.set("status", "BEARER")?;
                    table.set("token", token)?;
                }
                None => table.set("status", "ERROR")?,
            },
        }
        Ok(table)
    })?;
    server.set("requireAuth", require_auth)?;
    Ok(())
}

enum AuthResult {
    Basic { username: String, password: String },
    Bearer { token: String },
}

fn parse_authorization(header: &str) -> Option<AuthResult> {
    let (scheme, rest) = header.split_once(' ')?;
    match scheme.to_ascii_lowercase().as_str() {
        "basic" => {
            let decoded = B64.decode(rest.trim()).ok()?;
            let text = String::from_utf8(decoded).ok()?;
            let (username, password) = text.split_once(':')?;
            Some(AuthResult::Basic {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        "bearer" => Some(AuthResult::Bearer {
            token: rest.trim().to_string(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_basic_credentials() {
        let header = format!("Basic {}", B64.encode("alice:secret"));
        match parse_authorization(&header) {
            Some(AuthResult::Basic { username, password }) => {
                assert_eq!(username, "alice");
                assert_eq!(password, "secret");
            }
            _ => panic!("expected basic auth"),
        }
    }

    #[test]
    fn passes_through_bearer_tokens() {
        match parse_authorization("Bearer abc123") {
            Some(AuthResult::Bearer { token }) => assert_eq!(token, "abc123"),
            _ => panic!("expected bearer auth"),
        }
    }
}
