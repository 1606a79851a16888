//! `server.generate_jwt` / `server.decode_jwt` — HS256 only, matching the
//! configured `jwtkey` secret.

use crate::prelude::*;
use crate::script::capabilities::json_table::{json_to_lua, lua_to_json};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn register(lua: &mlua::Lua, server: &mlua::Table, secret: String) -> Result<()> {
    let key = secret.clone();
    let generate = lua.create_function(move |lua, claims: mlua::Table| {
        let payload = lua_to_json(&mlua::Value::Table(claims))?;
        Ok(match sign(&key, &payload) {
            Ok(token) => (true, mlua::Value::String(lua.create_string(token)?)),
            Err(e) => (false, mlua::Value::String(lua.create_string(e.to_string())?)),
        })
    })?;
    server.set("generate_jwt", generate)?;

    let key = secret;
    let decode = lua.create_function(move |lua, token: String| {
        Ok(match verify(&key, &token) {
            Ok(payload) => (true, json_to_lua(lua, &payload)?),
            Err(e) => (false, mlua::Value::String(lua.create_string(e.to_string())?)),
        })
    })?;
    server.set("decode_jwt", decode)?;
    Ok(())
}

fn sign(secret: &str, claims: &serde_json::Value) -> Result<String> {
    let header = serde_json::json!({"alg": "HS256", "typ": "JWT"});
    let header_b64 = B64.encode(header.to_string());
    let claims_b64 = B64.encode(claims.to_string());
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CserveError::CapabilityError(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let sig = B64.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig}"))
}

/// Verifies the HS256 signature and, when present, the `exp` claim.
/// `iss`/`sub`/`aud`/`nbf`/`iat`/`jti` round-trip as plain claims; the
/// contract only requires this capability to police expiry.
fn verify(secret: &str, token: &str) -> Result<serde_json::Value> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(c), Some(s)) => (h, c, s),
        _ => return Err(CserveError::CapabilityError("malformed jwt".into())),
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CserveError::CapabilityError(e.to_string()))?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    let expected = B64.encode(mac.finalize().into_bytes());
    if expected != sig_b64 {
        return Err(CserveError::CapabilityError("jwt signature mismatch".into()));
    }

    let claims_json = B64
        .decode(claims_b64)
        .map_err(|e| CserveError::CapabilityError(e.to_string()))?;
    let claims: serde_json::Value =
        serde_json::from_slice(&claims_json).map_err(|e| CserveError::CapabilityError(e.to_string()))?;

    if let Some(exp) = claims.get("exp").and_then(|v| v.as_i64()) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        if now > exp {
            return Err(CserveError::CapabilityError("jwt has expired".into()));
        }
    }

    Ok(claims)
}
