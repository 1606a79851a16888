//! `server.parse_mimetype` / `file_mimetype` / `file_mimeconsistency` — a
//! small built-in extension table plus magic-byte sniffing for the handful
//! of upload types the consistency check cares about.

use crate::prelude::*;

pub fn register(lua: &mlua::Lua, server: &mlua::Table) -> Result<()> {
    server.set(
        "parse_mimetype",
        lua.create_function(|_, value: String| {
            let mut parts = value.splitn(2, ';');
            let full = parts.next().unwrap_or("").trim();
            let (major, minor) = full.split_once('/').unwrap_or((full, ""));
            Ok((major.to_string(), minor.to_string()))
        })?,
    )?;

    server.set(
        "file_mimetype",
        lua.create_function(|_, path: String| Ok(mimetype_for_extension(&path)))?,
    )?;

    server.set(
        "file_mimeconsistency",
        lua.create_function(|_, (path, declared): (String, String)| {
            let sniffed = sniff(&path).unwrap_or_else(|| mimetype_for_extension(&path).to_string());
            Ok(sniffed == declared)
        })?,
    )?;

    Ok(())
}

fn mimetype_for_extension(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "xml" => "application/xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Magic-byte sniffing for the formats with an unambiguous signature.
fn sniff(path: &str) -> Option<String> {
    let mut buf = [0u8; 8];
    let mut file = fs::File::open(path).ok()?;
    let n = file.read(&mut buf).ok()?;
    let head = &buf[..n];
    Some(
        if head.starts_with(b"\x89PNG") {
            "image/png"
        } else if head.starts_with(b"\xff\xd8\xff") {
            "image/jpeg"
        } else if head.starts_with(b"GIF8") {
            "image/gif"
        } else if head.starts_with(b"%PDF") {
            "application/pdf"
        } else if head.starts_with(b"PK\x03\x04") {
            "application/zip"
        } else {
            return None;
        }
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extensions_to_mimetypes() {
        assert_eq!(mimetype_for_extension("a.png"), "image/png");
        assert_eq!(mimetype_for_extension("a.unknown"), "application/octet-stream");
    }
}
