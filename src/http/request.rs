use crate::http::multipart::{parse_multipart, UploadedFile};
use crate::prelude::*;
use crate::wire::{find_subsequence, WireCodec};

const MAX_LINE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Trace,
    Connect,
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Other(s) => s.as_str(),
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable-after-parse request record; see the data model for field
/// semantics.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub host: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub content_type: Option<String>,
    pub content_length: Option<usize>,
    pub raw_body: Vec<u8>,
    pub post_params: HashMap<String, String>,
    pub uploads: Vec<UploadedFile>,
    pub peer_ip: String,
    pub peer_port: u16,
    pub secure: bool,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// Combined request parameters: post params as the base, overridden by
    /// any query parameter of the same name.
    pub fn params(&self) -> HashMap<String, String> {
        let mut merged = self.post_params.clone();
        for (k, v) in &self.query {
            merged.insert(k.clone(), v.clone());
        }
        merged
    }
}

/// Parses one HTTP/1.1 request off `wire`, blocking as needed for more
/// bytes. `max_post_size` bounds both fixed and chunked bodies;
/// `tmp_dir` is where multipart file parts are streamed.
pub fn parse_request(
    wire: &mut WireCodec,
    peer_ip: String,
    peer_port: u16,
    secure: bool,
    max_post_size: usize,
    tmp_dir: &Path,
) -> Result<Request> {
    let request_line = wire.read_until(b"\r\n", MAX_LINE).or_else(|_| wire.read_until(b"\n", MAX_LINE))?;
    let line = std::str::from_utf8(&request_line)
        .map_err(|_| CserveError::ProtocolError("request line is not valid utf-8".into()))?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(CserveError::ProtocolError("malformed request line".into()));
    }
    if parts[1].len() > 64 * 1024 {
        return Err(CserveError::ProtocolError("request uri too long".into()));
    }
    let method: Method = parts[0].parse().unwrap();
    let (path, query) = split_uri(parts[1]);

    let mut headers = HashMap::new();
    loop {
        let raw = wire.read_until(b"\r\n", MAX_LINE).or_else(|_| wire.read_until(b"\n", MAX_LINE))?;
        if raw.is_empty() {
            break;
        }
        let line = std::str::from_utf8(&raw)
            .map_err(|_| CserveError::ProtocolError("header is not valid utf-8".into()))?;
        let Some(sep) = line.find(':') else {
            return Err(CserveError::ProtocolError("malformed header line".into()));
        };
        let key = line[..sep].trim().to_ascii_lowercase();
        let val = line[sep + 1..].trim().to_string();
        headers.insert(key, val);
    }

    let host = headers.get("host").cloned().unwrap_or_default();
    let cookies = headers
        .get("cookie")
        .map(|h| parse_cookie_header(h))
        .unwrap_or_default();
    let content_type = headers.get("content-type").cloned();
    let content_length = headers.get("content-length").and_then(|v| v.parse::<usize>().ok());
    let is_chunked = headers
        .get("transfer-encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    if !is_chunked {
        if let Some(len) = content_length {
            if len > max_post_size {
                return Err(CserveError::ProtocolError("payload too large".into()));
            }
        }
    }

    let body = if is_chunked {
        read_chunked_body(wire, max_post_size)?
    } else {
        match content_length {
            Some(len) if len > 0 => wire.read_exact(len)?,
            _ => Vec::new(),
        }
    };

    let mut post_params = HashMap::new();
    let mut raw_body = Vec::new();
    let mut uploads = Vec::new();

    match content_type.as_deref() {
        Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
            post_params = parse_query_string(std::str::from_utf8(&body).unwrap_or(""), true);
        }
        Some(ct) if ct.contains("multipart/form-data") => {
            let boundary = ct
                .split("boundary=")
                .nth(1)
                .map(|b| b.trim_matches('"').to_string())
                .ok_or_else(|| CserveError::ProtocolError("missing multipart boundary".into()))?;
            let (fields, files) = parse_multipart(&body, &boundary, tmp_dir)?;
            post_params = fields;
            uploads = files;
        }
        _ => raw_body = body,
    }

    Ok(Request {
        method,
        host,
        path,
        query,
        headers,
        cookies,
        content_type,
        content_length,
        raw_body,
        post_params,
        uploads,
        peer_ip,
        peer_port,
        secure,
    })
}

fn split_uri(uri: &str) -> (String, HashMap<String, String>) {
    match uri.split_once('?') {
        Some((path, qs)) => (url_decode(path, false), parse_query_string(qs, true)),
        None => (url_decode(uri, false), HashMap::new()),
    }
}

pub fn parse_query_string(qs: &str, form_encoded: bool) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if qs.is_empty() {
        return map;
    }
    for pair in qs.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (url_decode(k, form_encoded), url_decode(v, form_encoded)),
            None => (url_decode(pair, form_encoded), String::new()),
        };
        map.insert(k, v);
    }
    map
}

fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for part in header.split(';') {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=') {
            map.insert(url_decode(k, false), url_decode(v, false));
        }
    }
    map
}

/// Decodes `%HH` escapes (case-insensitive); when `form_encoded`, `+` also
/// decodes to space. Invalid `%` escapes are preserved verbatim.
pub fn url_decode(input: &str, form_encoded: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = &input[i + 1..i + 3];
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            b'+' if form_encoded => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits a header-option value like `form-data; name="x"; filename="y.png"`
/// into a lowercase-keyed option map; quotes are stripped from values.
pub fn parse_header_options(value: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (i, component) in value.split(';').enumerate() {
        let component = component.trim();
        if i == 0 {
            map.insert("_disposition".to_string(), component.to_string());
            continue;
        }
        if let Some((k, v)) = component.split_once('=') {
            map.insert(k.trim().to_ascii_lowercase(), strip_quotes(v.trim()));
        }
    }
    map
}

fn strip_quotes(s: &str) -> String {
    s.trim_matches('"').to_string()
}

fn read_chunked_body(wire: &mut WireCodec, max_post_size: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let size_line = wire.read_until(b"\r\n", 32)?;
        let hex_str = std::str::from_utf8(&size_line)
            .map_err(|_| CserveError::ProtocolError("invalid chunk size".into()))?;
        let hex_str = hex_str.split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(hex_str, 16)
            .map_err(|_| CserveError::ProtocolError("invalid chunk size".into()))?;
        if chunk_size == 0 {
            loop {
                let trailer = wire.read_until(b"\r\n", MAX_LINE)?;
                if trailer.is_empty() {
                    break;
                }
            }
            break;
        }
        if body.len() + chunk_size > max_post_size {
            return Err(CserveError::ProtocolError("payload too large".into()));
        }
        let chunk = wire.read_exact(chunk_size)?;
        body.extend_from_slice(&chunk);
        let crlf = wire.read_exact(2)?;
        if crlf != b"\r\n" {
            return Err(CserveError::ProtocolError("malformed chunk terminator".into()));
        }
    }
    Ok(body)
}

/// Finds a subsequence, re-exported for the multipart parser's boundary
/// scanning (shares the wire-level implementation rather than duplicating
/// the byte-search loop).
pub fn find_in(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    find_subsequence(haystack, needle, from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_and_plus() {
        assert_eq!(url_decode("a%20b", false), "a b");
        assert_eq!(url_decode("a+b", true), "a b");
        assert_eq!(url_decode("a+b", false), "a+b");
    }

    #[test]
    fn preserves_invalid_escapes() {
        assert_eq!(url_decode("100%", false), "100%");
        assert_eq!(url_decode("%zz", false), "%zz");
    }

    #[test]
    fn parses_query_string_last_wins() {
        let q = parse_query_string("a=1&a=2&b", true);
        assert_eq!(q.get("a").unwrap(), "2");
        assert_eq!(q.get("b").unwrap(), "");
    }

    #[test]
    fn parses_header_options() {
        let opts = parse_header_options("form-data; name=\"file\"; filename=\"x.png\"");
        assert_eq!(opts.get("name").unwrap(), "file");
        assert_eq!(opts.get("filename").unwrap(), "x.png");
    }
}
