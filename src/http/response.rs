use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Fixed,
    Chunked,
    Buffered,
}

#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
}

impl SetCookie {
    pub fn new(name: &str, value: &str) -> Self {
        SetCookie {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            domain: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn to_header(&self) -> String {
        let mut header = format!("{}={}; Path={}", self.name, self.value, self.path);
        if let Some(domain) = &self.domain {
            header.push_str(&format!("; Domain={domain}"));
        }
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

/// Status code, output headers, cookies, transfer mode, and the output
/// buffer. `header_sent` is monotonic: once true, no more headers may be
/// added.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub cookies: Vec<SetCookie>,
    pub mode: TransferMode,
    pub body: Vec<u8>,
    pub header_sent: bool,
}

impl Response {
    pub fn new() -> Self {
        Response {
            status_code: 200,
            status_text: status_text(200).to_string(),
            headers: HashMap::new(),
            cookies: Vec::new(),
            mode: TransferMode::Buffered,
            body: Vec::new(),
            header_sent: false,
        }
    }

    pub fn set_status(&mut self, code: u16, phrase: Option<&str>) {
        self.status_code = code;
        self.status_text = phrase.map(str::to_string).unwrap_or_else(|| status_text(code).to_string());
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.header_sent {
            return Err(CserveError::HandlerError(
                "cannot add headers after they have been sent".into(),
            ));
        }
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn add_cookie(&mut self, cookie: SetCookie) -> Result<()> {
        if self.header_sent {
            return Err(CserveError::HandlerError(
                "cannot add cookies after headers have been sent".into(),
            ));
        }
        self.cookies.push(cookie);
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    /// Serialises status line, headers, and body into wire bytes; marks
    /// `header_sent`. For `Chunked` mode the body is wrapped as a single
    /// terminal chunk — callers streaming incrementally use
    /// [`Response::chunk_bytes`] / [`Response::final_chunk_bytes`] instead.
    pub fn to_bytes(&mut self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text).into_bytes();

        match self.mode {
            TransferMode::Fixed | TransferMode::Buffered => {
                self.headers
                    .entry("content-length".to_string())
                    .or_insert_with(|| self.body.len().to_string());
            }
            TransferMode::Chunked => {
                self.headers
                    .insert("transfer-encoding".to_string(), "chunked".to_string());
            }
        }

        for (key, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", to_pascal_case(key), value).as_bytes());
        }
        for cookie in &self.cookies {
            out.extend_from_slice(format!("Set-Cookie: {}\r\n", cookie.to_header()).as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        self.header_sent = true;

        match self.mode {
            TransferMode::Chunked => {
                out.extend_from_slice(format!("{:x}\r\n", self.body.len()).as_bytes());
                out.extend_from_slice(&self.body);
                out.extend_from_slice(b"\r\n0\r\n\r\n");
            }
            _ => out.extend_from_slice(&self.body),
        }
        out
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

fn to_pascal_case(s: &str) -> String {
    s.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_mutation_rejected_after_send() {
        let mut res = Response::new();
        res.to_bytes();
        assert!(res.set_header("x", "y").is_err());
    }

    #[test]
    fn pascal_cases_header_names() {
        assert_eq!(to_pascal_case("content-type"), "Content-Type");
    }

    #[test]
    fn chunked_mode_wraps_body() {
        let mut res = Response::new();
        res.mode = TransferMode::Chunked;
        res.write(b"hi");
        let bytes = res.to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("transfer-encoding") || text.contains("Transfer-Encoding"));
        assert!(text.ends_with("2\r\nhi\r\n0\r\n\r\n"));
    }
}
