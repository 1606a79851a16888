use std::fmt;

/// The seven-member error taxonomy: every failure path in the server funnels
/// into one of these variants rather than a boxed dynamic error, so callers
/// can match on what went wrong instead of formatting and hoping.
#[derive(Debug)]
pub enum CserveError {
    TransportFailure(String),
    ProtocolError(String),
    HandlerError(String),
    ConfigError(String),
    PluginError(String),
    ScriptError(String),
    CapabilityError(String),
}

impl CserveError {
    /// The status code a handler-level error should be reported as, if
    /// headers have not yet been sent.
    pub fn status_code(&self) -> u16 {
        match self {
            CserveError::TransportFailure(_) => 0,
            CserveError::ProtocolError(_) => 400,
            CserveError::HandlerError(_) => 500,
            CserveError::ConfigError(_) => 0,
            CserveError::PluginError(_) => 0,
            CserveError::ScriptError(_) => 500,
            CserveError::CapabilityError(_) => 500,
        }
    }
}

impl fmt::Display for CserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CserveError::TransportFailure(m) => write!(f, "transport failure: {m}"),
            CserveError::ProtocolError(m) => write!(f, "protocol error: {m}"),
            CserveError::HandlerError(m) => write!(f, "handler error: {m}"),
            CserveError::ConfigError(m) => write!(f, "config error: {m}"),
            CserveError::PluginError(m) => write!(f, "plugin error: {m}"),
            CserveError::ScriptError(m) => write!(f, "script error: {m}"),
            CserveError::CapabilityError(m) => write!(f, "capability error: {m}"),
        }
    }
}

impl std::error::Error for CserveError {}

impl From<std::io::Error> for CserveError {
    fn from(e: std::io::Error) -> Self {
        CserveError::TransportFailure(e.to_string())
    }
}

impl From<std::net::AddrParseError> for CserveError {
    fn from(e: std::net::AddrParseError) -> Self {
        CserveError::ConfigError(e.to_string())
    }
}

impl From<cserve_confparse::ParseError> for CserveError {
    fn from(e: cserve_confparse::ParseError) -> Self {
        CserveError::ConfigError(e.to_string())
    }
}

impl From<cserve_confparse::ConvertError> for CserveError {
    fn from(e: cserve_confparse::ConvertError) -> Self {
        CserveError::ConfigError(e.to_string())
    }
}

impl From<mlua::Error> for CserveError {
    fn from(e: mlua::Error) -> Self {
        CserveError::ScriptError(e.to_string())
    }
}

impl From<rusqlite::Error> for CserveError {
    fn from(e: rusqlite::Error) -> Self {
        CserveError::CapabilityError(e.to_string())
    }
}

impl From<String> for CserveError {
    fn from(s: String) -> Self {
        CserveError::HandlerError(s)
    }
}

impl From<&str> for CserveError {
    fn from(s: &str) -> Self {
        CserveError::HandlerError(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CserveError>;
