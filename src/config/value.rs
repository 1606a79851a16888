use crate::prelude::*;

/// A route-table entry as carried by `ConfigValue::RouteList`:
/// `METHOD:/path:additional_data` (the additional data is the script/plugin
/// reference dispatch looks up).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub method: String,
    pub path: String,
    pub target: String,
}

impl RouteSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(3, ':');
        let method = parts.next().ok_or_else(|| CserveError::ConfigError(format!("malformed route: {spec}")))?;
        let path = parts.next().ok_or_else(|| CserveError::ConfigError(format!("malformed route: {spec}")))?;
        let target = parts.next().ok_or_else(|| CserveError::ConfigError(format!("malformed route: {spec}")))?;
        Ok(RouteSpec {
            method: method.to_string(),
            path: path.to_string(),
            target: target.to_string(),
        })
    }
}

/// A handler plugin entry: `name:/path/to/lib.so`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub path: PathBuf,
}

impl PluginSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, path) = spec
            .split_once(':')
            .ok_or_else(|| CserveError::ConfigError(format!("malformed plugin entry: {spec}")))?;
        Ok(PluginSpec {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Sum type over every option's possible stored representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Float(f64),
    String(String),
    DataSize(u64),
    LogLevel(cserve_log::Level),
    RouteList(Vec<RouteSpec>),
}

impl ConfigValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_data_size(&self) -> Option<u64> {
        match self {
            ConfigValue::DataSize(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_log_level(&self) -> Option<cserve_log::Level> {
        match self {
            ConfigValue::LogLevel(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_route_list(&self) -> Option<&[RouteSpec]> {
        match self {
            ConfigValue::RouteList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Parses a raw string into the same variant as `like`, used when a
    /// layer (env var, CLI flag, config-script scalar) supplies a plain
    /// string that must be typed against the option's declared default.
    pub fn parse_like(raw: &str, like: &ConfigValue) -> Result<ConfigValue> {
        match like {
            ConfigValue::Int(_) => raw
                .parse::<i64>()
                .map(ConfigValue::Int)
                .map_err(|e| CserveError::ConfigError(format!("expected an integer: {e}"))),
            ConfigValue::Float(_) => raw
                .parse::<f64>()
                .map(ConfigValue::Float)
                .map_err(|e| CserveError::ConfigError(format!("expected a float: {e}"))),
            ConfigValue::String(_) => Ok(ConfigValue::String(raw.to_string())),
            ConfigValue::DataSize(_) => parse_data_size(raw).map(ConfigValue::DataSize),
            ConfigValue::LogLevel(_) => cserve_log::Level::from_name(raw)
                .map(ConfigValue::LogLevel)
                .ok_or_else(|| CserveError::ConfigError(format!("unknown log level: {raw}"))),
            ConfigValue::RouteList(_) => raw
                .split(';')
                .filter(|s| !s.is_empty())
                .map(RouteSpec::parse)
                .collect::<Result<Vec<_>>>()
                .map(ConfigValue::RouteList),
        }
    }
}

/// Parses a `DataSize` string with an optional `B/KB/MB/GB/TB` suffix
/// (powers of 1024); an unrecognised suffix is treated as plain bytes.
///
/// Like the original `data_volume`, only the leading run of digits is
/// parsed — trailing characters that aren't a recognised suffix are
/// ignored rather than rejected outright.
pub fn parse_data_size(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    let upper = raw.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("TB") {
        (d, 1024u64.pow(4))
    } else if let Some(d) = upper.strip_suffix("GB") {
        (d, 1024u64.pow(3))
    } else if let Some(d) = upper.strip_suffix("MB") {
        (d, 1024u64.pow(2))
    } else if let Some(d) = upper.strip_suffix("KB") {
        (d, 1024)
    } else if let Some(d) = upper.strip_suffix('B') {
        (d, 1)
    } else {
        (upper.as_str(), 1)
    };
    leading_digits(digits.trim())
        .ok_or_else(|| CserveError::ConfigError(format!("invalid data size '{raw}'")))
        .map(|n| n * multiplier)
}

/// Parses the leading run of ASCII digits in `s`, ignoring anything after
/// it; returns `None` if `s` doesn't start with a digit at all.
fn leading_digits(s: &str) -> Option<u64> {
    let run: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if run.is_empty() {
        None
    } else {
        run.parse::<u64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_size_suffixes() {
        assert_eq!(parse_data_size("10").unwrap(), 10);
        assert_eq!(parse_data_size("1KB").unwrap(), 1024);
        assert_eq!(parse_data_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_data_size("1TB").unwrap(), 1024u64.pow(4));
    }

    #[test]
    fn ignores_trailing_garbage_after_the_leading_digit_run() {
        assert_eq!(parse_data_size("10x").unwrap(), 10);
        assert_eq!(parse_data_size("5KBish").unwrap(), 5 * 1024);
    }

    #[test]
    fn parses_plugin_spec() {
        let p = PluginSpec::parse("iiif:/opt/cserve/plugins/libiiif.so").unwrap();
        assert_eq!(p.name, "iiif");
        assert_eq!(p.path, PathBuf::from("/opt/cserve/plugins/libiiif.so"));
    }

    #[test]
    fn parses_route_spec() {
        let r = RouteSpec::parse("GET:/hello:hello.lua").unwrap();
        assert_eq!(r.method, "GET");
        assert_eq!(r.path, "/hello");
        assert_eq!(r.target, "hello.lua");
    }
}
