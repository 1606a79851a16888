use crate::config::value::ConfigValue;
use crate::prelude::*;
use cserve_confparse::TableValue;

struct OptionDecl {
    default: ConfigValue,
    env_var: String,
    #[allow(dead_code)]
    description: &'static str,
    value: ConfigValue,
}

/// Layered option resolution: declared default → config-script → env var →
/// command line, lowest to highest precedence. Each layer, when present,
/// overwrites the stored value typed against the option's default.
pub struct ConfigResolver {
    options: HashMap<String, OptionDecl>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        ConfigResolver {
            options: HashMap::new(),
        }
    }

    pub fn declare(&mut self, name: &str, default: ConfigValue, env_var: &str, description: &'static str) {
        self.options.insert(
            name.to_string(),
            OptionDecl {
                value: default.clone(),
                default,
                env_var: env_var.to_string(),
                description,
            },
        );
    }

    /// Applies the config-script layer: `table` is the contents of the
    /// top-level `cserve` mapping, keys matching declared option names.
    pub fn apply_script_table(&mut self, table: &TableValue) -> Result<()> {
        let Some(map) = table.as_map() else {
            return Err(CserveError::ConfigError("config-script root is not a mapping".into()));
        };
        for (key, value) in map {
            let Some(opt) = self.options.get_mut(key.as_str()) else {
                continue;
            };
            opt.value = table_value_to_config(value, &opt.default)?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        for opt in self.options.values_mut() {
            if let Ok(raw) = std::env::var(&opt.env_var) {
                opt.value = ConfigValue::parse_like(&raw, &opt.default)?;
            }
        }
        Ok(())
    }

    /// Applies one already-typed CLI-sourced value, the highest-precedence
    /// layer.
    pub fn apply_cli_value(&mut self, name: &str, raw: &str) -> Result<()> {
        if let Some(opt) = self.options.get_mut(name) {
            opt.value = ConfigValue::parse_like(raw, &opt.default)?;
        }
        Ok(())
    }

    /// Typed accessor: present iff the stored value's variant matches `T`.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.options.get(name).and_then(|o| o.value.as_int())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(|o| o.value.as_str())
    }

    pub fn get_data_size(&self, name: &str) -> Option<u64> {
        self.options.get(name).and_then(|o| o.value.as_data_size())
    }

    pub fn get_log_level(&self, name: &str) -> Option<cserve_log::Level> {
        self.options.get(name).and_then(|o| o.value.as_log_level())
    }

    pub fn get_route_list(&self, name: &str) -> Option<&[crate::config::value::RouteSpec]> {
        self.options.get(name).and_then(|o| o.value.as_route_list())
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn table_value_to_config(value: &TableValue, like: &ConfigValue) -> Result<ConfigValue> {
    match (value, like) {
        (TableValue::List(items), ConfigValue::RouteList(_)) => {
            let routes = items
                .iter()
                .filter_map(|v| v.as_scalar())
                .map(crate::config::value::RouteSpec::parse)
                .collect::<Result<Vec<_>>>()?;
            Ok(ConfigValue::RouteList(routes))
        }
        (TableValue::Scalar(s), _) => ConfigValue::parse_like(s, like),
        _ => Err(CserveError::ConfigError("unsupported config-script value shape".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_env_overrides_default_and_script() {
        let mut r = ConfigResolver::new();
        r.declare("port", ConfigValue::Int(8080), "CSERVE_PORT", "plain http port");
        assert_eq!(r.get_int("port"), Some(8080));

        let script = cserve_confparse::parse("port: 9090\n").unwrap();
        r.apply_script_table(&script).unwrap();
        assert_eq!(r.get_int("port"), Some(9090));

        unsafe { std::env::set_var("CSERVE_PORT", "7070") };
        r.apply_env().unwrap();
        assert_eq!(r.get_int("port"), Some(7070));
        unsafe { std::env::remove_var("CSERVE_PORT") };

        r.apply_cli_value("port", "6060").unwrap();
        assert_eq!(r.get_int("port"), Some(6060));
    }

    #[test]
    fn type_mismatch_returns_none() {
        let mut r = ConfigResolver::new();
        r.declare("tmpdir", ConfigValue::String("/tmp".into()), "CSERVE_TMPDIR", "upload scratch dir");
        assert_eq!(r.get_int("tmpdir"), None);
        assert_eq!(r.get_str("tmpdir"), Some("/tmp"));
    }
}
