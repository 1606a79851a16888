//! Layered configuration: declared defaults, an optional config-script
//! file, environment variables, and command-line flags, in ascending
//! precedence.

mod cli;
mod resolver;
mod value;

pub use cli::Cli;
pub use resolver::ConfigResolver;
pub use value::{parse_data_size, ConfigValue, PluginSpec, RouteSpec};

use crate::prelude::*;

/// The fully-resolved set of options the rest of the server consumes; this
/// is the product of running a [`ConfigResolver`] through all four layers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub port: u16,
    pub sslport: Option<u16>,
    pub sslcert: Option<String>,
    pub sslkey: Option<String>,
    pub nthreads: usize,
    pub userid: Option<String>,
    pub tmpdir: PathBuf,
    pub scriptdir: PathBuf,
    pub initscript: Option<String>,
    pub keepalive: Duration,
    pub maxpost: u64,
    pub jwtkey: String,
    pub loglevel: cserve_log::Level,
    pub routes: Vec<RouteSpec>,
    pub plugins: Vec<PluginSpec>,
}

fn declare_defaults(resolver: &mut ConfigResolver) {
    resolver.declare("port", ConfigValue::Int(8080), "CSERVE_PORT", "plain http port");
    resolver.declare("sslport", ConfigValue::Int(0), "CSERVE_SSLPORT", "secure port, 0 disables tls");
    resolver.declare("sslcert", ConfigValue::String(String::new()), "CSERVE_SSLCERT", "tls certificate path");
    resolver.declare("sslkey", ConfigValue::String(String::new()), "CSERVE_SSLKEY", "tls private key path");
    resolver.declare("nthreads", ConfigValue::Int(4), "CSERVE_NTHREADS", "worker pool size");
    resolver.declare("userid", ConfigValue::String(String::new()), "CSERVE_USERID", "drop privileges to this user");
    resolver.declare("tmpdir", ConfigValue::String("/tmp/cserve".into()), "CSERVE_TMPDIR", "upload scratch directory");
    resolver.declare("scriptdir", ConfigValue::String("./scripts".into()), "CSERVE_SCRIPTDIR", "script search root");
    resolver.declare("initscript", ConfigValue::String(String::new()), "CSERVE_INITSCRIPT", "script run before every request");
    resolver.declare("keepalive", ConfigValue::Int(15), "CSERVE_KEEPALIVE", "keep-alive idle seconds");
    resolver.declare("maxpost", ConfigValue::DataSize(10 * 1024 * 1024), "CSERVE_MAXPOST", "body size limit");
    resolver.declare("jwtkey", ConfigValue::String(String::new()), "CSERVE_JWTKEY", "hs256 secret");
    resolver.declare("loglevel", ConfigValue::LogLevel(cserve_log::Level::Info), "CSERVE_LOGLEVEL", "one of the seven levels");
    resolver.declare("routes", ConfigValue::RouteList(Vec::new()), "CSERVE_ROUTES", "method:/path:script entries");
    resolver.declare("plugins", ConfigValue::String(String::new()), "CSERVE_PLUGINS", "name:/path/to/lib.so entries, ; separated");
}

/// Builds the resolved configuration from a parsed CLI, running the
/// config-script and environment layers underneath it.
pub fn resolve(cli: &Cli) -> Result<RuntimeConfig> {
    let mut resolver = ConfigResolver::new();
    declare_defaults(&mut resolver);

    if let Some(path) = &cli.config {
        let source = fs::read_to_string(path)?;
        let document = cserve_confparse::parse(&source)?;
        let table = document.get("cserve").unwrap_or(&document);
        resolver.apply_script_table(table)?;
    }

    resolver.apply_env()?;

    if let Some(v) = cli.port {
        resolver.apply_cli_value("port", &v.to_string())?;
    }
    if let Some(v) = cli.sslport {
        resolver.apply_cli_value("sslport", &v.to_string())?;
    }
    if let Some(v) = &cli.sslcert {
        resolver.apply_cli_value("sslcert", v)?;
    }
    if let Some(v) = &cli.sslkey {
        resolver.apply_cli_value("sslkey", v)?;
    }
    if let Some(v) = cli.nthreads {
        resolver.apply_cli_value("nthreads", &v.to_string())?;
    }
    if let Some(v) = &cli.userid {
        resolver.apply_cli_value("userid", v)?;
    }
    if let Some(v) = &cli.tmpdir {
        resolver.apply_cli_value("tmpdir", v)?;
    }
    if let Some(v) = &cli.scriptdir {
        resolver.apply_cli_value("scriptdir", v)?;
    }
    if let Some(v) = &cli.initscript {
        resolver.apply_cli_value("initscript", v)?;
    }
    if let Some(v) = cli.keepalive {
        resolver.apply_cli_value("keepalive", &v.to_string())?;
    }
    if let Some(v) = &cli.maxpost {
        resolver.apply_cli_value("maxpost", v)?;
    }
    if let Some(v) = &cli.jwtkey {
        resolver.apply_cli_value("jwtkey", v)?;
    }
    if let Some(v) = &cli.loglevel {
        resolver.apply_cli_value("loglevel", v)?;
    }
    if !cli.routes.is_empty() {
        resolver.apply_cli_value("routes", &cli.routes.join(";"))?;
    }
    if !cli.plugins.is_empty() {
        resolver.apply_cli_value("plugins", &cli.plugins.join(";"))?;
    }

    let sslport = resolver.get_int("sslport").filter(|p| *p != 0).map(|p| p as u16);
    let sslcert = resolver.get_str("sslcert").filter(|s| !s.is_empty()).map(str::to_string);
    let sslkey = resolver.get_str("sslkey").filter(|s| !s.is_empty()).map(str::to_string);
    let userid = resolver.get_str("userid").filter(|s| !s.is_empty()).map(str::to_string);
    let initscript = resolver.get_str("initscript").filter(|s| !s.is_empty()).map(str::to_string);

    Ok(RuntimeConfig {
        port: resolver.get_int("port").unwrap_or(8080) as u16,
        sslport,
        sslcert,
        sslkey,
        nthreads: resolver.get_int("nthreads").unwrap_or(4).max(1) as usize,
        userid,
        tmpdir: PathBuf::from(resolver.get_str("tmpdir").unwrap_or("/tmp/cserve")),
        scriptdir: PathBuf::from(resolver.get_str("scriptdir").unwrap_or("./scripts")),
        initscript,
        keepalive: Duration::from_secs(resolver.get_int("keepalive").unwrap_or(15).max(0) as u64),
        maxpost: resolver.get_data_size("maxpost").unwrap_or(10 * 1024 * 1024),
        jwtkey: resolver.get_str("jwtkey").unwrap_or("").to_string(),
        loglevel: resolver.get_log_level("loglevel").unwrap_or(cserve_log::Level::Info),
        routes: resolver.get_route_list("routes").unwrap_or(&[]).to_vec(),
        plugins: resolver
            .get_str("plugins")
            .unwrap_or("")
            .split(';')
            .filter(|s| !s.is_empty())
            .map(value::PluginSpec::parse)
            .collect::<Result<Vec<_>>>()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_defaults_with_empty_cli() {
        let cli = Cli {
            config: None,
            port: None,
            sslport: None,
            sslcert: None,
            sslkey: None,
            nthreads: None,
            userid: None,
            tmpdir: None,
            scriptdir: None,
            initscript: None,
            keepalive: None,
            maxpost: None,
            jwtkey: None,
            loglevel: None,
            routes: Vec::new(),
            plugins: Vec::new(),
        };
        let cfg = resolve(&cli).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.nthreads, 4);
        assert!(cfg.sslport.is_none());
    }
}
