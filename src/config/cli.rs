use clap::Parser;

/// Command-line flags; every flag is optional because the resolver falls
/// back to the config-script and environment layers beneath it.
#[derive(Parser, Debug)]
#[command(name = "cserve", about = "Multithreaded HTTP/1.1 server with an embedded scripting bridge")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub sslport: Option<u16>,

    #[arg(long)]
    pub sslcert: Option<String>,

    #[arg(long)]
    pub sslkey: Option<String>,

    #[arg(long)]
    pub nthreads: Option<usize>,

    #[arg(long)]
    pub userid: Option<String>,

    #[arg(long)]
    pub tmpdir: Option<String>,

    #[arg(long)]
    pub scriptdir: Option<String>,

    #[arg(long)]
    pub initscript: Option<String>,

    #[arg(long)]
    pub keepalive: Option<u64>,

    #[arg(long)]
    pub maxpost: Option<String>,

    #[arg(long)]
    pub jwtkey: Option<String>,

    #[arg(long)]
    pub loglevel: Option<String>,

    #[arg(long)]
    pub routes: Vec<String>,

    /// `name:/path/to/lib.so` entries, one per handler plugin to load.
    #[arg(long)]
    pub plugins: Vec<String>,
}
