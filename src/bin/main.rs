use clap::Parser;
use cserve::config::{self, Cli};
use cserve::error::Result;
use cserve::Server;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::resolve(&cli)?;
    Server::new(config).run()
}
