//! Command line interface

use clap::Parser;
use std::path::PathBuf;

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(
    name = "qserv",
    about = "Configurable static file server",
    disable_version_flag = true
)]
pub struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host address to bind
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Root directory to serve
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<String>,

    /// Enable directory listing
    #[arg(short, long)]
    pub list: bool,

    /// Write an example configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub generate_config: Option<PathBuf>,

    /// Print version and exit
    #[arg(short = 'V', long)]
    pub version: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            host: self.host.clone(),
            root_dir: self.dir.clone(),
            directory_listing: self.list,
        }
    }
}

pub fn version_string() -> String {
    format!("qserv version {}", env!("CARGO_PKG_VERSION"))
}
