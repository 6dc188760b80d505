use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nptr_server::{Listen, ServerConfig};
use nptr_store::NamingScheme;

#[derive(Parser, Debug)]
#[command(
    name = "nptr",
    about = "nptr: a tiny content-addressed file drop over HTTP",
    version
)]
pub struct Cli {
    /// TOML config file; flags given here override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory to store uploaded files in (must exist)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Listen host
    #[arg(short, long)]
    pub listen: Option<IpAddr>,

    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen on a Unix domain socket instead of TCP
    #[arg(short, long, conflicts_with_all = ["listen", "port"])]
    pub socket: Option<PathBuf>,

    /// Public base URL used in upload responses
    #[arg(short, long)]
    pub addr: Option<String>,

    /// Largest accepted upload, in bytes
    #[arg(long)]
    pub max_upload_size: Option<u64>,

    /// Object naming: crc32, blake3 or random
    #[arg(long)]
    pub naming: Option<NamingScheme>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the effective server configuration.
    pub fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(dir) = self.dir {
            config.storage_root = dir;
        }
        if let Some(socket) = self.socket {
            config.listen = Listen::Unix(socket);
        } else if self.listen.is_some() || self.port.is_some() {
            let base = match config.listen {
                Listen::Tcp(addr) => addr,
                Listen::Unix(_) => ServerConfig::default_tcp_addr(),
            };
            let host = self.listen.unwrap_or(base.ip());
            let port = self.port.unwrap_or(base.port());
            config.listen = Listen::Tcp(SocketAddr::new(host, port));
        }
        if let Some(addr) = self.addr {
            config.public_url = addr;
        }
        if let Some(limit) = self.max_upload_size {
            config.max_upload_size = limit;
        }
        if let Some(naming) = self.naming {
            config.naming = naming;
        }
        Ok(config)
    }
}
