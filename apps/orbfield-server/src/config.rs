use clap::Parser;
use std::path::PathBuf;

/// Serves module scripts under `/require/` and static files from `--root`.
#[derive(Parser, Debug, Clone)]
#[command(name = "orbfield-server", about = "On-demand module server")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 80)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "ORBFIELD_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding module sources and static files
    #[arg(short, long, env = "ORBFIELD_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "orbfield_server=debug,orbfield_bundle=debug,tower_http=debug"
        } else {
            "orbfield_server=info,orbfield_bundle=info,tower_http=info"
        }
    }
}
