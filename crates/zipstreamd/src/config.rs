//! Command-line and environment configuration.
//!
//! Flags win over environment variables, which win over defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use zipstream_core::PacingConfig;

#[derive(Debug, Parser)]
#[command(name = "zipstreamd", about = "Streams resource directories as zip archives", version)]
pub struct Cli {
    /// Turn on debug logging.
    #[arg(long, env = "DEBUG_MODE")]
    pub debug_mode: bool,

    /// Delay between archive chunks, in whole seconds.
    #[arg(long, env = "RESPONSE_DELAY", default_value_t = 0, value_name = "SECS")]
    pub response_delay: u64,

    /// Directory holding one subdirectory per archive handle.
    #[arg(long, env = "FOLDER_PATH", default_value = "test_photos")]
    pub folder_path: PathBuf,

    /// Address to bind.
    #[arg(long, env = "ZIPSTREAM_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "ZIPSTREAM_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HTML page served at `/`.
    #[arg(long, env = "INDEX_PAGE", default_value = "index.html")]
    pub index_page: PathBuf,

    /// Archiving executable, invoked as `<archiver> - . -r`.
    #[arg(long, env = "ARCHIVER", default_value = "zip")]
    pub archiver: PathBuf,
}

impl Cli {
    pub fn pacing(&self) -> PacingConfig {
        PacingConfig::from_secs(self.response_delay)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug_mode {
            "info,zipstreamd=debug,zipstream_api=debug,zipstream_core=debug"
        } else {
            "info"
        }
    }
}
