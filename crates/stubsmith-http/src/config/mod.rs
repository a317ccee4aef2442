//! Configuration: process settings and the YAML stub front-end.

mod parser;
pub mod yaml;

use std::net::SocketAddr;
use std::path::PathBuf;

pub use parser::{ParsedConfig, StubParser, YamlParser};

pub use crate::matching::MatchCacheConfig;
pub use crate::scanner::ScannerConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Everything the binary needs to start a stub server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Primary YAML stub file
    pub config_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub admin_port: u16,
    pub admin_enabled: bool,
    /// Start the reload scanners
    pub watch: bool,
    pub scanner: ScannerConfig,
    pub cache: MatchCacheConfig,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            host: "0.0.0.0".to_string(),
            port: 8882,
            admin_port: 8889,
            admin_enabled: true,
            watch: false,
            scanner: ScannerConfig::default(),
            cache: MatchCacheConfig::default(),
            log_format: LogFormat::Text,
        }
    }

    pub fn stub_addr(&self) -> anyhow::Result<SocketAddr> {
        Self::addr(&self.host, self.port)
    }

    pub fn admin_addr(&self) -> anyhow::Result<SocketAddr> {
        Self::addr(&self.host, self.admin_port)
    }

    fn addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
        format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {host}:{port}: {e}"))
    }
}
