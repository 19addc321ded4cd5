use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::converter::ConverterConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Sanitized config for API responses (filesystem layout hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub converter: SanitizedConverterConfig,
}

/// Converter settings safe to expose over the API.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConverterConfig {
    pub engine_path: PathBuf,
    pub timeout_secs: u64,
    pub stale_workspace_secs: u64,
    pub pdf_paper_size: String,
    /// Only the number of extra args is exposed, not their values.
    pub extra_engine_args: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            converter: SanitizedConverterConfig {
                engine_path: config.converter.engine_path.clone(),
                timeout_secs: config.converter.timeout_secs,
                stale_workspace_secs: config.converter.stale_workspace_secs,
                pdf_paper_size: config.converter.pdf_paper_size.clone(),
                extra_engine_args: config.converter.extra_engine_args.len(),
            },
        }
    }
}
