use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub provider: ProviderConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Hide upstream error details from clients
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            production: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub binary: String,
    /// Arguments placed before yt-dlp's own, e.g. `["-m", "yt_dlp"]` with `python3`
    pub args: Vec<String>,
    pub metadata_timeout_secs: u64,
    /// Hosts accepted as video sources. Subdomains match too. Empty accepts any host.
    ///
    /// Defaults to the YouTube hosts, so any other site (for example
    /// `https://example.com/watch?v=...`) is rejected as unsupported until it
    /// is listed here or the list is emptied.
    pub allowed_hosts: Vec<String>,
    pub relay_buffer_chunks: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            args: Vec::new(),
            metadata_timeout_secs: 30,
            allowed_hosts: vec![
                "youtube.com".to_string(),
                "youtu.be".to_string(),
                "youtube-nocookie.com".to_string(),
            ],
            relay_buffer_chunks: 8,
        }
    }
}

impl ProviderConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs.max(1))
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.provider.binary.trim().is_empty() {
            anyhow::bail!("provider.binary must not be empty");
        }
        if self.provider.relay_buffer_chunks == 0 {
            anyhow::bail!("provider.relay_buffer_chunks must be at least 1");
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => anyhow::bail!("Unknown logging format: {}", other),
        }
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .with_context(|| format!("Invalid listen address {}", addr))
    }
}
