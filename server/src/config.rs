use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl ServerConfig {
    /// Read `HOST` and `PORT` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = lookup("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());

        let ip = host
            .parse::<IpAddr>()
            .with_context(|| format!("HOST must be an IP address, got {host:?}"))?;
        let port = port
            .parse::<u16>()
            .with_context(|| format!("PORT must be a port number, got {port:?}"))?;

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
        })
    }
}
