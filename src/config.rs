//! Gateway configuration
//!
//! Env-driven configuration for the HTTP server and the upstream datasheet.
//! Secrets (token, datasheet id) come from the environment only; the listen
//! address can also be set from the command line.

use crate::store::DatasheetConfig;
use crate::store::StoreResult;

/// Server-side configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to (e.g., "0.0.0.0" or "127.0.0.1").
    pub bind_address: String,
    /// Upstream datasheet credentials and location.
    pub datasheet: DatasheetConfig,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Expects:
    /// - `PORT` (optional, default 3000)
    /// - `BIND_ADDRESS` (optional, default "0.0.0.0")
    /// - `VIKA_TOKEN`, `DATASHEET_ID`, `VIKA_API_BASE` — see
    ///   [`DatasheetConfig::from_env`]
    pub fn from_env() -> StoreResult<Self> {
        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            datasheet: DatasheetConfig::from_env()?,
        })
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the bind address.
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// The full listen address (ip:port).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
