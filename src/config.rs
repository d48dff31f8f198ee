//! Runtime configuration resolved once at startup.
//!
//! Precedence for the endpoint: `--endpoint` flag > `DESIGN_MCP_ENDPOINT` >
//! built-in default.

use std::time::Duration;

use anyhow::{Result, bail};

use crate::mcp::{self, Endpoint};

pub const ENDPOINT_ENV: &str = "DESIGN_MCP_ENDPOINT";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub connect_timeout: Duration,
}

impl Config {
    /// Resolve from CLI values and the process environment.
    pub fn resolve(endpoint_flag: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let env = std::env::var(ENDPOINT_ENV).ok();
        Self::resolve_with(endpoint_flag, env.as_deref(), timeout_secs)
    }

    fn resolve_with(
        endpoint_flag: Option<&str>,
        endpoint_env: Option<&str>,
        timeout_secs: u64,
    ) -> Result<Self> {
        if timeout_secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        let raw = endpoint_flag
            .or(endpoint_env)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let endpoint = match raw {
            Some(raw) => mcp::parse_endpoint(raw)?,
            None => Endpoint::default(),
        };
        Ok(Config {
            endpoint,
            connect_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: Endpoint::default(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
