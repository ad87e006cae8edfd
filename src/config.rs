//! Configuration management

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::ace::composer::DEFAULT_SYSTEM_MESSAGE;
use crate::llm::DEFAULT_API_BASE;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 12003;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the completions provider (required to initialize)
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Model used for reflection and curation
    pub model: String,

    /// Master switch; a disabled engine never initializes
    pub enabled: bool,

    /// Upper bound on any single completion call
    pub request_timeout: Duration,

    /// Optional per-playbook strategy cap (oldest evicted first)
    pub max_strategies: Option<usize>,

    /// Base system message the composer builds on
    pub system_message: String,

    /// Directory for playbook snapshots (None = in-memory only)
    pub playbook_dir: Option<PathBuf>,

    /// HTTP bind address
    pub bind_addr: IpAddr,

    /// HTTP port
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            enabled: true,
            request_timeout: Duration::from_secs(30),
            max_strategies: None,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            playbook_dir: None,
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("ACE_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|k| !k.trim().is_empty());

        let api_base = lookup("ACE_API_BASE").unwrap_or(defaults.api_base);
        let model = lookup("ACE_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model);

        let enabled = lookup("ACE_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        let request_timeout = match lookup("ACE_REQUEST_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = v
                    .parse()
                    .with_context(|| format!("Invalid ACE_REQUEST_TIMEOUT_SECS: {}", v))?;
                anyhow::ensure!(secs > 0, "ACE_REQUEST_TIMEOUT_SECS must be greater than zero");
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        let max_strategies = match lookup("ACE_MAX_STRATEGIES") {
            Some(v) => Some(
                v.parse::<usize>()
                    .with_context(|| format!("Invalid ACE_MAX_STRATEGIES: {}", v))?,
            )
            .filter(|&n| n > 0),
            None => None,
        };

        let system_message = lookup("ACE_SYSTEM_MESSAGE")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.system_message);

        let playbook_dir = lookup("ACE_PLAYBOOK_DIR").map(PathBuf::from);

        let bind_addr = match lookup("ACE_BIND_ADDR") {
            Some(v) => v
                .parse()
                .with_context(|| format!("Invalid ACE_BIND_ADDR: {}", v))?,
            None => defaults.bind_addr,
        };

        let port = match lookup("ACE_PORT") {
            Some(v) => v.parse().with_context(|| format!("Invalid ACE_PORT: {}", v))?,
            None => defaults.port,
        };

        Ok(Self {
            api_key,
            api_base,
            model,
            enabled,
            request_timeout,
            max_strategies,
            system_message,
            playbook_dir,
            bind_addr,
            port,
        })
    }

    /// Socket address for the HTTP server
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
