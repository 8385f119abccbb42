use anyhow::{Context, Result};
use clap::Args;
use dql_executor::QueryClientConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Proxy settings. Loaded from an optional JSON file, then overridden by
/// command-line flags and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dt_url: Option<String>,
    pub dt_token: Option<String>,
    pub org_bearer: Option<String>,
    pub query_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dt_url: None,
            dt_token: None,
            org_bearer: None,
            query_timeout_secs: 30,
            cache_ttl_secs: 30,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// Configuration file path (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base URL of the Grail environment
    #[arg(long, env = "DT_URL")]
    pub dt_url: Option<String>,

    /// API token used against the Grail environment
    #[arg(long, env = "DT_TOKEN", hide_env_values = true)]
    pub dt_token: Option<String>,

    /// Bearer token clients must present (disabled when unset)
    #[arg(long, env = "ORG_BEARER", hide_env_values = true)]
    pub org_bearer: Option<String>,

    /// Maximum seconds one query may run
    #[arg(long, env = "QUERY_TIMEOUT")]
    pub query_timeout: Option<u64>,

    /// Default cache TTL in seconds
    #[arg(long, env = "CACHE_TTL")]
    pub cache_ttl: Option<u64>,

    /// Host to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// File (if any) overlaid with flags and environment.
    pub fn resolve(args: &ConfigArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply(args);
        config.normalize();
        Ok(config)
    }

    fn apply(&mut self, args: &ConfigArgs) {
        if args.dt_url.is_some() {
            self.dt_url = args.dt_url.clone();
        }
        if args.dt_token.is_some() {
            self.dt_token = args.dt_token.clone();
        }
        if args.org_bearer.is_some() {
            self.org_bearer = args.org_bearer.clone();
        }
        if let Some(timeout) = args.query_timeout {
            self.query_timeout_secs = timeout;
        }
        if let Some(ttl) = args.cache_ttl {
            self.cache_ttl_secs = ttl;
        }
        if let Some(host) = &args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
    }

    /// Empty strings (e.g. `DT_TOKEN=`) count as unset.
    fn normalize(&mut self) {
        for value in [&mut self.dt_url, &mut self.dt_token, &mut self.org_bearer] {
            if value.as_deref().map(str::trim).map_or(false, str::is_empty) {
                *value = None;
            }
        }
        if let Some(url) = &mut self.dt_url {
            *url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upstream client settings, when both URL and token are known.
    pub fn client_config(&self) -> Option<QueryClientConfig> {
        match (&self.dt_url, &self.dt_token) {
            (Some(url), Some(token)) => {
                Some(QueryClientConfig::new(url, token).with_timeout(self.query_timeout()))
            }
            _ => None,
        }
    }
}
