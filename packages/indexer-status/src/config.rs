use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INDEXER_URL: &str = "https://grants-stack-indexer-v2.gitcoin.co";

/// Polygon Mumbai, retired testnet still present in the chain directory
pub const DEFAULT_EXCLUDED_CHAIN_IDS: &[u64] = &[80001];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub indexer_url: String,
    pub refresh_interval: u64,
    pub request_timeout: u64,
    pub chains_file: PathBuf,
    pub excluded_chain_ids: Vec<u64>,
    pub output_format: OutputFormat,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        let _ = dotenv::dotenv();

        let indexer_url = env::var("INDEXER_URL")
            .unwrap_or_else(|_| DEFAULT_INDEXER_URL.to_string());

        let refresh_interval = parse_refresh_interval(
            &env::var("REFRESH_INTERVAL").unwrap_or_else(|_| "10".to_string()),
        )
        .context("REFRESH_INTERVAL must be a positive number of seconds")?;

        let request_timeout = parse_request_timeout(
            &env::var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string()),
        )
        .context("REQUEST_TIMEOUT_SECS must be a positive number of seconds")?;

        let chains_file = env::var("CHAINS_FILE")
            .unwrap_or_else(|_| "chains.json".to_string())
            .into();

        let excluded_chain_ids = match env::var("EXCLUDED_CHAIN_IDS") {
            Ok(raw) => parse_chain_ids(&raw).context("EXCLUDED_CHAIN_IDS must be a comma separated list of chain ids")?,
            Err(_) => DEFAULT_EXCLUDED_CHAIN_IDS.to_vec(),
        };

        let output_format = match env::var("OUTPUT_FORMAT")
            .unwrap_or_else(|_| "table".to_string())
            .to_lowercase()
            .as_str()
        {
            "table" => OutputFormat::Table,
            "json" => OutputFormat::Json,
            other => bail!("OUTPUT_FORMAT must be `table` or `json`, got `{}`", other),
        };

        Ok(Config {
            indexer_url,
            refresh_interval,
            request_timeout,
            chains_file,
            excluded_chain_ids,
            output_format,
        })
    }

    /// Initial polling parameters
    pub fn polling(&self) -> PollingConfig {
        PollingConfig::new(&self.indexer_url, self.refresh_interval)
    }
}

/// Live-reconfigurable polling parameters, handed to each sweep as an immutable snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    indexer_url: String,
    refresh_interval_secs: u64,
}

impl PollingConfig {
    /// `refresh_interval_secs` of 0 is raised to 1.
    pub fn new(indexer_url: &str, refresh_interval_secs: u64) -> Self {
        Self {
            indexer_url: normalize_indexer_url(indexer_url),
            refresh_interval_secs: refresh_interval_secs.max(1),
        }
    }

    pub fn indexer_url(&self) -> &str {
        &self.indexer_url
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_interval_secs(&self) -> u64 {
        self.refresh_interval_secs
    }

    pub fn with_indexer_url(&self, indexer_url: &str) -> Self {
        Self::new(indexer_url, self.refresh_interval_secs)
    }

    pub fn with_refresh_interval(&self, refresh_interval_secs: u64) -> Self {
        Self::new(&self.indexer_url, refresh_interval_secs)
    }
}

/// Trim whitespace and drop trailing slashes so `{url}/graphql` is well formed
pub fn normalize_indexer_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

pub fn parse_refresh_interval(raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("`{}` is not a whole number of seconds", raw.trim()))?;
    if secs == 0 {
        bail!("refresh interval must be at least one second");
    }
    Ok(secs)
}

pub fn parse_request_timeout(raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("`{}` is not a whole number of seconds", raw.trim()))?;
    if secs == 0 {
        bail!("request timeout must be at least one second");
    }
    Ok(secs)
}

fn parse_chain_ids(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse().with_context(|| format!("invalid chain id `{}`", id)))
        .collect()
}
