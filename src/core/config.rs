use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const BRAPI_TOKEN_ENV: &str = "BRAPI_TOKEN";

#[derive(Deserialize, Serialize, Clone)]
pub struct BrapiProviderConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for BrapiProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrapiProviderConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for BrapiProviderConfig {
    fn default() -> Self {
        BrapiProviderConfig {
            base_url: "https://brapi.dev".to_string(),
            token: None,
        }
    }
}

impl BrapiProviderConfig {
    /// Token from the file, or from the environment when the file has none.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(BRAPI_TOKEN_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub brapi: BrapiProviderConfig,
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
}

/// Request budgets per request class. Fundamentals payloads are heavier and
/// get the longer budget.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutsConfig {
    #[serde(default = "default_quote_timeout_ms")]
    pub quote_ms: u64,
    #[serde(default = "default_fundamentals_timeout_ms")]
    pub fundamentals_ms: u64,
}

fn default_quote_timeout_ms() -> u64 {
    5_000
}

fn default_fundamentals_timeout_ms() -> u64 {
    10_000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            quote_ms: default_quote_timeout_ms(),
            fundamentals_ms: default_fundamentals_timeout_ms(),
        }
    }
}

impl TimeoutsConfig {
    pub fn quote(&self) -> Duration {
        Duration::from_millis(self.quote_ms)
    }

    pub fn fundamentals(&self) -> Duration {
        Duration::from_millis(self.fundamentals_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessConfig {
    #[serde(default = "default_quote_secs")]
    pub quote_secs: u64,
    #[serde(default = "default_fundamentals_secs")]
    pub fundamentals_secs: u64,
    #[serde(default = "default_quote_secs")]
    pub index_batch_secs: u64,
}

fn default_quote_secs() -> u64 {
    60
}

fn default_fundamentals_secs() -> u64 {
    24 * 60 * 60
}

impl FreshnessConfig {
    pub fn quote(&self) -> Duration {
        Duration::from_secs(self.quote_secs)
    }

    pub fn fundamentals(&self) -> Duration {
        Duration::from_secs(self.fundamentals_secs)
    }

    pub fn index_batch(&self) -> Duration {
        Duration::from_secs(self.index_batch_secs)
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            quote_secs: default_quote_secs(),
            fundamentals_secs: default_fundamentals_secs(),
            index_batch_secs: default_quote_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    #[serde(default = "default_known_etfs")]
    pub known_etfs: Vec<String>,
    #[serde(default = "default_known_nyse")]
    pub known_nyse: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_known_etfs() -> Vec<String> {
    to_strings(&[
        "SPY", "IVV", "VOO", "VTI", "VT", "VEA", "VWO", "VNQ", "SCHD", "DIA", "IWM", "GLD", "SLV",
        "BND", "AGG", "TLT", "XLK", "XLF", "XLE", "XLV", "JEPI", "VIG", "VYM",
    ])
}

fn default_known_nyse() -> Vec<String> {
    to_strings(&[
        "KO", "JNJ", "JPM", "V", "MA", "WMT", "PG", "DIS", "XOM", "CVX", "BAC", "PFE", "T", "VZ",
        "O", "MCD", "NKE", "HD", "IBM", "GS", "MMM", "ABBV", "UNH", "LLY", "BRK.B",
    ])
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            known_etfs: default_known_etfs(),
            known_nyse: default_known_nyse(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TapeConfig {
    /// Default ticker-tape contents when the caller names none.
    #[serde(default = "default_tape_tickers")]
    pub tickers: Vec<String>,
    /// Symbols the primary provider serves reliably.
    #[serde(default = "default_primary_symbols")]
    pub primary_symbols: Vec<String>,
    /// Also ask the secondary provider for the primary subset to fill
    /// non-critical fields.
    #[serde(default)]
    pub enrich_primary: bool,
}

fn default_tape_tickers() -> Vec<String> {
    to_strings(&["^BVSP", "^GSPC", "^IXIC", "^DJI"])
}

fn default_primary_symbols() -> Vec<String> {
    to_strings(&["^BVSP"])
}

impl Default for TapeConfig {
    fn default() -> Self {
        Self {
            tickers: default_tape_tickers(),
            primary_symbols: default_primary_symbols(),
            enrich_primary: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub tape: TapeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "marketlens", "marketlens")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
