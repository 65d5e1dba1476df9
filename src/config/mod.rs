use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "mailgrab.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "messages";
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Contents of `mailgrab.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileConfig {
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub max_backoff_ms: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub email_addresses: Vec<String>,
    pub output_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub concurrency: usize,
    pub max_retries: Option<u32>,
    pub max_backoff: Option<Duration>,
}

impl FileConfig {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let cfg: FileConfig =
            toml::from_str(raw).map_err(|e| AppError::Config(format!("parsing config: {e}")))?;
        if cfg.email_addresses.is_empty() {
            warn!("email_addresses is empty; nothing will be exported");
        }
        Ok(cfg)
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("reading {}: {e}", path.display())))?;
        let file = FileConfig::parse(&raw)?;
        Ok(Self::resolve(file))
    }

    /// Applies env overrides on top of the file and fills in defaults.
    pub fn resolve(file: FileConfig) -> Self {
        let output_dir = env::var("MAILGRAB_OUTPUT_DIR")
            .ok()
            .map(PathBuf::from)
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let concurrency = env::var("MAILGRAB_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .or(file.fetch.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY)
            .max(1);

        Self {
            email_addresses: file.email_addresses,
            output_dir,
            credentials_path: file
                .credentials_path
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
            token_path: file
                .token_path
                .unwrap_or_else(|| PathBuf::from("token.json")),
            concurrency,
            max_retries: file.fetch.max_retries,
            max_backoff: file.fetch.max_backoff_ms.map(Duration::from_millis),
        }
    }
}
