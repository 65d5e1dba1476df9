use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Command-line options for mailgrab.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the TOML file listing the addresses to export.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Directory that receives one `<message id>.txt` per message.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// How many messages to fetch at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Give up on a message after this many rate-limited retries.
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Upper bound for a single backoff wait, in milliseconds.
    #[arg(long)]
    pub max_backoff_ms: Option<u64>,

    /// Fetch each message id only once even if several queries match it.
    #[arg(long)]
    pub dedupe: bool,

    /// Only collect and log message ids; fetch nothing.
    #[arg(long)]
    pub list_only: bool,
}
