use crate::cli::Cli;
use crate::config::AppConfig;
use crate::export::{Exporter, RunContext, RunSettings};
use crate::gmail::GmailClient;
use crate::oauth;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run(cli: Cli) -> Result<()> {
    let config = apply_cli(AppConfig::load(&cli.config)?, &cli);
    info!(
        addresses = config.email_addresses.len(),
        output = %config.output_dir.display(),
        "Loaded configuration"
    );

    let token = match oauth::authorize(&config.credentials_path, &config.token_path).await? {
        Some(token) => token,
        None => {
            warn!("No client secrets available; nothing to do.");
            return Ok(());
        }
    };

    let api = GmailClient::new(&token.access_token)?;
    let ctx = RunContext {
        api: Arc::new(api),
        settings: RunSettings {
            email_addresses: config.email_addresses,
            output_dir: config.output_dir,
            concurrency: config.concurrency,
            retry: RetryPolicy::new(config.max_retries, config.max_backoff),
            dedupe: cli.dedupe,
            list_only: cli.list_only,
        },
    };

    let summary = Exporter::new(ctx).run().await.context("export aborted")?;
    info!(
        found = summary.ids_found,
        written = summary.written,
        "Done"
    );
    Ok(())
}

fn apply_cli(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(n) = cli.concurrency {
        config.concurrency = n.max(1);
    }
    if cli.max_retries.is_some() {
        config.max_retries = cli.max_retries;
    }
    if let Some(ms) = cli.max_backoff_ms {
        config.max_backoff = Some(Duration::from_millis(ms));
    }
    config
}
