use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::{stream, TryStreamExt};
use tracing::{debug, info};

use crate::collect::collect_message_ids;
use crate::errors::{AppError, AppResult};
use crate::gmail::MailboxApi;
use crate::render::render;
use crate::retry::RetryPolicy;
use crate::types::{MessageId, Query};

/// Settings that shape one export run.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub email_addresses: Vec<String>,
    pub output_dir: PathBuf,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub dedupe: bool,
    pub list_only: bool,
}

/// Everything a run needs, passed explicitly instead of living in globals.
#[derive(Clone)]
pub struct RunContext {
    pub api: Arc<dyn MailboxApi>,
    pub settings: RunSettings,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ids_found: usize,
    pub written: usize,
}

pub struct Exporter {
    ctx: RunContext,
}

impl Exporter {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> AppResult<RunSummary> {
        let run_start = Instant::now();
        let ids = self.collect_all().await?;
        info!("Found messages: {}", ids.join(" "));

        if self.ctx.settings.list_only {
            return Ok(RunSummary {
                ids_found: ids.len(),
                written: 0,
            });
        }

        let out_dir = &self.ctx.settings.output_dir;
        tokio::fs::create_dir_all(out_dir).await?;

        let written = AtomicUsize::new(0);
        stream::iter(ids.iter().map(Ok::<_, AppError>))
            .try_for_each_concurrent(self.ctx.settings.concurrency.max(1), |id| {
                let written = &written;
                async move {
                    self.export_one(id, out_dir)
                        .await
                        .map_err(|e| AppError::fatal(id, e))?;
                    written.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            })
            .await?;

        let summary = RunSummary {
            ids_found: ids.len(),
            written: written.into_inner(),
        };
        info!(
            found = summary.ids_found,
            written = summary.written,
            elapsed_ms = ?run_start.elapsed().as_millis(),
            "Export completed"
        );
        Ok(summary)
    }

    /// Runs the `from:` and `to:` queries for every address, in configured
    /// order, and concatenates the results.
    pub async fn collect_all(&self) -> AppResult<Vec<MessageId>> {
        let mut ids = Vec::new();
        for address in &self.ctx.settings.email_addresses {
            info!("Messages to or from {address}:");
            for query in Query::pair_for(address) {
                let found = collect_message_ids(self.ctx.api.as_ref(), &query).await?;
                debug!(query = %query, count = found.len(), "Query collected");
                ids.extend(found);
            }
        }

        if self.ctx.settings.dedupe {
            let before = ids.len();
            ids = dedupe_preserving_order(ids);
            debug!(before, after = ids.len(), "Deduplicated message ids");
        }
        Ok(ids)
    }

    async fn export_one(&self, id: &str, out_dir: &Path) -> AppResult<()> {
        if !is_safe_file_stem(id) {
            return Err(AppError::Unexpected(format!(
                "message id {id:?} is not usable as a file name"
            )));
        }

        let api = self.ctx.api.as_ref();
        let payload = self
            .ctx
            .settings
            .retry
            .run(id, || api.get_full_message(id))
            .await?;

        let path = out_dir.join(format!("{id}.txt"));
        tokio::fs::write(&path, render(&payload)).await?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

fn dedupe_preserving_order(ids: Vec<MessageId>) -> Vec<MessageId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn is_safe_file_stem(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(&['/', '\\', '\0'][..])
}
