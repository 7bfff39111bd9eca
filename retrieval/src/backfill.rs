//! Re-embedding of records that have notes but no vector.
//!
//! Run after switching embedding models (with the vector column cleared)
//! or to recover from jobs that failed.

use std::sync::Arc;

use peoplepad_embeddings::EmbeddingClient;
use peoplepad_records::{RecordStore, WriteOutcome};
use serde::Serialize;
use tracing::{error, info};

use crate::error::Result;

/// Counts from one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    /// Records found without an embedding.
    pub total: usize,

    /// Records that now have one.
    pub embedded: usize,

    /// Records left without one because embedding or storing failed.
    pub failed: usize,

    /// Records deleted during the run.
    pub missing: usize,
}

/// Embeds every record still missing a vector, in batches.
pub struct Backfill {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn RecordStore>,
}

impl Backfill {
    pub fn new(client: Arc<EmbeddingClient>, store: Arc<dyn RecordStore>) -> Self {
        Self { client, store }
    }

    /// Process all pending records, `batch_size` at a time.
    ///
    /// A failed batch is logged and skipped; its records stay pending for
    /// the next run. Only a failure to list pending records aborts the run.
    pub async fn run(&self, batch_size: usize) -> Result<BackfillReport> {
        let batch_size = batch_size.clamp(1, self.client.max_batch_size());
        let mut report = BackfillReport::default();
        let mut after = None;

        loop {
            let page = self
                .store
                .records_missing_embedding(after, batch_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            after = Some(last.id);
            report.total += page.len();

            let texts: Vec<&str> = page.iter().map(|p| p.text.as_str()).collect();
            let embeddings = match self.client.embed_batch(&texts).await {
                Ok(embeddings) => embeddings,
                Err(err) => {
                    error!(
                        records = page.len(),
                        kind = err.kind(),
                        error = %err,
                        "Failed to embed backfill batch, skipping"
                    );
                    report.failed += page.len();
                    continue;
                }
            };

            for (pending, embedding) in page.iter().zip(embeddings) {
                match self.store.write_embedding(pending.id, &embedding).await {
                    Ok(WriteOutcome::Written) => report.embedded += 1,
                    Ok(WriteOutcome::RecordMissing) => report.missing += 1,
                    Err(err) => {
                        error!(
                            record_id = %pending.id,
                            kind = err.kind(),
                            error = %err,
                            "Failed to store backfilled embedding"
                        );
                        report.failed += 1;
                    }
                }
            }

            info!(
                processed = report.total,
                embedded = report.embedded,
                failed = report.failed,
                "Backfill batch done"
            );

            if page.len() < batch_size {
                break;
            }
        }

        info!(
            total = report.total,
            embedded = report.embedded,
            failed = report.failed,
            missing = report.missing,
            "Backfill finished"
        );
        Ok(report)
    }
}
