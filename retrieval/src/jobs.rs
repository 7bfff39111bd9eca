//! Background embedding jobs.
//!
//! Record writes return before the embedding of their notes exists. Each
//! write enqueues an [`EmbeddingUpdateJob`]; the [`EmbeddingJobQueue`] runs
//! them on the tokio runtime, a bounded number at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use peoplepad_embeddings::EmbeddingClient;
use peoplepad_records::{Record, RecordStore, WriteOutcome, embeddable};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Recompute and store the embedding of one record's notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingUpdateJob {
    /// Record to update.
    pub record_id: Uuid,

    /// The notes as they were when the record was written.
    pub text: Option<String>,
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Notes were absent or blank; nothing to embed.
    Skipped,

    /// The embedding was stored.
    Written,

    /// The record was deleted before the embedding could be stored.
    RecordMissing,

    /// The notes changed while the job ran; a newer job owns the update.
    Superseded,

    /// The provider or the store failed. Not retried.
    Failed,
}

impl EmbeddingUpdateJob {
    /// Create a job.
    pub fn new(record_id: Uuid, text: Option<String>) -> Self {
        Self { record_id, text }
    }

    /// Job for a record's current notes.
    pub fn for_record(record: &Record) -> Self {
        Self::new(record.id, record.notes.clone())
    }

    /// Run the job to completion.
    ///
    /// Never fails: every outcome other than `Written` and `Skipped` is
    /// logged with the record id and the error kind.
    pub async fn run(&self, client: &EmbeddingClient, store: &dyn RecordStore) -> JobOutcome {
        let record_id = self.record_id;
        let Some(text) = embeddable(self.text.as_deref()) else {
            debug!(%record_id, "No notes to embed");
            return JobOutcome::Skipped;
        };

        let embedding = match client.embed_one(text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                error!(
                    %record_id,
                    kind = err.kind(),
                    error = %err,
                    "Failed to compute embedding"
                );
                return JobOutcome::Failed;
            }
        };

        // A later edit may have landed while the provider was working.
        match store.get_record_text(record_id).await {
            Ok(None) => {
                warn!(%record_id, "Record not found for embedding update");
                return JobOutcome::RecordMissing;
            }
            Ok(Some(current)) if current != text => {
                info!(%record_id, "Notes changed during embedding, dropping stale vector");
                return JobOutcome::Superseded;
            }
            Ok(Some(_)) => {}
            Err(err) => {
                error!(%record_id, kind = err.kind(), error = %err, "Failed to read record");
                return JobOutcome::Failed;
            }
        }

        match store.write_embedding(record_id, &embedding).await {
            Ok(WriteOutcome::Written) => {
                info!(%record_id, "Embedding updated");
                JobOutcome::Written
            }
            Ok(WriteOutcome::RecordMissing) => {
                warn!(%record_id, "Record not found for embedding update");
                JobOutcome::RecordMissing
            }
            Err(err) => {
                error!(%record_id, kind = err.kind(), error = %err, "Failed to store embedding");
                JobOutcome::Failed
            }
        }
    }
}

/// Counters over every finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub skipped: u64,
    pub written: u64,
    pub record_missing: u64,
    pub superseded: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Shared {
    /// Jobs accepted but not yet finished.
    pending: AtomicUsize,
    idle: Notify,
    shutdown: Notify,

    skipped: AtomicU64,
    written: AtomicU64,
    record_missing: AtomicU64,
    superseded: AtomicU64,
    failed: AtomicU64,
}

impl Shared {
    fn record(&self, outcome: JobOutcome) {
        let counter = match outcome {
            JobOutcome::Skipped => &self.skipped,
            JobOutcome::Written => &self.written,
            JobOutcome::RecordMissing => &self.record_missing,
            JobOutcome::Superseded => &self.superseded,
            JobOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Marks one accepted job as finished when dropped, even if it panicked.
struct InFlight(Arc<Shared>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Runs [`EmbeddingUpdateJob`]s in the background.
///
/// Jobs are handed to a dispatcher task over an unbounded channel and run
/// concurrently, at most `workers` at a time. Failed jobs are not retried
/// beyond the client's own retry policy.
pub struct EmbeddingJobQueue {
    sender: mpsc::UnboundedSender<EmbeddingUpdateJob>,
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EmbeddingJobQueue {
    /// Start the dispatcher on the current tokio runtime.
    pub fn start(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn RecordStore>,
        workers: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let workers = workers.max(1);

        let dispatcher = tokio::spawn(dispatch(receiver, client, store, workers, shared.clone()));
        info!(workers, "Embedding job queue started");

        Self {
            sender,
            shared,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Hand a job to the background workers. Never blocks; once the queue
    /// has shut down the job is logged and dropped.
    pub fn enqueue(&self, job: EmbeddingUpdateJob) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            self.shared.finish();
            warn!(record_id = %job.record_id, "Embedding job queue closed, dropping job");
        }
    }

    /// Jobs accepted but not yet finished.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Wait until every accepted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.shared.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Outcome counters so far.
    pub fn stats(&self) -> JobStats {
        let shared = &self.shared;
        JobStats {
            skipped: shared.skipped.load(Ordering::Relaxed),
            written: shared.written.load(Ordering::Relaxed),
            record_missing: shared.record_missing.load(Ordering::Relaxed),
            superseded: shared.superseded.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting jobs, finish the ones already accepted and join the
    /// dispatcher. Later calls return immediately.
    pub async fn shutdown(&self) {
        let Some(dispatcher) = self.dispatcher.lock().await.take() else {
            return;
        };

        self.shared.shutdown.notify_one();
        if let Err(err) = dispatcher.await {
            error!(error = %err, "Embedding job dispatcher failed");
        }
        info!("Embedding job queue stopped");
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<EmbeddingUpdateJob>,
    client: Arc<EmbeddingClient>,
    store: Arc<dyn RecordStore>,
    workers: usize,
    shared: Arc<Shared>,
) {
    let slots = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();
    let mut closing = false;

    loop {
        tokio::select! {
            _ = shared.shutdown.notified(), if !closing => {
                // Buffered jobs are still delivered after close.
                closing = true;
                receiver.close();
            }
            job = receiver.recv() => {
                let Some(job) = job else { break };
                let guard = InFlight(shared.clone());
                let Ok(permit) = slots.clone().acquire_owned().await else {
                    break;
                };

                let client = client.clone();
                let store = store.clone();
                running.spawn(async move {
                    let _permit = permit;
                    let outcome = job.run(&client, store.as_ref()).await;
                    guard.0.record(outcome);
                    drop(guard);
                });
            }
            Some(result) = running.join_next(), if !running.is_empty() => {
                if let Err(err) = result {
                    error!(error = %err, "Embedding job panicked");
                }
            }
        }
    }

    while let Some(result) = running.join_next().await {
        if let Err(err) = result {
            error!(error = %err, "Embedding job panicked");
        }
    }
}
