//! Ingest Service
//!
//! Serializes every ingest into one task that owns the `AggregationStore`.
//! Adapters run concurrently and send records over a bounded `mpsc` channel;
//! the store task applies each command to completion before reading the next,
//! so key generation, conflict resolution and merge form one atomic step.
//!
//! # Example
//! ```rust,ignore
//! let service = IngestService::spawn(AggregationStore::new(), 256);
//! let handle = service.handle();
//! tokio::spawn(async move { handle.submit(record, SourceTag::new("osm_1")).await });
//! let store = service.finish().await?;
//! ```

use crate::error::{AggError, IngestError, ValidationError};
use crate::resolution::{AggregationStore, IngestOutcome};
use crate::types::{NormalizedRecord, SourceTag};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One record on its way into the store
struct IngestCommand {
    record: NormalizedRecord,
    source: SourceTag,
    reply: oneshot::Sender<Result<IngestOutcome, ValidationError>>,
}

/// Cloneable sender side used by adapters
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<IngestCommand>,
}

impl IngestHandle {
    /// Submit a record and wait for the store's verdict
    ///
    /// # Errors
    /// - `IngestError::Validation` if the store rejected this record
    /// - `IngestError::Closed` if the store task is gone
    pub async fn submit(
        &self,
        record: NormalizedRecord,
        source: SourceTag,
    ) -> Result<IngestOutcome, IngestError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(IngestCommand {
                record,
                source,
                reply,
            })
            .await
            .map_err(|_| IngestError::Closed)?;

        let outcome = rx.await.map_err(|_| IngestError::Closed)?;
        Ok(outcome?)
    }
}

#[cfg(test)]
impl IngestHandle {
    /// Handle whose store task is already gone
    pub(crate) fn closed() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { tx }
    }
}

/// Store-owning task plus the service's own handle
pub struct IngestService {
    handle: IngestHandle,
    task: JoinHandle<AggregationStore>,
}

impl IngestService {
    /// Spawn the store task with a bounded command channel
    pub fn spawn(store: AggregationStore, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run_store(store, rx));
        Self {
            handle: IngestHandle { tx },
            task,
        }
    }

    /// New handle for an adapter task
    pub fn handle(&self) -> IngestHandle {
        self.handle.clone()
    }

    /// Close the service and return the store
    ///
    /// Waits until every outstanding handle has been dropped and all queued
    /// commands have been applied.
    pub async fn finish(self) -> Result<AggregationStore, AggError> {
        drop(self.handle);
        self.task
            .await
            .map_err(|e| AggError::IngestTask(e.to_string()))
    }
}

async fn run_store(
    mut store: AggregationStore,
    mut rx: mpsc::Receiver<IngestCommand>,
) -> AggregationStore {
    debug!("Ingest task started");

    while let Some(command) = rx.recv().await {
        let result = store.ingest(command.record, command.source);
        // Submitter may have stopped waiting; the ingest still counts
        let _ = command.reply.send(result);
    }

    let stats = store.stats();
    info!(
        records = store.len(),
        created = stats.created,
        merged = stats.merged,
        replaced = stats.replaced,
        rejected = stats.rejected,
        "Ingest task finished"
    );
    store
}
