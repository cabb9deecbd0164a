use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::process::{Pipeline, PipelineError, Stage};
use crate::core::CpeError;
use crate::xmldsig::KeyMaterial;

/// Batch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    Running,
    Completed,
    CompletedWithErrors,
}

/// A failed batch item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemError {
    pub document_id: String,
    pub stage: String,
    pub message: String,
}

/// Snapshot of a batch. `processed == successful + failed` in every
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub id: Uuid,
    pub state: BatchState,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<BatchItemError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchStatus {
    fn new(id: Uuid, total: usize) -> Self {
        Self {
            id,
            state: BatchState::Running,
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, document_id: &str, result: &Result<(), PipelineError>) {
        self.processed += 1;
        match result {
            Ok(()) => self.successful += 1,
            Err(e) => {
                self.failed += 1;
                self.errors.push(BatchItemError {
                    document_id: document_id.to_string(),
                    stage: e.stage.to_string(),
                    message: e.source.to_string(),
                });
            }
        }
    }

    fn finish(&mut self) {
        self.state = if self.failed == 0 {
            BatchState::Completed
        } else {
            BatchState::CompletedWithErrors
        };
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Wait between two submissions to stay under the service rate limit.
    pub pause_between_items: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pause_between_items: Duration::from_secs(1),
        }
    }
}

/// Handle to a running batch.
#[derive(Debug)]
pub struct BatchHandle {
    pub id: Uuid,
    task: JoinHandle<BatchStatus>,
}

impl BatchHandle {
    /// Wait for the batch to finish and return its final snapshot.
    pub async fn wait(self) -> Result<BatchStatus, CpeError> {
        self.task
            .await
            .map_err(|e| CpeError::Storage(format!("batch task {} failed: {e}", self.id)))
    }
}

type Progress = Arc<Mutex<BatchStatus>>;

/// Runs batches of stored documents through the [`Pipeline`].
///
/// Each batch is one detached task. Items inside a batch are processed one
/// after another; batches themselves may run concurrently.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    pipeline: Pipeline,
    config: BatchConfig,
    batches: Arc<RwLock<HashMap<Uuid, Progress>>>,
}

impl BatchCoordinator {
    pub fn new(pipeline: Pipeline, config: BatchConfig) -> Self {
        Self {
            pipeline,
            config,
            batches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a batch over `document_ids` and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run_batch(&self, document_ids: Vec<String>, key: KeyMaterial) -> BatchHandle {
        let id = Uuid::new_v4();
        let progress: Progress = Arc::new(Mutex::new(BatchStatus::new(id, document_ids.len())));
        self.batches.write().insert(id, progress.clone());

        let pipeline = self.pipeline.clone();
        let batches = self.batches.clone();
        let pause = self.config.pause_between_items;
        let task = tokio::spawn(async move {
            info!(batch_id = %id, total = document_ids.len(), "batch started");
            let count = document_ids.len();
            for (idx, document_id) in document_ids.iter().enumerate() {
                let result = process_item(&pipeline, document_id, &key).await;
                let snapshot = {
                    let mut p = progress.lock();
                    p.record(document_id, &result);
                    p.clone()
                };
                if let Err(e) = pipeline.store().save_batch(&snapshot) {
                    warn!(batch_id = %id, error = %e, "could not persist batch progress");
                }
                if idx + 1 < count && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            let snapshot = {
                let mut p = progress.lock();
                p.finish();
                p.clone()
            };
            match pipeline.store().save_batch(&snapshot) {
                Ok(()) => {
                    batches.write().remove(&id);
                }
                Err(e) => warn!(batch_id = %id, error = %e, "could not persist batch result"),
            }
            info!(
                batch_id = %id,
                processed = snapshot.processed,
                successful = snapshot.successful,
                failed = snapshot.failed,
                state = ?snapshot.state,
                "batch finished"
            );
            snapshot
        });

        BatchHandle { id, task }
    }

    /// Current snapshot of a batch.
    ///
    /// Running batches are answered from memory. A finished batch is
    /// released by the coordinator once its final snapshot is stored, and
    /// is read back from the [`DocumentStore`](super::DocumentStore).
    pub fn get_batch_status(&self, id: Uuid) -> Option<BatchStatus> {
        if let Some(progress) = self.batches.read().get(&id) {
            return Some(progress.lock().clone());
        }
        match self.pipeline.store().load_batch(id) {
            Ok(status) => status,
            Err(e) => {
                warn!(batch_id = %id, error = %e, "could not load batch status");
                None
            }
        }
    }

    /// Batches still tracked in memory.
    pub fn running_batches(&self) -> usize {
        self.batches.read().len()
    }
}

async fn process_item(
    pipeline: &Pipeline,
    document_id: &str,
    key: &KeyMaterial,
) -> Result<(), PipelineError> {
    let mut document = pipeline
        .store()
        .load(document_id)
        .map_err(|e| PipelineError::new(Stage::Load, e))?
        .ok_or_else(|| {
            PipelineError::new(
                Stage::Load,
                CpeError::Storage(format!("document {document_id} not found")),
            )
        })?;
    pipeline.process(&mut document, key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DocumentState;
    use crate::pipeline::InMemoryStore;
    use crate::pipeline::test_support::{key, sample_document, sandbox_client};

    fn coordinator(store: Arc<InMemoryStore>) -> BatchCoordinator {
        BatchCoordinator::new(
            Pipeline::new(sandbox_client(), store),
            BatchConfig {
                pause_between_items: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn counts_successes_and_failures() {
        let store = Arc::new(InMemoryStore::new());
        let mut ids = Vec::new();
        for n in 1..=3 {
            let doc = sample_document("F001", &format!("0000000{n}"));
            ids.push(doc.id.clone());
            store.insert(doc);
        }
        let mut broken = sample_document("F001", "00000004");
        broken.state = DocumentState::Signed;
        store.insert(broken);
        ids.insert(1, "F001-00000004".into());
        ids.push("F001-99999999".into());

        let coordinator = coordinator(store.clone());
        let handle = coordinator.run_batch(ids, key());
        let id = handle.id;
        let status = handle.wait().await.unwrap();

        assert_eq!(status.total, 5);
        assert_eq!(status.processed, 5);
        assert_eq!(status.successful, 3);
        assert_eq!(status.failed, 2);
        assert_eq!(status.state, BatchState::CompletedWithErrors);
        assert_eq!(status.errors[0].document_id, "F001-00000004");
        assert_eq!(status.errors[0].stage, "package");
        assert_eq!(status.errors[1].stage, "load");
        assert!(status.finished_at.is_some());

        assert_eq!(coordinator.get_batch_status(id), Some(status.clone()));
        assert_eq!(store.batch(id), Some(status));
        assert_eq!(coordinator.running_batches(), 0);
        assert_eq!(store.get("F001-00000001").unwrap().state, DocumentState::Accepted);
    }

    #[tokio::test]
    async fn clean_batch_completes() {
        let store = Arc::new(InMemoryStore::new());
        let doc = sample_document("F001", "00000010");
        let id = doc.id.clone();
        store.insert(doc);

        let status = coordinator(store).run_batch(vec![id], key()).wait().await.unwrap();
        assert_eq!(status.state, BatchState::Completed);
        assert_eq!(status.successful, 1);
    }

    #[tokio::test]
    async fn finished_batches_are_released() {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = coordinator(store.clone());
        let mut ids = Vec::new();
        for n in 20..23 {
            let doc = sample_document("F001", &format!("000000{n}"));
            let doc_id = doc.id.clone();
            store.insert(doc);
            let handle = coordinator.run_batch(vec![doc_id], key());
            ids.push(handle.id);
            handle.wait().await.unwrap();
        }

        assert_eq!(coordinator.running_batches(), 0);
        for id in ids {
            let status = coordinator.get_batch_status(id).unwrap();
            assert_eq!(status.state, BatchState::Completed);
        }
    }

    #[tokio::test]
    async fn unknown_batch() {
        let store = Arc::new(InMemoryStore::new());
        assert!(coordinator(store).get_batch_status(Uuid::new_v4()).is_none());
    }
}
