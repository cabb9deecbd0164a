use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

use super::batch::BatchStatus;
use crate::core::{CpeError, Document};

/// Persistence collaborator.
///
/// The pipeline saves a full document snapshot after every lifecycle
/// transition and a batch snapshot after every batch item. Finished batches
/// are read back from here once the coordinator has dropped them.
pub trait DocumentStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<Document>, CpeError>;
    fn save(&self, document: &Document) -> Result<(), CpeError>;
    fn save_batch(&self, status: &BatchStatus) -> Result<(), CpeError>;
    fn load_batch(&self, id: Uuid) -> Result<Option<BatchStatus>, CpeError>;
}

/// Process-local store keyed by document id.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    batches: RwLock<HashMap<Uuid, BatchStatus>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document: Document) {
        self.documents.write().insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    pub fn batch(&self, id: Uuid) -> Option<BatchStatus> {
        self.batches.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentStore for InMemoryStore {
    fn load(&self, id: &str) -> Result<Option<Document>, CpeError> {
        Ok(self.get(id))
    }

    fn save(&self, document: &Document) -> Result<(), CpeError> {
        self.insert(document.clone());
        Ok(())
    }

    fn save_batch(&self, status: &BatchStatus) -> Result<(), CpeError> {
        self.batches.write().insert(status.id, status.clone());
        Ok(())
    }

    fn load_batch(&self, id: Uuid) -> Result<Option<BatchStatus>, CpeError> {
        Ok(self.batch(id))
    }
}
