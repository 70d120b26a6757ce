pub mod docstore;

use std::sync::Arc;

pub use docstore::DocumentStore;

/// Shared handles to the stores that indices are built over.
#[derive(Clone, Default)]
pub struct StorageContext {
    docstore: Arc<DocumentStore>,
}

impl StorageContext {
    pub fn from_defaults() -> Self {
        Self::default()
    }

    pub fn docstore(&self) -> &Arc<DocumentStore> {
        &self.docstore
    }
}
