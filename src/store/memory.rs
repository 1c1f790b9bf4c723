use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    json_contains, ConnectionStatus, DocumentStore, StoredDocument, MAX_REPORTED_COLLECTIONS,
};
use crate::error::StoreError;

pub const MEMORY_DATABASE_NAME: &str = "memory";

/// In-process document store with the same semantics as the PostgreSQL one.
///
/// Documents are kept per collection in insertion order. The store can be
/// flipped unavailable to simulate a lost connection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<StoredDocument>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store is unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        self.ensure_available()?;

        let id = Uuid::new_v4().to_string();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                body: document,
            });

        debug!("Inserted document {} into memory collection {}", id, collection);
        Ok(id)
    }

    async fn get_documents(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.ensure_available()?;

        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(documents
            .iter()
            .filter(|stored| stored_contains(&stored.body, filter))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn check_connection(&self) -> ConnectionStatus {
        if let Err(e) = self.ensure_available() {
            return ConnectionStatus::Degraded {
                database_name: Some(MEMORY_DATABASE_NAME.to_string()),
                error: e.to_string(),
            };
        }

        let collections = self
            .collections
            .read()
            .await
            .keys()
            .take(MAX_REPORTED_COLLECTIONS)
            .cloned()
            .collect();

        ConnectionStatus::Working {
            database_name: MEMORY_DATABASE_NAME.to_string(),
            collections,
        }
    }
}

fn stored_contains(body: &Map<String, Value>, filter: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, expected)| {
        body.get(key)
            .map_or(false, |actual| json_contains(actual, expected))
    })
}
