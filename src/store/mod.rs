//! Document store accessor.
//!
//! [`DocumentStore`] is the untyped, collection-named interface every backend
//! implements. [`Collection`] layers a typed repository on top so callers work
//! with their own document type instead of raw JSON maps.

pub mod memory;
pub mod postgres;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::config::{Config, StoreBackend};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Upper bound on collection names reported by a connection check.
pub const MAX_REPORTED_COLLECTIONS: usize = 10;

/// A document as the store returns it: the assigned identifier plus its body.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Map<String, Value>,
}

/// Outcome of a connection check. Never an error; failures are folded in.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    /// Reachable, and the collection listing succeeded.
    Working {
        database_name: String,
        collections: Vec<String>,
    },
    /// A connection handle exists but the store did not answer properly.
    Degraded {
        database_name: Option<String>,
        error: String,
    },
    /// No connection was ever established.
    Disconnected { reason: String },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionStatus::Disconnected { .. })
    }

    /// Name of the database answering, when the store could tell.
    pub fn database_name(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Working { database_name, .. } => Some(database_name.as_str()),
            ConnectionStatus::Degraded { database_name, .. } => database_name.as_deref(),
            ConnectionStatus::Disconnected { .. } => None,
        }
    }

    pub fn collections(&self) -> &[String] {
        match self {
            ConnectionStatus::Working { collections, .. } => collections,
            _ => &[],
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `document` into `collection` and return the identifier the
    /// store assigned to it.
    async fn create_document(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError>;

    /// Up to `limit` documents of `collection` containing `filter`, oldest
    /// first. An empty filter matches everything.
    async fn get_documents(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn check_connection(&self) -> ConnectionStatus;
}

/// A serializable type that lives in a fixed collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
}

/// A typed document paired with its store identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub document: T,
}

/// Typed repository over one collection of any [`DocumentStore`].
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    _document: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _document: PhantomData,
        }
    }
}

impl<T: Document> Collection<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _document: PhantomData,
        }
    }

    pub async fn create_document(&self, document: &T) -> Result<String, StoreError> {
        let body = match serde_json::to_value(document) {
            Ok(Value::Object(body)) => body,
            Ok(other) => {
                return Err(StoreError::Decode(format!(
                    "{} documents must serialize to an object, got {}",
                    T::COLLECTION,
                    other
                )))
            }
            Err(e) => return Err(StoreError::Decode(e.to_string())),
        };

        self.store.create_document(T::COLLECTION, body).await
    }

    pub async fn get_documents(
        &self,
        filter: &Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<Stored<T>>, StoreError> {
        let documents = self.store.get_documents(T::COLLECTION, filter, limit).await?;

        documents
            .into_iter()
            .map(|stored| {
                let id = stored.id;
                serde_json::from_value(Value::Object(stored.body))
                    .map(|document| Stored { id: id.clone(), document })
                    .map_err(|e| {
                        StoreError::Decode(format!("{} document {}: {}", T::COLLECTION, id, e))
                    })
            })
            .collect()
    }
}

/// The Disconnected lifecycle state: every operation fails, nothing reconnects.
#[derive(Debug, Clone)]
pub struct DisconnectedStore {
    reason: String,
}

impl DisconnectedStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for DisconnectedStore {
    async fn create_document(
        &self,
        _collection: &str,
        _document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        Err(StoreError::NotConnected(self.reason.clone()))
    }

    async fn get_documents(
        &self,
        _collection: &str,
        _filter: &Map<String, Value>,
        _limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        Err(StoreError::NotConnected(self.reason.clone()))
    }

    async fn check_connection(&self) -> ConnectionStatus {
        ConnectionStatus::Disconnected {
            reason: self.reason.clone(),
        }
    }
}

/// Open the configured backend.
///
/// Never fails: a missing or unreachable database leaves the process running
/// with a [`DisconnectedStore`].
pub async fn open(config: &Config) -> Arc<dyn DocumentStore> {
    match config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory document store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => match config.database {
            None => {
                warn!("DATABASE_URL is not set; starting without a database connection");
                Arc::new(DisconnectedStore::new("DATABASE_URL is not set"))
            }
            Some(ref database) => match PostgresStore::connect(database).await {
                Ok(store) => {
                    info!("Database connection established");
                    Arc::new(store)
                }
                Err(e) => {
                    error!("Failed to connect to database: {}", e);
                    Arc::new(DisconnectedStore::new(e.to_string()))
                }
            },
        },
    }
}

/// JSONB-style containment: does `document` contain `filter`?
///
/// Objects match when every filter key is contained in the document's value
/// for that key; arrays when every filter element is contained in some
/// document element; numbers compare by value; other scalars by equality.
pub fn json_contains(document: &Value, filter: &Value) -> bool {
    match (document, filter) {
        (Value::Object(doc), Value::Object(wanted)) => wanted.iter().all(|(key, expected)| {
            doc.get(key)
                .map_or(false, |actual| json_contains(actual, expected))
        }),
        (Value::Array(doc), Value::Array(wanted)) => wanted
            .iter()
            .all(|expected| doc.iter().any(|actual| json_contains(actual, expected))),
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}
