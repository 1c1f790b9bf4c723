use async_trait::async_trait;
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ConnectionStatus, DocumentStore, StoredDocument, MAX_REPORTED_COLLECTIONS};
use crate::config::DatabaseConfig;
use crate::error::StoreError;

/// Document store kept in a single PostgreSQL `documents` table.
///
/// Each row carries its collection name and a JSONB body; `seq` preserves
/// insertion order for listing.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool,
    database_name: Option<String>,
}

impl PostgresStore {
    /// Build the pool, verify a connection can be checked out, and create the
    /// schema if it does not exist yet.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        info!("Creating PostgreSQL connection pool for host: {}", config.host());

        let pool = Self::create_pool(config)?;
        let store = PostgresStore {
            pool,
            database_name: config.name.clone(),
        };

        store.test_connection().await?;
        store.migrate().await?;

        Ok(store)
    }

    fn create_pool(config: &DatabaseConfig) -> Result<Pool, StoreError> {
        let mut pg_config = Config::new();

        // Explicit fields override the matching parts of the URL.
        pg_config.url = Some(config.url.clone());
        pg_config.dbname = config.name.clone();

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "require" => deadpool_postgres::SslMode::Require,
            "prefer" => deadpool_postgres::SslMode::Prefer,
            other => {
                warn!("Unknown SSL mode '{}', defaulting to 'prefer'", other);
                deadpool_postgres::SslMode::Prefer
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_connections as usize);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder().build().map_err(|e| {
            error!("Failed to create TLS connector: {}", e);
            StoreError::Backend(format!("TLS connector creation failed: {}", e))
        })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls).map_err(|e| {
            error!("Failed to create connection pool: {}", e);
            StoreError::Backend(format!("Connection pool creation failed: {}", e))
        })
    }

    async fn get_connection(&self) -> Result<Object, StoreError> {
        self.pool.get().await.map_err(StoreError::from)
    }

    pub async fn test_connection(&self) -> Result<(), StoreError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            StoreError::Backend(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }

    /// Idempotent schema setup run on every connect.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        let documents_table = r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq BIGSERIAL PRIMARY KEY,
                id UUID UNIQUE NOT NULL,
                collection VARCHAR(255) NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#;

        client.execute(documents_table, &[]).await.map_err(|e| {
            error!("Failed to create documents table: {}", e);
            StoreError::Backend(format!("Documents table creation failed: {}", e))
        })?;

        let collection_index =
            "CREATE INDEX IF NOT EXISTS idx_documents_collection_seq ON documents(collection, seq)";
        client.execute(collection_index, &[]).await.map_err(|e| {
            error!("Failed to create documents collection index: {}", e);
            StoreError::Backend(format!("Documents collection index creation failed: {}", e))
        })?;

        let body_index = r#"
            CREATE INDEX IF NOT EXISTS idx_documents_body
            ON documents USING GIN (body jsonb_path_ops)
        "#;
        client.execute(body_index, &[]).await.map_err(|e| {
            error!("Failed to create documents body index: {}", e);
            StoreError::Backend(format!("Documents body index creation failed: {}", e))
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    async fn list_collections(&self) -> Result<(String, Vec<String>), StoreError> {
        let client = self.get_connection().await?;

        let row = client.query_one("SELECT current_database()", &[]).await?;
        let database_name: String = row.try_get(0)?;

        let limit = MAX_REPORTED_COLLECTIONS as i64;
        let rows = client
            .query(
                "SELECT DISTINCT collection FROM documents ORDER BY collection LIMIT $1",
                &[&limit],
            )
            .await?;

        let collections = rows
            .iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((database_name, collections))
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn create_document(
        &self,
        collection: &str,
        document: Map<String, Value>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        let body = Value::Object(document);
        let client = self.get_connection().await?;

        client
            .execute(
                "INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)",
                &[&id, &collection, &body],
            )
            .await?;

        info!("Created document {} in collection {}", id, collection);
        Ok(id.to_string())
    }

    async fn get_documents(
        &self,
        collection: &str,
        filter: &Map<String, Value>,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let filter = Value::Object(filter.clone());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let client = self.get_connection().await?;

        let query = r#"
            SELECT id, body FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY seq
            LIMIT $3
        "#;

        let rows = client.query(query, &[&collection, &filter, &limit]).await?;

        rows.iter()
            .map(|row| {
                let id: Uuid = row.try_get(0)?;
                match row.try_get::<_, Value>(1)? {
                    Value::Object(body) => Ok(StoredDocument {
                        id: id.to_string(),
                        body,
                    }),
                    other => Err(StoreError::Decode(format!(
                        "document {} has a non-object body: {}",
                        id, other
                    ))),
                }
            })
            .collect()
    }

    async fn check_connection(&self) -> ConnectionStatus {
        match self.list_collections().await {
            Ok((database_name, collections)) => ConnectionStatus::Working {
                database_name,
                collections,
            },
            Err(e) => {
                warn!("Database connection check failed: {}", e);
                ConnectionStatus::Degraded {
                    database_name: self.database_name.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

// These run against a live PostgreSQL instance:
// DATABASE_URL=postgres://... cargo test -- --ignored
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    async fn live_store() -> Option<PostgresStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL is not set; skipping PostgreSQL test");
            return None;
        };

        let config = DatabaseConfig {
            url,
            name: std::env::var("DATABASE_NAME").ok(),
            ssl_mode: std::env::var("DATABASE_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
            max_connections: 2,
            connection_timeout: Duration::from_secs(10),
        };

        Some(PostgresStore::connect(&config).await.expect("connect to DATABASE_URL"))
    }

    /// Collection name no other test run will touch.
    fn scratch_collection(label: &str) -> String {
        format!("test_{}_{}", label, Uuid::new_v4().simple())
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_create_then_list_round_trip() {
        let Some(store) = live_store().await else { return };
        let collection = scratch_collection("round_trip");

        let body = object(json!({
            "title": "Solo Leveling",
            "summary": null,
            "rating": 9.5,
            "genres": ["action"],
            "links": []
        }));
        let id = assert_ok!(store.create_document(&collection, body.clone()).await);
        assert!(Uuid::parse_str(&id).is_ok());

        let docs = assert_ok!(store.get_documents(&collection, &Map::new(), 50).await);
        assert_eq!(docs, vec![StoredDocument { id, body }]);
    }

    #[tokio::test]
    #[ignore]
    async fn test_limit_and_insertion_order() {
        let Some(store) = live_store().await else { return };
        let collection = scratch_collection("limit");

        let mut ids = Vec::new();
        for n in 0..3 {
            ids.push(assert_ok!(store.create_document(&collection, object(json!({"n": n}))).await));
        }

        for limit in [0, 1, 3, 50] {
            let docs = assert_ok!(store.get_documents(&collection, &Map::new(), limit).await);
            assert_eq!(docs.len(), limit.min(3));
            let listed: Vec<String> = docs.into_iter().map(|d| d.id).collect();
            assert_eq!(listed, ids[..limit.min(3)].to_vec());
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_filter_match_and_miss() {
        let Some(store) = live_store().await else { return };
        let collection = scratch_collection("filter");

        let solo = object(json!({"title": "Solo Leveling", "genres": ["action", "fantasy"]}));
        let tower = object(json!({"title": "Tower of God", "genres": ["fantasy"]}));
        assert_ok!(store.create_document(&collection, solo).await);
        assert_ok!(store.create_document(&collection, tower).await);

        let by_title = object(json!({"title": "Solo Leveling"}));
        let docs = assert_ok!(store.get_documents(&collection, &by_title, 10).await);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].body["title"], "Solo Leveling");

        let by_genre = object(json!({"genres": ["fantasy"]}));
        let docs = assert_ok!(store.get_documents(&collection, &by_genre, 10).await);
        assert_eq!(docs.len(), 2);

        let miss = object(json!({"title": "The Breaker"}));
        let docs = assert_ok!(store.get_documents(&collection, &miss, 10).await);
        assert!(docs.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn test_non_object_body_is_a_decode_error() {
        let Some(store) = live_store().await else { return };
        let collection = scratch_collection("decode");

        let client = store.get_connection().await.expect("connection");
        client
            .execute(
                "INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)",
                &[&Uuid::new_v4(), &collection, &json!([1, 2, 3])],
            )
            .await
            .expect("raw insert");

        let err = assert_err!(store.get_documents(&collection, &Map::new(), 10).await);
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_check_connection_reports_at_most_ten_collections() {
        let Some(store) = live_store().await else { return };

        for n in 0..(MAX_REPORTED_COLLECTIONS + 2) {
            let collection = scratch_collection(&format!("listing{}", n));
            assert_ok!(store.create_document(&collection, Map::new()).await);
        }

        match store.check_connection().await {
            ConnectionStatus::Working {
                database_name,
                collections,
            } => {
                assert!(!database_name.is_empty());
                if let Ok(expected) = std::env::var("DATABASE_NAME") {
                    assert_eq!(database_name, expected);
                }
                assert_eq!(collections.len(), MAX_REPORTED_COLLECTIONS);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }
}
