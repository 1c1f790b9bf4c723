// Library root for the Manhwa Forum API

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

// Re-export commonly used types
pub use error::{ApiError, ConfigurationGap, StoreError, ValidationErrors};
pub use models::Post;
pub use routes::create_router;
pub use state::AppState;
pub use store::{Collection, DocumentStore, MemoryStore, PostgresStore};
