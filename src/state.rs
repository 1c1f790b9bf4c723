use std::sync::Arc;

use crate::config::ConnectionEnv;
use crate::models::Post;
use crate::store::{Collection, DocumentStore};

/// Shared handler state: the single store handle plus startup facts.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub posts: Collection<Post>,
    pub connection_env: ConnectionEnv,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, connection_env: ConnectionEnv) -> Self {
        AppState {
            posts: Collection::new(Arc::clone(&store)),
            store,
            connection_env,
        }
    }
}
