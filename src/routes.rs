use axum::{routing::get, Router};

use crate::{
    handlers::{
        diagnostics::test_database,
        health_check,
        posts::{create_post, get_all_posts},
        root,
    },
    middleware::apply_middleware_stack,
    state::AppState,
};

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/test", get(test_database))
        .route("/api/posts", get(get_all_posts).post(create_post))
        .with_state(state);

    apply_middleware_stack(router)
}
