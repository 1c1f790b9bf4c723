// Post handlers
// HTTP handlers for listing and creating posts

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    models::post::Post,
    state::AppState,
};

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Query parameters for listing posts
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub limit: Option<i64>,
}

/// Body returned after a successful create
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedPost {
    pub id: String,
}

/// Get posts, oldest first
/// GET /api/posts?limit=<n>
pub async fn get_all_posts(
    State(state): State<AppState>,
    query: Result<Query<ListPostsQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let limit = usize::try_from(limit)
        .map_err(|_| ApiError::bad_request("limit must not be negative"))?;

    info!("Fetching up to {} posts", limit);

    let posts = state.posts.get_documents(&Map::new(), limit).await?;

    info!("Retrieved {} posts", posts.len());
    Ok((StatusCode::OK, Json(posts)))
}

/// Create a new post
/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(raw) = payload?;
    let post = Post::validate(&raw)?;

    info!("Creating new post with title: {}", post.title);

    let id = state.posts.create_document(&post).await?;

    info!("Successfully created post with id: {}", id);
    Ok((StatusCode::CREATED, Json(CreatedPost { id })))
}
