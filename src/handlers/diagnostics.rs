// Diagnostic handler
// Reports backend and database availability as status text

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{config::ConnectionEnv, state::AppState, store::ConnectionStatus};

const ERROR_EXCERPT_CHARS: usize = 50;

/// Response body of `GET /test`.
///
/// Every field is human-readable status text; the request itself never fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub backend: String,
    pub database: String,
    pub database_url: String,
    pub database_name: String,
    pub connection_status: String,
    /// Database actually answering, as reported by the store.
    pub connected_database: Option<String>,
    pub collections: Vec<String>,
}

impl DiagnosticReport {
    pub fn new(status: &ConnectionStatus, env: ConnectionEnv) -> Self {
        let database = match status {
            ConnectionStatus::Working { .. } => "✅ Connected & Working".to_string(),
            ConnectionStatus::Degraded { error, .. } => {
                format!("⚠️  Connected but Error: {}", excerpt(error))
            }
            ConnectionStatus::Disconnected { .. } => {
                "⚠️  Available but not initialized".to_string()
            }
        };

        let connection_status = if status.is_connected() {
            "Connected"
        } else {
            "Not Connected"
        };

        DiagnosticReport {
            backend: "✅ Running".to_string(),
            database,
            database_url: set_or_not(env.database_url),
            database_name: set_or_not(env.database_name),
            connection_status: connection_status.to_string(),
            connected_database: status.database_name().map(str::to_string),
            collections: status.collections().to_vec(),
        }
    }
}

fn set_or_not(present: bool) -> String {
    let text = if present { "✅ Set" } else { "❌ Not Set" };
    text.to_string()
}

fn excerpt(message: &str) -> String {
    message.chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Database diagnostic
/// GET /test
pub async fn test_database(State(state): State<AppState>) -> Json<DiagnosticReport> {
    let status = state.store.check_connection().await;
    info!(
        "Database diagnostic: connected={} database={}",
        status.is_connected(),
        status.database_name().unwrap_or("<none>")
    );

    Json(DiagnosticReport::new(&status, state.connection_env))
}
