use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures::stream::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use genforge_core::GenerationError;
use genforge_orchestrator::Orchestrator;

/// Shared application state for API handlers.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/plugins", get(list_plugins))
        .route("/api/runs", post(create_run))
        .route("/api/history", get(list_history).delete(clear_history))
        .route("/api/history/:id", get(get_entry))
        .route("/api/history/:id/cancel", post(cancel_run))
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// A domain error rendered as `{error, kind}` with a matching status code.
#[derive(Debug)]
pub struct ApiError(GenerationError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            GenerationError::NotFound(_) | GenerationError::EntryNotFound(_) => StatusCode::NOT_FOUND,
            GenerationError::InputRequired | GenerationError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GenerationError::DuplicateId(_) | GenerationError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (self.status(), Json(body)).into_response()
    }
}

/// WebSocket feed of history events.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let rx = state.orchestrator.history().subscribe();
    let mut stream = BroadcastStream::new(rx);

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(event) => {
                let Ok(json) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                // The client should re-fetch /api/history.
                warn!(skipped, "WebSocket subscriber lagged");
                let notice = json!({ "type": "lagged", "skipped": skipped }).to_string();
                if socket.send(Message::Text(notice.into())).await.is_err() {
                    break;
                }
            }
        }
    }
    debug!("WebSocket subscriber closed");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "genforge",
        "version": env!("CARGO_PKG_VERSION"),
        "plugins": state.orchestrator.registry().len(),
        "inFlight": state.orchestrator.in_flight(),
    }))
}

/// Registered plugins with their request schemas, in registration order.
async fn list_plugins(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "plugins": state.orchestrator.registry().descriptors() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub plugin_id: String,
    #[serde(default)]
    pub request: Value,
    /// Block until the entry is terminal instead of returning the pending snapshot.
    #[serde(default)]
    pub wait: bool,
}

/// Start a run. Returns 202 with the pending entry, or 200 with the final one when `wait` is set.
async fn create_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let handle = state.orchestrator.run(&body.plugin_id, body.request)?;
    if !body.wait {
        return Ok((StatusCode::ACCEPTED, Json(json!({ "entry": handle.entry() }))));
    }
    let entry = handle.wait().await?;
    Ok((StatusCode::OK, Json(json!({ "entry": entry }))))
}

/// History, newest first.
async fn list_history(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "entries": state.orchestrator.history().newest_first() }))
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let entry = state
        .orchestrator
        .history()
        .get(id)
        .ok_or(GenerationError::EntryNotFound(id))?;
    Ok(Json(json!({ "entry": entry })))
}

async fn clear_history(State(state): State<Arc<AppState>>) -> Json<Value> {
    let history = state.orchestrator.history();
    let removed = history.len();
    history.clear();
    Json(json!({ "status": "cleared", "removed": removed }))
}

/// Cancel an in-flight run. Unknown or finished runs report `cancelled: false`.
async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Json<Value> {
    let cancelled = state.orchestrator.cancel(id);
    Json(json!({ "id": id, "cancelled": cancelled }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use genforge_history::HistoryStore;
    use genforge_plugins::PluginRegistry;
    use genforge_poller::{JobPoller, PollPolicy};
    use genforge_reasoning::providers::mock::MockProvider;
    use genforge_reasoning::{EngineConfig, SequentialEngine, SequentialThinkingPlugin};

    fn state() -> Arc<AppState> {
        let provider = Arc::new(MockProvider::new("mock").with_response("FINAL ANSWER: Ship it"));
        let engine = SequentialEngine::new(provider, EngineConfig::default());
        let registry = PluginRegistry::new()
            .with(Arc::new(SequentialThinkingPlugin::new(engine)))
            .unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(registry),
            Arc::new(HistoryStore::new()),
            JobPoller::new(PollPolicy::fixed(10, 3)),
        );
        Arc::new(AppState { orchestrator })
    }

    fn run_request(plugin_id: &str, wait: bool) -> RunRequest {
        RunRequest {
            plugin_id: plugin_id.into(),
            request: json!({"input": "Name the campaign"}),
            wait,
        }
    }

    #[tokio::test]
    async fn run_with_wait_returns_final_entry() {
        let state = state();
        let (status, Json(body)) = create_run(State(state.clone()), Json(run_request("sequential-thinking", true)))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry"]["status"], "success");
        assert_eq!(body["entry"]["result"]["finalOutput"], "Ship it");

        let Json(history) = list_history(State(state)).await;
        assert_eq!(history["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_without_wait_is_accepted_pending() {
        let (status, Json(body)) = create_run(State(state()), Json(run_request("sequential-thinking", false)))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["entry"]["status"], "pending");
    }

    #[tokio::test]
    async fn unknown_plugin_is_404() {
        let err = create_run(State(state()), Json(run_request("music", false)))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn clear_reports_removed_count() {
        let state = state();
        create_run(State(state.clone()), Json(run_request("sequential-thinking", true)))
            .await
            .unwrap();

        let Json(body) = clear_history(State(state.clone())).await;
        assert_eq!(body["removed"], 1);
        assert!(state.orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn cancelling_unknown_run_is_false() {
        let Json(body) = cancel_run(State(state()), Path(Uuid::new_v4())).await;
        assert_eq!(body["cancelled"], false);
    }

    #[tokio::test]
    async fn plugins_endpoint_lists_schemas() {
        let Json(body) = list_plugins(State(state())).await;
        let plugins = body["plugins"].as_array().unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0]["id"], "sequential-thinking");
        assert_eq!(plugins[0]["requestSchema"]["type"], "object");
    }
}
