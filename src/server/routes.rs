//! HTTP and websocket routes for the session service
//!
//! ```text
//! POST /upload              zip in, new session id out
//! GET  /download/:id        session workspace as a zip
//! GET  /ws/:id              session protocol (see `protocol`)
//! GET  /api/status          liveness and session count
//! GET  /metrics             Prometheus text exposition
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{ClientMessage, ServerMessage};
use super::session::{SessionError, SessionManager};
use crate::agent::LogStyle;
use crate::metrics;
use crate::workspace::archive;

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Shared router state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Upload contained no file")]
    MissingFile,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Session(SessionError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::Archive(_)) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(_) | ApiError::MissingFile => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub active_sessions: usize,
}

/// Create the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/download/:session_id", get(download))
        .route("/ws/:session_id", get(websocket))
        .route("/api/status", get(service_status))
        .route("/metrics", get(metrics_text))
        .with_state(state)
}

/// Start a session from the first file in a multipart upload
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() || field.name() == Some("file") {
            bytes = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = bytes.ok_or(ApiError::MissingFile)?;

    let sessions = state.sessions.clone();
    let session = tokio::task::spawn_blocking(move || sessions.create_from_archive(&bytes))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(session = %session.id(), "Upload accepted");
    Ok(Json(UploadResponse {
        session_id: session.id().to_string(),
        message: "Environment ready".to_string(),
    }))
}

async fn download(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let dir = state.sessions.session_dir(&session_id)?;
    if !dir.is_dir() {
        return Err(SessionError::NotFound(session_id).into());
    }

    let bytes = tokio::task::spawn_blocking(move || archive::pack(&dir))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(SessionError::Io)?;

    let disposition = format!("attachment; filename=\"{}.zip\"", session_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn websocket(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, session_id))
}

/// Pump one websocket connection for `session_id` until it closes
async fn serve_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut sink, mut stream) = socket.split();

    let session = match state.sessions.open(&session_id) {
        Ok(session) => session,
        Err(e) => {
            debug!(session = %session_id, error = %e, "Refusing connection");
            let code = match e {
                SessionError::InvalidId(_) => 1008,
                _ => 1000,
            };
            let reason = match e {
                SessionError::NotFound(_) => "Session not found".to_string(),
                other => other.to_string(),
            };
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: Cow::Owned(reason),
                })))
                .await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    session.attach(tx.clone());
    info!(session = %session_id, "Client connected");

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(session = %session_id, error = %e, "Socket error");
                break;
            }
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::UserMessage { content }) => {
                let session = session.clone();
                tokio::spawn(async move { session.run_turn(content).await });
            }
            Ok(message) => session.handle(message).await,
            Err(e) => {
                session.connection().send(ServerMessage::log(
                    LogStyle::Error.paint(&format!("System Error: invalid message: {}", e)),
                ));
            }
        }
    }

    info!(session = %session_id, "Client disconnected");
    if session.connection().detach(&tx) {
        state.sessions.close(&session_id);
    }
    writer.abort();
}

async fn service_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ServiceStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_sessions: state.sessions.len(),
    })
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_text(),
    )
}
