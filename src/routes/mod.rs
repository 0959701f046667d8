//! API routes
//!
//! Every request goes through one mutex around the engine and its session
//! table, so each knowledge file only ever has a single writer. Turns run on
//! the blocking pool because saving the knowledge file syncs to disk.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::conversation::Session;
use crate::core::ChatEngine;
use crate::AppState;

/// Sessions idle for longer than this are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Most sessions kept at once; the least recently used goes first
pub const MAX_SESSIONS: usize = 10_000;

struct TrackedSession {
    session: Session,
    last_seen: Instant,
    /// Turn counter at the last checkin, orders sessions for eviction
    turn: u64,
}

/// Engine plus the sessions of all connected clients
pub struct ChatService {
    engine: ChatEngine,
    sessions: HashMap<Uuid, TrackedSession>,
    idle_ttl: Duration,
    capacity: usize,
    turns: u64,
}

impl ChatService {
    pub fn new(engine: ChatEngine) -> Self {
        Self::with_limits(engine, SESSION_IDLE_TTL, MAX_SESSIONS)
    }

    pub fn with_limits(engine: ChatEngine, idle_ttl: Duration, capacity: usize) -> Self {
        Self {
            engine,
            sessions: HashMap::new(),
            idle_ttl,
            capacity: capacity.max(1),
            turns: 0,
        }
    }

    /// Run one turn on the session named in the request, or on a new one
    fn handle(&mut self, request: ChatRequest) -> Result<ChatResponse, ApiError> {
        let mut session = self.checkout(request.session_id);

        let response = match self.engine.respond(&mut session, &request.message) {
            Ok(reply) => Ok(ChatResponse {
                session_id: session.id,
                reply: reply.text(self.engine.messages(&session.mode)),
                kind: reply.kind().to_string(),
                teach_key: reply.teach_key().map(String::from),
                mode: session.mode.clone(),
                awaiting_teaching: session.awaiting_teaching(),
            }),
            Err(e) => {
                tracing::error!("Session {} failed: {}", session.id, e);
                Err(ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: e.to_string(),
                })
            }
        };

        self.checkin(session);
        response
    }

    /// Existing session for `id`, or a fresh one on the default mode
    fn checkout(&mut self, id: Option<Uuid>) -> Session {
        let ttl = self.idle_ttl;
        id.and_then(|id| self.sessions.remove(&id))
            .filter(|tracked| tracked.last_seen.elapsed() < ttl)
            .map(|tracked| tracked.session)
            .unwrap_or_else(|| {
                let session = self.engine.start_session();
                tracing::debug!("New session {}", session.id);
                session
            })
    }

    fn checkin(&mut self, session: Session) {
        self.evict_idle();
        if session.is_finished() {
            tracing::debug!("Session {} finished", session.id);
            return;
        }

        while self.sessions.len() >= self.capacity {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, tracked)| tracked.turn)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    tracing::debug!("Session table full, dropping {}", id);
                    self.sessions.remove(&id);
                }
                None => break,
            }
        }

        self.turns += 1;
        self.sessions.insert(
            session.id,
            TrackedSession {
                session,
                last_seen: Instant::now(),
                turn: self.turns,
            },
        );
    }

    fn evict_idle(&mut self) {
        let ttl = self.idle_ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, tracked| tracked.last_seen.elapsed() < ttl);
        let dropped = before - self.sessions.len();
        if dropped > 0 {
            tracing::debug!("Dropped {} idle sessions", dropped);
        }
    }

    fn session(&self, id: &Uuid) -> Option<&Session> {
        self.sessions
            .get(id)
            .filter(|tracked| tracked.last_seen.elapsed() < self.idle_ttl)
            .map(|tracked| &tracked.session)
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub reply: Option<String>,
    pub kind: String,
    /// Utterance being taught, on teach prompts and confirmations
    pub teach_key: Option<String>,
    pub mode: String,
    pub awaiting_teaching: bool,
}

/// Error body returned to API clients
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let chat = state.chat.clone();
    tokio::task::spawn_blocking(move || chat.blocking_lock().handle(request))
        .await
        .map_err(|e| {
            tracing::error!("Chat task failed: {}", e);
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "chat task failed".into(),
            }
        })?
        .map(Json)
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    let service = state.chat.lock().await;
    service
        .session(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("Session not found: {}", id),
        })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/sessions/:id", get(get_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    fn engine(dir: &TempDir) -> ChatEngine {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            seed: Some(1),
            ..Config::default()
        };
        ChatEngine::new(config).unwrap()
    }

    fn app_state(service: ChatService) -> AppState {
        AppState {
            chat: Arc::new(Mutex::new(service)),
        }
    }

    fn app(dir: &TempDir) -> Router {
        router().with_state(app_state(ChatService::new(engine(dir))))
    }

    async fn post_chat(
        app: &Router,
        message: &str,
        session_id: Option<Uuid>,
    ) -> (StatusCode, serde_json::Value) {
        let body = json!({ "message": message, "session_id": session_id });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn send(app: &Router, message: &str, session_id: Option<Uuid>) -> ChatResponse {
        let (status, body) = post_chat(app, message, session_id).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let response = app(&dir)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_teach_across_requests() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let first = send(&app, "what is your name", None).await;
        assert_eq!(first.kind, "needs_teaching");
        assert!(first.awaiting_teaching);
        assert_eq!(first.teach_key.as_deref(), Some("what is your name"));

        let taught = send(&app, "I am teachbot", Some(first.session_id)).await;
        assert_eq!(taught.kind, "taught");
        assert_eq!(taught.session_id, first.session_id);
        assert!(!taught.awaiting_teaching);

        // A different client sees what was learned
        let other = send(&app, "What is your name?", None).await;
        assert_ne!(other.session_id, first.session_id);
        assert_eq!(other.kind, "answer");
        assert_eq!(other.reply.as_deref(), Some("I am teachbot"));
    }

    #[tokio::test]
    async fn test_exit_drops_session() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        let first = send(&app, "mode: es", None).await;
        assert_eq!(first.mode, "es");

        let lookup = |id: Uuid| {
            Request::builder()
                .uri(format!("/v1/sessions/{}", id))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(lookup(first.session_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bye = send(&app, "exit", Some(first.session_id)).await;
        assert_eq!(bye.kind, "exit");

        let response = app.clone().oneshot(lookup(first.session_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_save_is_server_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("en").join("knowledge.json").join("inner"))
            .unwrap();
        let app = app(&dir);

        let first = send(&app, "what is rust", None).await;
        assert!(first.awaiting_teaching);

        let (status, body) = post_chat(&app, "A language", Some(first.session_id)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());

        // The session survives and is no longer waiting to be taught
        let again = send(&app, "what is rust", Some(first.session_id)).await;
        assert_eq!(again.session_id, first.session_id);
        assert_eq!(again.kind, "needs_teaching");
    }

    #[tokio::test]
    async fn test_session_table_is_bounded() {
        let dir = TempDir::new().unwrap();
        let state = app_state(ChatService::with_limits(engine(&dir), SESSION_IDLE_TTL, 3));
        let app = router().with_state(state.clone());

        let mut ids = Vec::new();
        for _ in 0..10 {
            ids.push(send(&app, "tell me a joke", None).await.session_id);
        }
        assert_eq!(state.chat.lock().await.sessions.len(), 3);

        // The most recent sessions are the ones kept
        let service = state.chat.lock().await;
        for id in &ids[7..] {
            assert!(service.session(id).is_some());
        }
        assert!(service.session(&ids[0]).is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let dir = TempDir::new().unwrap();
        let state = app_state(ChatService::with_limits(engine(&dir), Duration::ZERO, 100));
        let app = router().with_state(state.clone());

        let first = send(&app, "what is your name", None).await;
        assert!(first.awaiting_teaching);

        // Expired sessions are forgotten, so the id starts over
        let next = send(&app, "hello", Some(first.session_id)).await;
        assert_ne!(next.session_id, first.session_id);
        assert_eq!(next.kind, "needs_teaching");
        assert!(state.chat.lock().await.sessions.len() <= 1);
    }
}
