use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_HELLO: &str = "/hello";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_STATUS: &str = "/status/{code}";
pub const PATH_PULL: &str = "/api/pull";

const DEFAULT_SLOW_MS: u64 = 50;
const DEFAULT_PULL_LIMIT: i64 = 10;

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_json_content_type: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_saw_json_content_type(&self) {
        self.saw_json_content_type.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_json_content_type(&self) -> u64 {
        self.saw_json_content_type.load(Ordering::Relaxed)
    }
}

async fn handle_hello(State(stats): State<TestServerStats>) -> &'static str {
    stats.inc_requests_total();
    "Hello World!"
}

#[derive(Debug, Deserialize)]
struct SlowQuery {
    ms: Option<u64>,
}

/// Answers 200 after a fixed delay (`?ms=`, default 50).
async fn handle_slow(
    State(stats): State<TestServerStats>,
    Query(query): Query<SlowQuery>,
) -> &'static str {
    stats.inc_requests_total();
    sleep(Duration::from_millis(query.ms.unwrap_or(DEFAULT_SLOW_MS))).await;
    "slow"
}

async fn handle_status(State(stats): State<TestServerStats>, Path(code): Path<u16>) -> Response {
    stats.inc_requests_total();
    match StatusCode::from_u16(code) {
        Ok(status) => (status, status.canonical_reason().unwrap_or("")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    chat: String,
    #[serde(default)]
    cursor: i64,
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    reverse: bool,
}

#[derive(Debug, Serialize)]
struct PullMessage {
    chat: String,
    text: String,
    sender: String,
    send_time: i64,
}

#[derive(Debug, Serialize)]
struct PullResponse {
    code: i32,
    msg: &'static str,
    messages: Vec<PullMessage>,
    has_more: bool,
    next_cursor: i64,
}

/// Chat members are `a:b`; the room id is the sorted pair.
fn room_id(chat: &str) -> Option<String> {
    let (a, b) = chat.split_once(':')?;
    if a.is_empty() || b.is_empty() || b.contains(':') {
        return None;
    }
    Some(if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    })
}

/// A stand-in for a chat service's pull endpoint: three canned messages per room.
async fn handle_pull(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stats.inc_requests_total();

    if headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/json"))
    {
        stats.inc_saw_json_content_type();
    }

    let req: PullRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json").into_response(),
    };
    let Some(room) = room_id(&req.chat) else {
        return (StatusCode::BAD_REQUEST, "invalid chat").into_response();
    };

    let limit = if req.limit <= 0 { DEFAULT_PULL_LIMIT } else { req.limit };
    let mut messages: Vec<PullMessage> = (0..3i64)
        .skip(usize::try_from(req.cursor.max(0)).unwrap_or(usize::MAX))
        .map(|i| PullMessage {
            chat: req.chat.clone(),
            text: format!("message {i} in {room}"),
            sender: req.chat.split(':').next().unwrap_or_default().to_string(),
            send_time: 1_700_000_000 + i,
        })
        .collect();
    if req.reverse {
        messages.reverse();
    }
    let has_more = messages.len() as i64 > limit;
    messages.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

    Json(PullResponse {
        code: 0,
        msg: "success",
        next_cursor: if has_more { req.cursor + limit } else { 0 },
        has_more,
        messages,
    })
    .into_response()
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_HELLO, get(handle_hello))
        .route(PATH_SLOW, get(handle_slow))
        .route(PATH_STATUS, get(handle_status))
        .route(PATH_PULL, get(handle_pull).post(handle_pull))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
