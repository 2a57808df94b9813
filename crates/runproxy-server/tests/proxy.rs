//! End-to-end proxy tests: the router is driven with `oneshot`, executors
//! are axum servers on loopback ports.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use http_body_util::BodyExt;
use runproxy_balancer::Algorithm;
use runproxy_core::Mode;
use runproxy_server::{AppContext, ProxyConfig, build_router};
use runproxy_state::{ExecutorStatus, RuntimeStatus, StateStore};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tower::ServiceExt;

const PROXY_SECRET: &str = "proxy-secret";
const EXECUTOR_SECRET: &str = "executor-secret";

// ── Mock executors ─────────────────────────────────────────────

#[derive(Clone)]
struct Mock {
    name: &'static str,
    hits: Arc<AtomicUsize>,
}

struct Executor {
    host: String,
    hits: Arc<AtomicUsize>,
}

impl Executor {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn echo(State(mock): State<Mock>, method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let reply = json!({
        "server": mock.name,
        "method": method.as_str(),
        "path": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        "authorization": header("authorization"),
        "executor_hostname": header("x-opr-executor-hostname"),
        "body": body,
    });
    ([("x-served-by", mock.name)], axum::Json(reply)).into_response()
}

async fn status(State(mock): State<Mock>, Path(code): Path<u16>) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    let code = StatusCode::from_u16(code).unwrap();
    (code, [("x-custom", "yes")], format!("status {}", code.as_u16())).into_response()
}

async fn slow(State(mock): State<Mock>) -> &'static str {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(3)).await;
    "late"
}

async fn spawn_executor(name: &'static str) -> Executor {
    let mock = Mock {
        name,
        hits: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/status/{code}", get(status))
        .route("/slow", get(slow))
        .fallback(echo)
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Executor {
        host,
        hits: mock.hits,
    }
}

/// Accepts connections, reads the request, then hangs up without answering.
async fn spawn_hangup_executor() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            drop(socket);
        }
    });
    host
}

fn refused_host() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Sends a chunked response head and one `hello` chunk, then holds the
/// connection until `release` is notified and hangs up mid-body.
async fn spawn_partial_executor(release: Arc<Notify>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let head = "HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\nx-stream: yes\r\n\r\n5\r\nhello\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
        release.notified().await;
        drop(socket);
    });
    host
}

// ── Harness ────────────────────────────────────────────────────

fn context(executors: &[&str], algorithm: Algorithm, configure: impl FnOnce(&mut ProxyConfig)) -> AppContext {
    let mut config = ProxyConfig {
        secret: PROXY_SECRET.to_string(),
        executor_secret: EXECUTOR_SECRET.to_string(),
        executors: executors.iter().map(|h| h.to_string()).collect(),
        connect_timeout: Duration::from_secs(2),
        max_timeout: Duration::from_secs(10),
        version: "test".to_string(),
        ..ProxyConfig::default()
    };
    configure(&mut config);
    AppContext::new(config, StateStore::in_memory(), algorithm, None)
}

async fn mark_online(ctx: &AppContext, hosts: &[&str]) {
    for host in hosts {
        ctx.state()
            .save_executor(host, ExecutorStatus::Online, 10.0)
            .await;
    }
}

fn request(method: Method, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {PROXY_SECRET}"))
}

async fn send(ctx: &AppContext, req: Request<Body>) -> Response {
    build_router(ctx.clone()).oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_for_runtime(ctx: &AppContext, host: &str, id: &str, want: RuntimeStatus) {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if ctx.state().list_runtimes(host).await.get(id).map(|r| r.status) == Some(want) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "runtime {id} on {host} never became {want}");
}

async fn wait_for_executor(ctx: &AppContext, host: &str, want: ExecutorStatus) {
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if ctx.state().list_executors().await.get(host).map(|e| e.status) == Some(want) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(found.is_ok(), "executor {host} never became {want}");
}

async fn next_frame(body: &mut Body) -> Option<Result<Bytes, axum::Error>> {
    tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no frame in time")
        .map(|frame| frame.map(|f| f.into_data().unwrap_or_default()))
}

// ── Auth ───────────────────────────────────────────────────────

#[tokio::test]
async fn missing_or_wrong_key_is_rejected() {
    let ctx = context(&[], Algorithm::First, |_| {});

    let resp = send(&ctx, Request::get("/v1/ping").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(resp).await;
    assert_eq!(body["message"], "Incorrect proxy key.");
    assert_eq!(body["code"], 401);

    let req = Request::get("/v1/ping")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = Request::get("/v1/proxy/stats").body(Body::empty()).unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn empty_secret_never_authorizes() {
    let ctx = context(&[], Algorithm::First, |c| c.secret.clear());
    let req = Request::get("/v1/ping")
        .header("authorization", "Bearer ")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_needs_no_key() {
    let ctx = context(&[], Algorithm::First, |_| {});
    let resp = send(&ctx, Request::get("/v1/proxy/health").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

// ── Selection ──────────────────────────────────────────────────

#[tokio::test]
async fn round_robin_alternates_between_executors() {
    let one = spawn_executor("mockoon1").await;
    let two = spawn_executor("mockoon2").await;
    let ctx = context(&[&one.host, &two.host], Algorithm::round_robin(), |_| {});
    mark_online(&ctx, &[&one.host, &two.host]).await;

    let first = json_body(send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await).await;
    let second = json_body(send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await).await;
    assert_eq!(first["server"], "mockoon1");
    assert_eq!(second["server"], "mockoon2");

    let req = Request::get("/v1/ping")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_is_relayed_with_executor_secret() {
    let exec = spawn_executor("solo").await;
    let ctx = context(&[&exec.host], Algorithm::First, |_| {});
    mark_online(&ctx, &[&exec.host]).await;

    let req = request(Method::POST, "/v1/runtimes/abc/execution?async=false")
        .header("content-type", "text/plain")
        .body(Body::from("payload"))
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-served-by"], "solo");

    let body = json_body(resp).await;
    assert_eq!(body["method"], "POST");
    assert_eq!(body["path"], "/v1/runtimes/abc/execution?async=false");
    assert_eq!(body["authorization"], format!("Bearer {EXECUTOR_SECRET}"));
    assert_eq!(body["body"], "payload");
    // Production mode: no hostname echo.
    assert_eq!(body["executor_hostname"], Value::Null);
}

#[tokio::test]
async fn development_mode_echoes_executor_hostname() {
    let exec = spawn_executor("dev").await;
    let ctx = context(&[&exec.host], Algorithm::First, |c| c.mode = Mode::Development);
    mark_online(&ctx, &[&exec.host]).await;

    let body = json_body(send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await).await;
    assert_eq!(body["executor_hostname"], exec.host.as_str());
}

#[tokio::test]
async fn offline_executors_are_skipped_while_one_is_online() {
    let up = spawn_executor("up").await;
    let down = spawn_executor("down").await;
    let ctx = context(&[&down.host, &up.host], Algorithm::round_robin(), |_| {});
    mark_online(&ctx, &[&up.host]).await;
    ctx.state()
        .save_executor(&down.host, ExecutorStatus::Offline, 0.0)
        .await;

    for _ in 0..4 {
        let body = json_body(send(&ctx, request(Method::GET, "/").body(Body::empty()).unwrap()).await).await;
        assert_eq!(body["server"], "up");
    }
    assert_eq!(down.hits(), 0);
}

#[tokio::test]
async fn no_executors_is_404() {
    let ctx = context(&[], Algorithm::First, |_| {});
    let resp = send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["message"], "No online executor found");
}

#[tokio::test]
async fn unknown_addressing_method_still_routes() {
    let exec = spawn_executor("fallback").await;
    let ctx = context(&[&exec.host], Algorithm::First, |_| {});
    // Offline in state: only the last-resort tier can pick it.
    ctx.state()
        .save_executor(&exec.host, ExecutorStatus::Offline, 100.0)
        .await;

    let req = request(Method::GET, "/v1/ping")
        .header("x-opr-addressing-method", "multicast")
        .body(Body::empty())
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["server"], "fallback");
}

// ── Broadcast ──────────────────────────────────────────────────

#[tokio::test]
async fn broadcast_reaches_every_online_executor() {
    let one = spawn_executor("b1").await;
    let two = spawn_executor("b2").await;
    let ctx = context(&[&one.host, &two.host], Algorithm::First, |_| {});
    mark_online(&ctx, &[&one.host, &two.host]).await;

    let req = request(Method::POST, "/v1/runtimes")
        .header("x-opr-addressing-method", "broadcast")
        .body(Body::from("{}"))
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.is_empty());

    eventually(|| one.hits() == 1 && two.hits() == 1).await;
}

#[tokio::test]
async fn broadcast_without_online_executors_is_404() {
    let exec = spawn_executor("idle").await;
    let ctx = context(&[&exec.host], Algorithm::First, |_| {});

    let req = request(Method::DELETE, "/v1/runtimes/x")
        .header("x-opr-addressing-method", "broadcast")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(exec.hits(), 0);
}

// ── State feedback ─────────────────────────────────────────────

#[tokio::test]
async fn runtime_hint_is_marked_warm_before_dispatch() {
    let exec = spawn_executor("warm").await;
    let ctx = context(&[&exec.host], Algorithm::First, |_| {});
    mark_online(&ctx, &[&exec.host]).await;

    let req = request(Method::POST, "/v1/runtimes/rt-1/execution")
        .header("x-opr-runtime-id", "rt-1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&ctx, req).await.status(), StatusCode::OK);

    let runtimes = ctx.state().list_runtimes(&exec.host).await;
    assert_eq!(runtimes.len(), 1);
    assert_eq!(runtimes["rt-1"].status, RuntimeStatus::Pass);
    assert_eq!(runtimes["rt-1"].usage, 0.0);
}

#[tokio::test]
async fn refused_connection_marks_executor_down() {
    let dead = refused_host();
    let ctx = context(&[&dead], Algorithm::First, |_| {});
    mark_online(&ctx, &[&dead]).await;
    ctx.state()
        .save_runtime(&dead, "rt-old", RuntimeStatus::Pass, 5.0)
        .await;

    let resp = send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("(connect)"), "{message}");

    let executor = &ctx.state().list_executors().await[&dead];
    assert_eq!(executor.status, ExecutorStatus::Offline);
    assert_eq!(executor.usage, 100.0);
    assert!(ctx.state().list_runtimes(&dead).await.is_empty());
}

#[tokio::test]
async fn unresolvable_executor_is_marked_down() {
    let host = "no-such-executor.invalid:80";
    let ctx = context(&[host], Algorithm::First, |c| {
        c.max_timeout = Duration::from_secs(3);
    });
    mark_online(&ctx, &[host]).await;
    ctx.state()
        .save_runtime(host, "rt-old", RuntimeStatus::Pass, 5.0)
        .await;

    let resp = send(&ctx, request(Method::GET, "/v1/ping").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    let message = body["message"].as_str().unwrap();
    // Resolvers without network access may stall until the deadline instead.
    assert!(
        message.contains("(resolve)") || message.contains("(timeout)"),
        "{message}"
    );

    let executor = &ctx.state().list_executors().await[host];
    assert_eq!(executor.status, ExecutorStatus::Offline);
    assert_eq!(executor.usage, 100.0);
    assert!(ctx.state().list_runtimes(host).await.is_empty());
}

#[tokio::test]
async fn hangup_marks_only_the_runtime_failed() {
    let host = spawn_hangup_executor().await;
    let ctx = context(&[&host], Algorithm::First, |_| {});
    mark_online(&ctx, &[&host]).await;

    let req = request(Method::GET, "/v1/ping")
        .header("x-opr-runtime-id", "rt-crash")
        .body(Body::empty())
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let runtimes = ctx.state().list_runtimes(&host).await;
    assert_eq!(runtimes["rt-crash"].status, RuntimeStatus::Fail);
    assert_eq!(runtimes["rt-crash"].usage, 0.0);
    assert_eq!(
        ctx.state().list_executors().await[&host].status,
        ExecutorStatus::Online
    );
}

#[tokio::test]
async fn total_timeout_marks_executor_down() {
    let exec = spawn_executor("sleepy").await;
    let ctx = context(&[&exec.host], Algorithm::First, |c| {
        c.max_timeout = Duration::from_millis(200);
    });
    mark_online(&ctx, &[&exec.host]).await;

    let resp = send(&ctx, request(Method::GET, "/slow").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(resp).await["message"].as_str().unwrap().contains("(timeout)"));
    assert_eq!(
        ctx.state().list_executors().await[&exec.host].status,
        ExecutorStatus::Offline
    );
}

// ── Response relay ─────────────────────────────────────────────

#[tokio::test]
async fn status_and_headers_relay_in_both_modes() {
    let exec = spawn_executor("codes").await;
    for buffer_responses in [false, true] {
        let ctx = context(&[&exec.host], Algorithm::First, |c| {
            c.buffer_responses = buffer_responses;
        });
        mark_online(&ctx, &[&exec.host]).await;

        let resp = send(&ctx, request(Method::GET, "/status/418").body(Body::empty()).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.headers()["x-custom"], "yes");
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"status 418");
    }
}

#[tokio::test]
async fn streaming_relays_chunks_before_upstream_finishes() {
    let release = Arc::new(Notify::new());
    let host = spawn_partial_executor(release.clone()).await;
    let ctx = context(&[&host], Algorithm::First, |_| {});
    mark_online(&ctx, &[&host]).await;

    let req = request(Method::GET, "/v1/stream")
        .header("x-opr-runtime-id", "rt-s")
        .body(Body::empty())
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-stream"], "yes");

    // The executor is still holding the connection open.
    let mut body = resp.into_body();
    let first = next_frame(&mut body).await.unwrap().unwrap();
    assert_eq!(&first[..], b"hello");

    release.notify_one();
    let tail = next_frame(&mut body).await;
    assert!(matches!(tail, Some(Err(_))), "{tail:?}");

    wait_for_runtime(&ctx, &host, "rt-s", RuntimeStatus::Fail).await;
    assert_eq!(
        ctx.state().list_executors().await[&host].status,
        ExecutorStatus::Online
    );
}

#[tokio::test]
async fn deadline_mid_stream_marks_executor_down() {
    let host = spawn_partial_executor(Arc::new(Notify::new())).await;
    let ctx = context(&[&host], Algorithm::First, |c| {
        c.max_timeout = Duration::from_millis(300);
    });
    mark_online(&ctx, &[&host]).await;

    let req = request(Method::GET, "/v1/stream")
        .header("x-opr-runtime-id", "rt-t")
        .body(Body::empty())
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut body = resp.into_body();
    let first = next_frame(&mut body).await.unwrap().unwrap();
    assert_eq!(&first[..], b"hello");
    let tail = next_frame(&mut body).await;
    assert!(matches!(tail, Some(Err(_))), "{tail:?}");

    wait_for_executor(&ctx, &host, ExecutorStatus::Offline).await;
    assert!(ctx.state().list_runtimes(&host).await.is_empty());
}

// ── Errors ─────────────────────────────────────────────────────

#[tokio::test]
async fn error_body_detail_depends_on_mode() {
    let ctx = context(&[], Algorithm::First, |_| {});
    let resp = send(&ctx, request(Method::GET, "/x").body(Body::empty()).unwrap()).await;
    let body = json_body(resp).await;
    let mut keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    assert_eq!(keys, ["code", "message", "version"]);
    assert_eq!(body["version"], "test");

    let ctx = context(&[], Algorithm::First, |c| c.mode = Mode::Development);
    let resp = send(&ctx, request(Method::GET, "/x").body(Body::empty()).unwrap()).await;
    let body = json_body(resp).await;
    assert!(body["file"].is_string());
    assert!(body["line"].is_number());
    assert!(body.get("trace").is_some());
}

#[tokio::test]
async fn oversized_payload_is_refused() {
    let exec = spawn_executor("small").await;
    let ctx = context(&[&exec.host], Algorithm::First, |c| c.max_payload_size = 16);
    mark_online(&ctx, &[&exec.host]).await;

    let req = request(Method::POST, "/upload")
        .body(Body::from(vec![b'x'; 64]))
        .unwrap();
    let resp = send(&ctx, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(exec.hits(), 0);
}

// ── Diagnostics ────────────────────────────────────────────────

#[tokio::test]
async fn stats_lists_executors_with_runtimes() {
    let ctx = context(&[], Algorithm::First, |_| {});
    mark_online(&ctx, &["exec-a"]).await;
    ctx.state()
        .save_runtime("exec-a", "rt", RuntimeStatus::Pass, 3.0)
        .await;

    let resp = send(&ctx, request(Method::GET, "/v1/proxy/stats").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["exec-a"]["status"], "online");
    assert_eq!(body["exec-a"]["usage"], 10.0);
    assert_eq!(body["exec-a"]["runtimes"]["rt"]["status"], "pass");
}

#[tokio::test]
async fn redis_perf_reports_runtime_sizes() {
    let ctx = context(&[], Algorithm::First, |_| {});
    mark_online(&ctx, &["a", "b"]).await;
    ctx.state().save_runtime("a", "r1", RuntimeStatus::Pass, 0.0).await;
    ctx.state().save_runtime("a", "r2", RuntimeStatus::Pass, 0.0).await;

    let resp = send(&ctx, request(Method::GET, "/v1/debug/redis-perf").body(Body::empty()).unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["stats"]["runtime_sizes"], json!({"a": 2, "b": 0}));
    assert!(body["stats"]["executor_query_time_ms"].is_number());
    assert!(body["timestamp_ms"].as_u64().unwrap() > 0);
}
