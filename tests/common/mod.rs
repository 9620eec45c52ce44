//! Helpers shared by the integration test binaries.

#![allow(dead_code)]

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn cqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cqa");
    path
}

pub fn run_cqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_cqa_with_env(config_path, args, &[])
}

pub fn run_cqa_with_env(
    config_path: &Path,
    args: &[&str],
    env: &[(&str, &str)],
) -> (String, String, bool) {
    let binary = cqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .envs(env.iter().copied())
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// A request received by the generation stub.
#[derive(Clone, Debug)]
pub struct Captured {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct Stub {
    status: u16,
    reply: Value,
    delay: Duration,
    captured: Arc<Mutex<Vec<Captured>>>,
}

async fn handle_generate(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    stub.captured
        .lock()
        .unwrap()
        .push(Captured { authorization, body });
    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    (
        StatusCode::from_u16(stub.status).unwrap(),
        Json(stub.reply.clone()),
    )
}

/// Serve a Cohere-shaped `/v1/generate` stub on a background thread.
///
/// Every call answers with `status` and `reply` after `delay`.
pub fn spawn_generate_stub(
    status: u16,
    reply: Value,
    delay: Duration,
) -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let stub = Stub {
        status,
        reply,
        delay,
        captured: captured.clone(),
    };
    let app = Router::new()
        .route("/v1/generate", post(handle_generate))
        .with_state(stub);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    (addr, captured)
}

pub fn cohere_reply(text: &str) -> Value {
    serde_json::json!({
        "id": "stub",
        "generations": [ { "id": "g0", "text": text } ],
        "prompt": ""
    })
}

/// Find an available port for a test server.
pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
