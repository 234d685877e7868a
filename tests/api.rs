//! HTTP surface exercised against a server bound to an ephemeral port.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use pagechat_backend::core::config::{AppPaths, ConfigService, Settings, StorageBackend};
use pagechat_backend::server::router::router;
use pagechat_backend::state::AppState;

const PAGE_URL: &str = "https://bakery.example";
const PAGE_TEXT: &str = "The bakery opens at seven every morning.\n\n\
    Sourdough bread is baked fresh daily with organic flour.\n\n\
    Gift cards can be bought at the counter.";

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: tempfile::TempDir,
}

async fn spawn_server() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        dir.path().to_path_buf(),
        dir.path().join("data"),
    ));
    let config = ConfigService::new(paths.clone());

    let mut settings = Settings::default();
    settings.rag.chunk_size = 80;
    settings.rag.chunk_overlap = 10;
    settings.rag.storage_backend = StorageBackend::Memory;

    let state = AppState::build(paths, config, settings).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn index_text(&self) -> reqwest::Response {
        self.client
            .post(self.url("/api/pages"))
            .json(&json!({ "url": PAGE_URL, "title": "Bakery", "text": PAGE_TEXT }))
            .send()
            .await
            .unwrap()
    }

    async fn new_session(&self) -> String {
        let body: Value = self
            .client
            .post(self.url("/api/sessions"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["session_id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn health_reports_backends() {
    let server = spawn_server().await;
    let body: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["embedder"], "local");
    assert_eq!(body["index"], "memory");
    assert_eq!(body["generator"], false);
}

#[tokio::test]
async fn index_ask_history_and_reset() {
    let server = spawn_server().await;

    let response = server.index_text().await;
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["source_url"], PAGE_URL);
    assert_eq!(report["title"], "Bakery");
    assert!(report["chunks_indexed"].as_u64().unwrap() >= 3);

    let session_id = server.new_session().await;
    let outcome: Value = server
        .client
        .post(server.url(&format!("/api/sessions/{session_id}/ask")))
        .json(&json!({ "source_url": PAGE_URL, "question": "Is the sourdough bread fresh?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        outcome["answer"],
        "Sourdough bread is baked fresh daily with organic flour."
    );
    assert_eq!(outcome["mode"], "fallback");
    assert_eq!(outcome["search_unavailable"], false);
    assert!(!outcome["retrieval"]["hits"].as_array().unwrap().is_empty());

    let history: Value = server
        .client
        .get(server.url(&format!("/api/sessions/{session_id}/history?limit=5")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["turns"].as_array().unwrap().len(), 1);
    assert_eq!(history["turns"][0]["question"], "Is the sourdough bread fresh?");

    let reset: Value = server
        .client
        .delete(server.url(&format!("/api/sessions/{session_id}/history")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["success"], true);

    let session: Value = server
        .client
        .get(server.url(&format!("/api/sessions/{session_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["state"], "empty");
}

#[tokio::test]
async fn unrelated_question_returns_fixed_answer() {
    let server = spawn_server().await;
    server.index_text().await;
    let session_id = server.new_session().await;

    let outcome: Value = server
        .client
        .post(server.url(&format!("/api/sessions/{session_id}/ask")))
        .json(&json!({ "source_url": PAGE_URL, "question": "Who painted the Mona Lisa?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        outcome["answer"],
        "The answer is not available on the provided website."
    );
    assert_eq!(outcome["mode"], "unavailable");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let server = spawn_server().await;

    let empty = server
        .client
        .post(server.url("/api/pages"))
        .json(&json!({ "url": PAGE_URL, "text": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 422);
    let body: Value = empty.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("nothing to index"));

    let bad_url = server
        .client
        .post(server.url("/api/pages"))
        .json(&json!({ "url": "ftp://bakery.example/menu" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_url.status(), 400);

    let blank_question = server
        .client
        .post(server.url("/api/sessions/s1/ask"))
        .json(&json!({ "source_url": PAGE_URL, "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank_question.status(), 400);

    let missing = server
        .client
        .get(server.url("/api/sessions/does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn delete_page_removes_its_chunks() {
    let server = spawn_server().await;
    server.index_text().await;

    let deleted: Value = server
        .client
        .delete(server.url(&format!("/api/pages?url={PAGE_URL}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(deleted["deleted"].as_u64().unwrap() >= 3);

    let status: Value = server
        .client
        .get(server.url(&format!("/api/pages?url={PAGE_URL}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["indexed"], false);
}
