//! End-to-end indexing and question answering through the library API.

use std::sync::Arc;

use pagechat_backend::core::config::{Settings, StorageBackend};
use pagechat_backend::core::errors::RagError;
use pagechat_backend::crawler::extract_page;
use pagechat_backend::llm::build_embedder;
use pagechat_backend::memory::SessionStore;
use pagechat_backend::rag::{
    AnswerMode, MemoryVectorIndex, PageInput, RagService, SqliteVectorIndex, UNAVAILABLE_ANSWER,
};

const HTML: &str = r#"<html>
<head><title>Lighthouse Museum</title></head>
<body>
  <nav>Home | Tickets | Contact</nav>
  <main>
    <h1>Visiting the Lighthouse Museum</h1>
    <p>The museum is open from Tuesday to Sunday. Opening hours are nine to five.</p>
    <p>Tickets cost twelve euros for adults. Children under six enter for free.</p>
    <p>The lighthouse tower was built in 1874 and restored in 1998.</p>
  </main>
  <footer>All rights reserved</footer>
</body>
</html>"#;

const URL: &str = "https://museum.example/visit";

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.rag.chunk_size = 120;
    settings.rag.chunk_overlap = 20;
    settings.rag.embedding_dimension = 1024;
    settings.rag.storage_backend = StorageBackend::Memory;
    settings
}

fn museum_page() -> PageInput {
    let extracted = extract_page(HTML).unwrap();
    PageInput {
        cleaned_text: extracted.text,
        source_url: URL.to_string(),
        title: extracted.title,
    }
}

fn service(settings: &Settings) -> RagService {
    RagService::new(
        settings,
        build_embedder(settings).unwrap(),
        Arc::new(MemoryVectorIndex::new()),
        None,
        Arc::new(SessionStore::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn indexes_cleaned_html_and_answers_from_it() {
    let settings = settings();
    let service = service(&settings);

    let report = service.index_page(museum_page()).await.unwrap();
    assert_eq!(report.title, "Lighthouse Museum");
    assert!(report.chunks_indexed >= 2);

    let outcome = service
        .ask("visitor", URL, "How much do tickets cost?")
        .await
        .unwrap();
    assert_eq!(outcome.mode, AnswerMode::Fallback);
    assert!(outcome.answer.contains("Tickets cost twelve euros for adults."));
    assert!(outcome
        .retrieval
        .chunks()
        .all(|chunk| chunk.source_url == URL));

    let again = service
        .ask("visitor", URL, "How much do tickets cost?")
        .await
        .unwrap();
    assert_eq!(outcome.answer, again.answer);
    assert_eq!(service.history("visitor", None).await.len(), 2);
}

#[tokio::test]
async fn footer_and_navigation_never_reach_the_index() {
    let settings = settings();
    let service = service(&settings);
    service.index_page(museum_page()).await.unwrap();

    let outcome = service
        .ask("visitor", URL, "Are all rights reserved?")
        .await
        .unwrap();
    assert!(outcome
        .retrieval
        .chunks()
        .all(|chunk| !chunk.text.contains("rights")));
    assert_eq!(outcome.answer, UNAVAILABLE_ANSWER);
}

#[tokio::test]
async fn unindexed_page_yields_exact_unavailable_answer() {
    let settings = settings();
    let service = service(&settings);

    let outcome = service
        .ask("visitor", "https://nowhere.example", "When was the tower built?")
        .await
        .unwrap();
    assert!(outcome.retrieval.is_empty());
    assert_eq!(
        outcome.answer,
        "The answer is not available on the provided website."
    );
}

#[tokio::test]
async fn sqlite_index_keeps_pages_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("vectors.db");
    let mut settings = settings();
    settings.rag.storage_backend = StorageBackend::Sqlite;

    {
        let index = Arc::new(SqliteVectorIndex::with_path(db_path.clone()).await.unwrap());
        let service = RagService::new(
            &settings,
            build_embedder(&settings).unwrap(),
            index,
            None,
            Arc::new(SessionStore::new()),
        )
        .unwrap();
        service.prepare().await.unwrap();
        service.index_page(museum_page()).await.unwrap();
    }

    let index = Arc::new(SqliteVectorIndex::with_path(db_path).await.unwrap());
    let service = RagService::new(
        &settings,
        build_embedder(&settings).unwrap(),
        index,
        None,
        Arc::new(SessionStore::new()),
    )
    .unwrap();
    service.prepare().await.unwrap();

    let outcome = service
        .ask("visitor", URL, "When was the lighthouse tower built?")
        .await
        .unwrap();
    assert!(outcome.answer.contains("1874"));
}

#[tokio::test]
async fn changing_the_embedder_clears_stale_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("vectors.db");
    let mut settings = settings();

    {
        let index = Arc::new(SqliteVectorIndex::with_path(db_path.clone()).await.unwrap());
        let service = RagService::new(
            &settings,
            build_embedder(&settings).unwrap(),
            index,
            None,
            Arc::new(SessionStore::new()),
        )
        .unwrap();
        service.prepare().await.unwrap();
        service.index_page(museum_page()).await.unwrap();
        assert!(service.page_count(Some(URL)).await.unwrap() > 0);
    }

    settings.rag.embedding_dimension = 256;
    let index = Arc::new(SqliteVectorIndex::with_path(db_path).await.unwrap());
    let service = RagService::new(
        &settings,
        build_embedder(&settings).unwrap(),
        index,
        None,
        Arc::new(SessionStore::new()),
    )
    .unwrap();
    service.prepare().await.unwrap();

    assert_eq!(service.page_count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_chunking_configuration_is_rejected() {
    let mut settings = settings();
    settings.rag.chunk_overlap = settings.rag.chunk_size;

    let result = RagService::new(
        &settings,
        build_embedder(&settings).unwrap(),
        Arc::new(MemoryVectorIndex::new()),
        None,
        Arc::new(SessionStore::new()),
    );
    assert!(matches!(result, Err(RagError::Configuration(_))));
}
