//! Gemini File Search client against a wiremock server.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filesearch::providers::SearchProvider;
use filesearch::{ErrorKind, FileSearchError, GeminiClient, SearchParams, StagedFile};

const KEY: &str = "test-key";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::with_base_url(KEY, server.uri())
        .unwrap()
        .with_polling(Duration::from_millis(5), 3)
}

fn staged(dir: &tempfile::TempDir, name: &str, content: &str) -> StagedFile {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    StagedFile {
        path,
        filename: name.to_string(),
        content_type: "text/plain".to_string(),
        size_bytes: content.len() as u64,
    }
}

// ============================================================================
// Stores
// ============================================================================

#[tokio::test]
async fn create_store_returns_resource_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/fileSearchStores"))
        .and(header("x-goog-api-key", KEY))
        .and(body_json(json!({"displayName": "manuals"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "fileSearchStores/manuals-abc123",
            "displayName": "manuals"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let name = client(&server).create_store("manuals").await.unwrap();
    assert_eq!(name, "fileSearchStores/manuals-abc123");
}

#[tokio::test]
async fn delete_store_forces_removal() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1beta/fileSearchStores/manuals-abc123"))
        .and(query_param("force", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .delete_store("fileSearchStores/manuals-abc123")
        .await
        .unwrap();
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn upload_polls_until_done() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = staged(&dir, "guide.txt", "hold the reset button for ten seconds");

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore"))
        .and(query_param("uploadType", "media"))
        .and(header("content-type", "text/plain"))
        .and(body_string("hold the reset button for ten seconds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "fileSearchStores/s1/upload/operations/op-1",
            "done": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/fileSearchStores/s1/upload/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "fileSearchStores/s1/upload/operations/op-1",
            "done": true,
            "response": {"documentName": "fileSearchStores/s1/documents/guide-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client(&server).upload("fileSearchStores/s1", &file).await.unwrap();
    assert_eq!(ack.document, "fileSearchStores/s1/documents/guide-1");
}

#[tokio::test]
async fn upload_operation_error_is_mapped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = staged(&dir, "bad.txt", "x");

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "op-2",
            "done": true,
            "error": {"code": 3, "message": "unsupported document"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).upload("fileSearchStores/s1", &file).await.unwrap_err();
    match err {
        FileSearchError::Api { status, ref message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "unsupported document");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn upload_that_never_finishes_is_unavailable() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = staged(&dir, "slow.txt", "x");

    Mock::given(method("POST"))
        .and(path("/upload/v1beta/fileSearchStores/s1:uploadToFileSearchStore"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-3", "done": false})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "op-3", "done": false})))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server).upload("fileSearchStores/s1", &file).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn search_extracts_answer_and_deduplicates_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", KEY))
        .and(body_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "how do I reset?"}]}],
            "tools": [{"fileSearch": {"fileSearchStoreNames": ["fileSearchStores/s1"]}}],
            "generationConfig": {"maxOutputTokens": 256}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hold the button "}, {"text": "for ten seconds."}]},
                "groundingMetadata": {"groundingChunks": [
                    {"retrievedContext": {"title": "guide.txt", "uri": "doc://guide"}},
                    {"retrievedContext": {"title": "guide.txt", "uri": "doc://guide"}},
                    {"retrievedContext": {"uri": "doc://faq"}},
                    {"web": {"uri": "https://example.com"}}
                ]}
            }],
            "modelVersion": "gemini-2.5-flash-001"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = SearchParams::default().max_tokens(256);
    let answer = client(&server)
        .search("fileSearchStores/s1", "how do I reset?", &params)
        .await
        .unwrap();

    assert_eq!(answer.answer, "Hold the button for ten seconds.");
    assert_eq!(answer.model, "gemini-2.5-flash-001");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0].title, "guide.txt");
    assert_eq!(answer.sources[1].title, "Untitled");
    assert_eq!(answer.sources[1].uri, "doc://faq");
}

#[tokio::test]
async fn search_uses_requested_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-pro:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = SearchParams::default().model("gemini-2.5-pro");
    let answer = client(&server).search("s", "q", &params).await.unwrap();
    assert_eq!(answer.model, "gemini-2.5-pro");
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn no_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let err = client(&server)
        .search("s", "q", &SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FileSearchError::EmptyResponse));
    assert!(err.is_transient());
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
        .mount(&server)
        .await;

    let err = client(&server).create_store("x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
}

#[tokio::test]
async fn api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let err = client(&server).create_store("x").await.unwrap_err();
    match &err {
        FileSearchError::Api { status, message } => {
            assert_eq!(*status, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server).create_store("x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.is_transient());
}
