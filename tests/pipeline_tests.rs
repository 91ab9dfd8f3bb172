//! Integration tests for the authenticated request pipeline: bearer
//! injection, header merging, the single-retry 401 contract, and response
//! envelope parsing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use feishu_mcp::client::pipeline::parse_response;
use feishu_mcp::client::{RequestPipeline, TokenSource};
use feishu_mcp::error::{FeishuError, Result};
use feishu_mcp::services::DocumentService;

// ---------------------------------------------------------------------------
// Mock token source
// ---------------------------------------------------------------------------

/// Token source with scripted refresh behavior and call counters.
struct MockTokenSource {
    initial: String,
    refreshed: Option<String>,
    reauthorized: String,
    ensure_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    reauthorize_calls: AtomicUsize,
}

impl MockTokenSource {
    fn new(initial: &str, refreshed: Option<&str>, reauthorized: &str) -> Arc<Self> {
        Arc::new(Self {
            initial: initial.to_string(),
            refreshed: refreshed.map(String::from),
            reauthorized: reauthorized.to_string(),
            ensure_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            reauthorize_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenSource for MockTokenSource {
    async fn ensure_token(&self) -> Result<String> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.initial.clone())
    }

    async fn refresh_after(&self, _stale: &str) -> Option<String> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshed.clone()
    }

    async fn reauthorize(&self) -> Result<String> {
        self.reauthorize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reauthorized.clone())
    }
}

// ---------------------------------------------------------------------------
// Bearer injection and header merging
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pipeline_injects_bearer_and_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("authorization", "Bearer T1"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", None, "T9");
    let pipeline = RequestPipeline::new(source.clone());

    let response = pipeline.get(&format!("{}/ping", server.uri())).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(source.ensure_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn caller_headers_win_except_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .and(header("authorization", "Bearer T1"))
        .and(header("content-type", "text/plain"))
        .and(header("x-request-tag", "custom"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", None, "T9");
    let pipeline = RequestPipeline::new(source);

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("text/plain"),
    );
    headers.insert(
        "x-request-tag",
        reqwest::header::HeaderValue::from_static("custom"),
    );
    // Caller-supplied Authorization must be overridden by the pipeline.
    headers.insert(
        reqwest::header::AUTHORIZATION,
        reqwest::header::HeaderValue::from_static("Bearer forged"),
    );

    let response = pipeline
        .request(
            reqwest::Method::GET,
            &format!("{}/ping", server.uri()),
            None,
            Some(headers),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

// ---------------------------------------------------------------------------
// 401 retry contract
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_response_triggers_exactly_one_refresh_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", Some("T2"), "T9");
    let pipeline = RequestPipeline::new(source.clone());

    let response = pipeline.get(&format!("{}/doc", server.uri())).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.reauthorize_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_refresh_falls_back_to_reauthorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .and(header("authorization", "Bearer T9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", None, "T9");
    let pipeline = RequestPipeline::new(source.clone());

    let response = pipeline.get(&format!("{}/doc", server.uri())).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.reauthorize_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_unauthorized_response_is_returned_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", Some("T2"), "T9");
    let pipeline = RequestPipeline::new(source.clone());

    // Exactly two HTTP calls: the original and one retry, never a third.
    let response = pipeline.get(&format!("{}/doc", server.uri())).await.unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.reauthorize_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_auth_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", Some("T2"), "T9");
    let pipeline = RequestPipeline::new(source.clone());

    let response = pipeline.get(&format!("{}/doc", server.uri())).await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(source.refresh_calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Envelope parsing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parse_response_unwraps_data_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": { "title": "Notes" },
        })))
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/doc", server.uri())).await.unwrap();
    let data = parse_response(response).await.unwrap();
    assert_eq!(data["title"], "Notes");
}

#[tokio::test]
async fn parse_response_surfaces_business_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1770002,
            "msg": "not found",
        })))
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/doc", server.uri())).await.unwrap();
    let err = parse_response(response).await.unwrap_err();
    match err {
        FeishuError::Business { code, message } => {
            assert_eq!(code, 1770002);
            assert_eq!(message, "not found");
        }
        other => panic!("expected business error, got {other:?}"),
    }
}

#[tokio::test]
async fn parse_response_surfaces_http_errors_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let response = reqwest::get(format!("{}/doc", server.uri())).await.unwrap();
    let err = parse_response(response).await.unwrap_err();
    match err {
        FeishuError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "forbidden");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Document service over the pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_documents_reshapes_the_drive_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v1/files"))
        .and(query_param("page_size", "10"))
        .and(query_param("folder_token", "fldr"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "files": [
                    { "token": "doccn1", "name": "Notes", "type": "docx",
                      "parent_token": "fldr", "url": "https://example.com/doccn1" },
                ],
                "has_more": false,
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = MockTokenSource::new("T1", None, "T9");
    let pipeline = Arc::new(RequestPipeline::new(source));
    let documents = DocumentService::new(pipeline, server.uri());

    let list = documents
        .list_documents(Some("fldr"), 10, None)
        .await
        .unwrap();
    assert_eq!(list.files.len(), 1);
    assert_eq!(list.files[0].token.as_deref(), Some("doccn1"));
    assert_eq!(list.files[0].kind.as_deref(), Some("docx"));
    assert!(!list.has_more);
}

#[tokio::test]
async fn update_document_requires_content_or_requests() {
    let source = MockTokenSource::new("T1", None, "T9");
    let pipeline = Arc::new(RequestPipeline::new(source));
    let documents = DocumentService::new(pipeline, "http://127.0.0.1:1");

    let err = documents
        .update_document("doccn1", None, None, None, -1, None, "open_id")
        .await
        .unwrap_err();
    assert!(matches!(err, FeishuError::InvalidArgument(_)));
}
