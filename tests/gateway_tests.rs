//! End-to-end tests for the gateway router.
//!
//! The router runs against an in-memory store double, driven through
//! `tower::ServiceExt::oneshot` so no network or real datasheet is
//! involved. Covers the CRUD round-trip, the validation/404/429 failure
//! contract, and the existence-check-before-mutate protocol.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use bookshelf_gateway::books::BookService;
use bookshelf_gateway::server::{create_router, AppState};
use bookshelf_gateway::store::{Record, RecordStore, RetryPolicy, StoreError, StoreResult};

/// In-memory store double with scripted rate limiting and call accounting.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<Record>>,
    next_id: AtomicU32,
    /// Fail this many leading calls with a rate-limit error.
    rate_limit_first: AtomicU32,
    /// Fail this many update calls with a rate-limit error, leaving reads
    /// healthy.
    rate_limit_updates: AtomicU32,
    calls: AtomicU32,
    write_calls: AtomicU32,
}

impl MemoryStore {
    fn seeded() -> Arc<Self> {
        let store = Self::default();
        let fields = json!({
            "book_name": "三体",
            "book_status": "未被借走",
            "book_location": "A-1"
        });
        store.records.lock().unwrap().push(Record::new(
            "rec1",
            fields.as_object().unwrap().clone(),
        ));
        Arc::new(store)
    }

    fn gate(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.rate_limit_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.rate_limit_first.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::RateLimited("操作过于频繁".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn query(&self) -> StoreResult<Vec<Record>> {
        self.gate()?;
        Ok(self.records.lock().unwrap().clone())
    }

    async fn get(&self, record_id: &str) -> StoreResult<Record> {
        self.gate()?;
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.record_id == record_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))
    }

    async fn create(&self, fields: Map<String, Value>) -> StoreResult<Record> {
        self.gate()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = Record::new(format!("rec-created-{n}"), fields);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update(&self, record_id: &str, fields: Map<String, Value>) -> StoreResult<Record> {
        self.gate()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let throttled = self.rate_limit_updates.load(Ordering::SeqCst);
        if throttled > 0 {
            self.rate_limit_updates.store(throttled - 1, Ordering::SeqCst);
            return Err(StoreError::RateLimited("操作过于频繁".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.record_id == record_id)
            .ok_or_else(|| StoreError::NotFound(record_id.to_string()))?;
        for (k, v) in fields {
            record.fields.insert(k, v);
        }
        Ok(record.clone())
    }

    async fn delete(&self, record_ids: &[String]) -> StoreResult<()> {
        self.gate()?;
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .retain(|r| !record_ids.contains(&r.record_id));
        Ok(())
    }
}

/// Router over the given store, with millisecond backoff so retry-path
/// tests stay fast.
fn test_router(store: Arc<MemoryStore>) -> Router {
    let service = BookService::new(store)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));
    create_router(AppState::new(service))
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = send(test_router(MemoryStore::seeded()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "bookshelf-gateway");
}

#[tokio::test]
async fn test_list_books() {
    let (status, body) = send(test_router(MemoryStore::seeded()), get("/api/books")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["id"], "rec1");
    assert_eq!(body["data"][0]["book_name"], "三体");
    assert_eq!(body["data"][0]["book_status"], "未被借走");
}

#[tokio::test]
async fn test_list_includes_store_specific_fields() {
    let store = MemoryStore::seeded();
    store
        .records
        .lock()
        .unwrap()
        .first_mut()
        .unwrap()
        .fields
        .insert("isbn".to_string(), json!("978-7-5366"));

    let (status, body) = send(test_router(store), get("/api/books")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["isbn"], "978-7-5366");
}

#[tokio::test]
async fn test_get_book_by_id() {
    let (status, body) = send(test_router(MemoryStore::seeded()), get("/api/books/rec1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "rec1");
    assert_eq!(body["data"]["book_location"], "A-1");
}

#[tokio::test]
async fn test_get_missing_book_is_404_with_stable_message() {
    let (status, body) = send(test_router(MemoryStore::seeded()), get("/api/books/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "找不到指定的图书");
}

#[tokio::test]
async fn test_create_then_get_round_trip() {
    let store = MemoryStore::seeded();

    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "POST",
            "/api/books",
            json!({
                "book_name": "A",
                "book_status": "未被借走",
                "book_location": "Shelf1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(body["data"]["book_name"], "A");
    assert_eq!(body["data"]["book_status"], "未被借走");
    assert_eq!(body["data"]["book_location"], "Shelf1");

    let (status, fetched) = send(test_router(store), get(&format!("/api/books/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"], body["data"]);
}

#[tokio::test]
async fn test_create_rejects_bad_status_without_remote_call() {
    let store = MemoryStore::seeded();

    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "POST",
            "/api/books",
            json!({
                "book_name": "A",
                "book_status": "borrowed",
                "book_location": "Shelf1"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "图书状态必须是 \"已被借走\" 或 \"未被借走\"");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_create_rejects_missing_fields() {
    let (status, body) = send(
        test_router(MemoryStore::seeded()),
        with_json("POST", "/api/books", json!({"book_name": "A"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "所有字段都是必填的");
}

#[tokio::test]
async fn test_create_rejects_non_string_fields() {
    let (status, body) = send(
        test_router(MemoryStore::seeded()),
        with_json(
            "POST",
            "/api/books",
            json!({
                "book_name": 1,
                "book_status": "未被借走",
                "book_location": "Shelf1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "所有字段必须为字符串类型");
}

#[tokio::test]
async fn test_create_rejects_missing_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/books")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(test_router(MemoryStore::seeded()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "请求体不能为空");
}

#[tokio::test]
async fn test_update_book() {
    let (status, body) = send(
        test_router(MemoryStore::seeded()),
        with_json(
            "PUT",
            "/api/books/rec1",
            json!({
                "book_name": "三体 II",
                "book_status": "已被借走",
                "book_location": "B-2"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["book_name"], "三体 II");
    assert_eq!(body["data"]["book_status"], "已被借走");
    assert_eq!(body["data"]["book_location"], "B-2");
}

#[tokio::test]
async fn test_update_missing_book_is_404_without_write() {
    let store = MemoryStore::seeded();

    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "PUT",
            "/api/books/ghost",
            json!({
                "book_name": "A",
                "book_status": "未被借走",
                "book_location": "Shelf1"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "找不到指定的图书");
    assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_patch_status() {
    let (status, body) = send(
        test_router(MemoryStore::seeded()),
        with_json(
            "PATCH",
            "/api/books/rec1/status",
            json!({"status": "已被借走"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["book_status"], "已被借走");
    // The other fields survive a status-only patch.
    assert_eq!(body["data"]["book_name"], "三体");
}

#[tokio::test]
async fn test_patch_status_is_idempotent() {
    let store = MemoryStore::seeded();
    let patch = || {
        with_json(
            "PATCH",
            "/api/books/rec1/status",
            json!({"status": "已被借走"}),
        )
    };

    let (_, first) = send(test_router(Arc::clone(&store)), patch()).await;
    let (_, second) = send(test_router(store), patch()).await;
    assert_eq!(first["data"], second["data"]);
}

#[tokio::test]
async fn test_patch_rejects_invalid_status() {
    let store = MemoryStore::seeded();
    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "PATCH",
            "/api/books/rec1/status",
            json!({"status": "returned"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "无效的状态值，必须是 \"已被借走\" 或 \"未被借走\"");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_patch_missing_book_is_404() {
    let (status, body) = send(
        test_router(MemoryStore::seeded()),
        with_json(
            "PATCH",
            "/api/books/ghost/status",
            json!({"status": "已被借走"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "找不到指定的图书");
}

#[tokio::test]
async fn test_delete_book() {
    let store = MemoryStore::seeded();
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/books/rec1")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(test_router(Arc::clone(&store)), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "图书删除成功");
    assert!(store.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_missing_book_is_404_without_write() {
    let store = MemoryStore::seeded();
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/books/ghost")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(test_router(Arc::clone(&store)), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "找不到指定的图书");
    assert_eq!(store.write_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_rate_limits_are_invisible_to_the_client() {
    let store = MemoryStore::seeded();
    store.rate_limit_first.store(2, Ordering::SeqCst);

    let (status, body) = send(test_router(Arc::clone(&store)), get("/api/books/rec1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "rec1");
    // Two throttled attempts plus the successful third.
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_put_rate_limit_exhaustion_surfaces_as_500() {
    // PUT fails with 400/404/500 only; a throttled-out update mutation is
    // a server error, not a 429.
    let store = MemoryStore::seeded();
    store.rate_limit_updates.store(100, Ordering::SeqCst);

    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "PUT",
            "/api/books/rec1",
            json!({
                "book_name": "A",
                "book_status": "未被借走",
                "book_location": "Shelf1"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    // The mutation was still retried to budget before failing.
    assert_eq!(store.write_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_patch_rate_limit_exhaustion_surfaces_as_429() {
    let store = MemoryStore::seeded();
    store.rate_limit_updates.store(100, Ordering::SeqCst);

    let (status, body) = send(
        test_router(Arc::clone(&store)),
        with_json(
            "PATCH",
            "/api/books/rec1/status",
            json!({"status": "已被借走"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "服务器繁忙，请稍后重试");
}

#[tokio::test]
async fn test_exhausted_rate_limit_surfaces_as_429() {
    let store = MemoryStore::seeded();
    store.rate_limit_first.store(100, Ordering::SeqCst);

    let (status, body) = send(test_router(Arc::clone(&store)), get("/api/books")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "服务器繁忙，请稍后重试");
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}
