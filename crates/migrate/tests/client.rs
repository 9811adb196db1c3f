//! Source API client behaviour against a local mock server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use tradeflow_migrate::client::{ApiError, CrmClient, Resource};
use tradeflow_migrate::config::ClientConfig;

const API_KEY: &str = "test-key";

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Mock {
    calls: AtomicU32,
}

impl Mock {
    /// Count the call and return its 1-based number.
    fn hit(&self) -> u32 {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(Deserialize)]
struct PageParams {
    page: u32,
    #[serde(rename = "pageSize")]
    page_size: u32,
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: String) -> CrmClient {
    let config = ClientConfig {
        base_url,
        page_size: 2,
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(40),
        rate_limit_default: Duration::from_millis(20),
        ..ClientConfig::default()
    };
    CrmClient::new(&config, API_KEY).unwrap()
}

fn page(data: Value, page: u32, page_size: u32, total: u64, has_more: bool) -> Response {
    Json(json!({
        "data": data,
        "totalCount": total,
        "page": page,
        "pageSize": page_size,
        "hasMore": has_more,
    }))
    .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer test-key")
}

// ---------------------------------------------------------------------------
// Rate limiting and retries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recovers_after_rate_limit_with_server_wait() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/contacts",
            get(|State(mock): State<Arc<Mock>>, Query(p): Query<PageParams>| async move {
                if mock.hit() == 1 {
                    return (
                        StatusCode::TOO_MANY_REQUESTS,
                        [(header::RETRY_AFTER, "2")],
                        "slow down",
                    )
                        .into_response();
                }
                page(json!([{ "id": "c-1" }]), p.page, p.page_size, 1, false)
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let started = Instant::now();
    let result = client
        .fetch_page::<Value>(Resource::Contacts, 1, 50)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(result.data.len(), 1);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_budget() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/jobs",
            get(|State(mock): State<Arc<Mock>>| async move {
                mock.hit();
                StatusCode::TOO_MANY_REQUESTS
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let err = client
        .fetch_page::<Value>(Resource::Jobs, 1, 10)
        .await
        .unwrap_err();

    assert_matches!(err, ApiError::RateLimited { attempts: 3 });
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn server_errors_retry_then_surface_last_error() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/contacts",
            get(|State(mock): State<Arc<Mock>>| async move {
                mock.hit();
                (StatusCode::SERVICE_UNAVAILABLE, "maintenance")
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let err = client
        .fetch_page::<Value>(Resource::Contacts, 1, 10)
        .await
        .unwrap_err();

    assert_matches!(err, ApiError::Status { status: 503, ref body } if body == "maintenance");
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn transient_failure_then_success() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/contacts",
            get(|State(mock): State<Arc<Mock>>| async move {
                if mock.hit() < 3 {
                    return StatusCode::BAD_GATEWAY.into_response();
                }
                page(json!([{ "id": 1 }, { "id": 2 }]), 1, 2, 2, false)
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let result = client
        .fetch_page::<Value>(Resource::Contacts, 1, 2)
        .await
        .unwrap();
    assert_eq!(result.data.len(), 2);
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/contacts",
            get(|State(mock): State<Arc<Mock>>| async move {
                mock.hit();
                (StatusCode::UNAUTHORIZED, "invalid token")
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let err = client
        .fetch_page::<Value>(Resource::Contacts, 1, 10)
        .await
        .unwrap_err();
    assert_matches!(err, ApiError::Status { status: 401, .. });
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn malformed_envelope_is_a_decode_error() {
    let router = Router::new().route("/contacts", get(|| async { "<html>oops</html>" }));
    let client = client(serve(router).await);

    let err = client
        .fetch_page::<Value>(Resource::Contacts, 1, 10)
        .await
        .unwrap_err();
    assert_matches!(err, ApiError::Decode(_));
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_all_walks_pages_in_order() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/contacts",
            get(
                |State(mock): State<Arc<Mock>>, headers: HeaderMap, Query(p): Query<PageParams>| async move {
                    mock.hit();
                    if !authorized(&headers) {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    let all: Vec<Value> = (1..=5).map(|i| json!({ "id": format!("c-{i}") })).collect();
                    let start = ((p.page - 1) * p.page_size) as usize;
                    let end = (start + p.page_size as usize).min(all.len());
                    let data = all[start.min(end)..end].to_vec();
                    page(Value::Array(data), p.page, p.page_size, 5, end < all.len())
                },
            ),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let records: Vec<Value> = client.fetch_all(Resource::Contacts).await.unwrap();

    let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["c-1", "c-2", "c-3", "c-4", "c-5"]);
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn empty_page_stops_pagination() {
    let mock = Arc::new(Mock::default());
    let router = Router::new()
        .route(
            "/jobs",
            get(|State(mock): State<Arc<Mock>>, Query(p): Query<PageParams>| async move {
                mock.hit();
                let data = if p.page == 1 { json!([{ "id": "j-1" }]) } else { json!([]) };
                // Always claims there is more.
                page(data, p.page, p.page_size, 100, true)
            }),
        )
        .with_state(mock.clone());
    let client = client(serve(router).await);

    let records: Vec<Value> = client.fetch_all(Resource::Jobs).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn fetch_all_propagates_page_failure() {
    let router = Router::new().route(
        "/jobs",
        get(|Query(p): Query<PageParams>| async move {
            if p.page == 1 {
                page(json!([{ "id": "j-1" }]), 1, p.page_size, 3, true)
            } else {
                StatusCode::FORBIDDEN.into_response()
            }
        }),
    );
    let client = client(serve(router).await);

    let err = client.fetch_all::<Value>(Resource::Jobs).await.unwrap_err();
    assert_matches!(err, ApiError::Status { status: 403, .. });
}

// ---------------------------------------------------------------------------
// Connection test
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_test_reports_instead_of_failing() {
    let router = Router::new().route(
        "/contacts",
        get(|headers: HeaderMap, Query(p): Query<PageParams>| async move {
            assert_eq!(p.page_size, 1);
            if authorized(&headers) {
                page(json!([]), 1, 1, 0, false)
            } else {
                (StatusCode::UNAUTHORIZED, "bad credential").into_response()
            }
        }),
    );
    let base_url = serve(router).await;

    let ok = client(base_url.clone()).test_connection().await;
    assert!(ok.ok);
    assert_eq!(ok.error, None);

    let config = ClientConfig {
        base_url,
        ..ClientConfig::default()
    };
    let rejected = CrmClient::new(&config, "wrong").unwrap().test_connection().await;
    assert!(!rejected.ok);
    assert!(rejected.error.unwrap().contains("401"));
}
