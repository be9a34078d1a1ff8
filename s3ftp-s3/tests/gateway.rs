//! In-process tests of the S3 gateway against the in-memory FTP server

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use s3ftp_s3::backend::{BackendError, FaultPoint, MemoryFtp};
use s3ftp_s3::S3Gateway;
use tower::ServiceExt;

fn app(server: &MemoryFtp) -> Router {
    S3Gateway::with_connector(Arc::new(server.clone())).router()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: impl Into<Body>,
) -> (StatusCode, HeaderMap, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8_lossy(&bytes).into_owned())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, String) {
    send(app, Method::GET, uri, Body::empty()).await
}

// === Health and bucket ===

#[tokio::test]
async fn test_health_skips_backend() {
    let server = MemoryFtp::new();
    server.set_unavailable(true);
    let app = app(&server);

    let (status, headers, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
    assert!(headers.contains_key("x-amz-request-id"));
    assert_eq!(server.connects(), 0);
}

#[tokio::test]
async fn test_list_buckets() {
    let server = MemoryFtp::new();
    let (status, headers, body) = get(&app(&server), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/xml");
    assert!(body.contains("<ListAllMyBucketsResult"));
    assert!(body.contains("<Name>default</Name>"));
    assert_eq!(body.matches("<Bucket>").count(), 1);
}

#[tokio::test]
async fn test_head_bucket() {
    let server = MemoryFtp::new();
    let app = app(&server);

    let (status, headers, _) = send(&app, Method::HEAD, "/default", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-amz-bucket-region"], "us-east-1");

    let (status, _, _) = send(&app, Method::HEAD, "/photos", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// === Listing ===

#[tokio::test]
async fn test_list_v2_groups_by_delimiter() {
    let server = MemoryFtp::new();
    server.seed_file("a/x.txt", "x");
    server.seed_file("a/sub/y.txt", "y");

    let (status, _, body) = get(
        &app(&server),
        "/default?list-type=2&prefix=a%2F&delimiter=%2F",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Key>a/x.txt</Key>"));
    assert!(body.contains("<CommonPrefixes>\n    <Prefix>a/sub/</Prefix>"));
    assert!(!body.contains("<Key>a/sub/</Key>"));
    assert!(body.contains("<KeyCount>2</KeyCount>"));
}

#[tokio::test]
async fn test_list_v2_at_root() {
    let server = MemoryFtp::new();
    server.seed_file("top.txt", "t");
    server.seed_file(".hidden", "h");

    let (status, _, body) = get(&app(&server), "/?list-type=2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Key>top.txt</Key>"));
    assert!(!body.contains(".hidden"));
    assert!(body.contains("<KeyCount>1</KeyCount>"));
}

#[tokio::test]
async fn test_list_v2_missing_prefix_is_empty() {
    let server = MemoryFtp::new();
    let (status, _, body) = get(&app(&server), "/default?list-type=2&prefix=nope%2F").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<KeyCount>0</KeyCount>"));
    assert!(!body.contains("<Contents>"));
}

#[tokio::test]
async fn test_list_v2_unknown_bucket() {
    let server = MemoryFtp::new();
    let (status, _, body) = get(&app(&server), "/photos?list-type=2").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("<Code>NoSuchBucket</Code>"));
}

#[tokio::test]
async fn test_repeated_query_parameter_uses_first_value() {
    let server = MemoryFtp::new();
    server.seed_file("a/x.txt", "x");
    server.seed_file("b/y.txt", "y");

    let (status, headers, body) =
        get(&app(&server), "/?list-type=2&prefix=a/&prefix=b/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("x-amz-request-id"));
    assert!(body.contains("<Prefix>a/</Prefix>"));
    assert!(body.contains("<Key>a/x.txt</Key>"));
    assert!(!body.contains("b/y.txt"));
}

#[tokio::test]
async fn test_list_v1_is_flat() {
    let server = MemoryFtp::new();
    server.seed_file("a/x.txt", "x");
    server.seed_file("a/sub/y.txt", "y");

    let (status, _, body) = get(&app(&server), "/?prefix=a/&delimiter=/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Key>a/x.txt</Key>"));
    assert!(body.contains("<Key>a/sub/</Key>"));
    assert!(!body.contains("KeyCount"));
    assert!(!body.contains("<CommonPrefixes>"));
}

#[tokio::test]
async fn test_list_v1_on_bucket_path() {
    let server = MemoryFtp::new();
    server.seed_file("top.txt", "t");

    let (status, _, body) = get(&app(&server), "/default").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<Key>top.txt</Key>"));
    assert!(body.contains("<Marker></Marker>"));
}

#[tokio::test]
async fn test_list_backend_failure_is_internal_error() {
    let server = MemoryFtp::new();
    server.inject(
        FaultPoint::List,
        BackendError::from_reply(550, "Permission denied"),
    );

    let (status, _, body) = get(&app(&server), "/?list-type=2").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<Message>550 Permission denied</Message>"));
}

// === Objects ===

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let server = MemoryFtp::new();
    let app = app(&server);

    let (status, headers, _) =
        send(&app, Method::PUT, "/default/docs/a.txt", "hello world").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["etag"], "\"d41d8cd98f00b204e9800998ecf8427e\"");
    assert!(server.has_dir("docs"));

    let (status, headers, body) = get(&app, "/default/docs/a.txt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello world");
    assert_eq!(headers["content-type"], "application/octet-stream");
    assert_eq!(headers["etag"], "\"d41d8cd98f00b204e9800998ecf8427e\"");
}

#[tokio::test]
async fn test_large_object_round_trip() {
    let server = MemoryFtp::new();
    let app = app(&server);
    let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/default/big.bin")
        .body(Body::from(data.clone()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.file("big.bin").map(|b| b.len()), Some(data.len()));

    let request = Request::builder()
        .uri("/default/big.bin")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_percent_encoded_key() {
    let server = MemoryFtp::new();
    let app = app(&server);

    let (status, _, _) = send(&app, Method::PUT, "/default/my%20file.txt", "x").await;
    assert_eq!(status, StatusCode::OK);
    assert!(server.file("my file.txt").is_some());
}

#[tokio::test]
async fn test_get_missing_key() {
    let server = MemoryFtp::new();
    let (status, headers, body) = get(&app(&server), "/default/missing.txt").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("<Code>NoSuchKey</Code>"));
    assert!(body.contains("Key &quot;missing.txt&quot; does not exist"));

    let request_id = headers["x-amz-request-id"].to_str().unwrap();
    assert!(body.contains(&format!("<RequestId>{}</RequestId>", request_id)));
}

#[tokio::test]
async fn test_get_backend_failure_carries_backend_text() {
    let server = MemoryFtp::new();
    server.seed_file("a.txt", "a");
    server.inject(
        FaultPoint::Retrieve,
        BackendError::from_reply(550, "Permission denied"),
    );

    let (status, _, body) = get(&app(&server), "/default/a.txt").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("<Code>InternalError</Code>"));
    assert!(body.contains("550 Permission denied"));
}

#[tokio::test]
async fn test_head_object() {
    let server = MemoryFtp::new();
    let modified = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 6).unwrap();
    server.seed_file_at("docs/a.txt", "hello", modified);

    let (status, headers, body) =
        send(&app(&server), Method::HEAD, "/default/docs/a.txt", Body::empty()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers["content-length"], "5");
    assert_eq!(headers["last-modified"], "Sat, 09 Mar 2024 14:05:06 GMT");
    assert_eq!(headers["etag"], "\"d41d8cd98f00b204e9800998ecf8427e\"");
    assert_eq!(headers["accept-ranges"], "bytes");
}

#[tokio::test]
async fn test_head_missing_base_name() {
    let server = MemoryFtp::new();
    server.seed_file("docs/a.txt", "hello");
    let app = app(&server);

    let (status, _, _) = send(&app, Method::HEAD, "/default/docs/b.txt", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, Method::HEAD, "/default/nodir/a.txt", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_object() {
    let server = MemoryFtp::new();
    server.seed_file("a.txt", "a");
    server.seed_file("b.txt", "b");
    let app = app(&server);

    let (status, _, _) = send(&app, Method::DELETE, "/default/a.txt", Body::empty()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = get(&app, "/?list-type=2").await;
    assert!(!body.contains("<Key>a.txt</Key>"));
    assert!(body.contains("<Key>b.txt</Key>"));
}

#[tokio::test]
async fn test_delete_missing_key() {
    let server = MemoryFtp::new();
    let (status, _, body) =
        send(&app(&server), Method::DELETE, "/default/missing.txt", Body::empty()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("<Code>NoSuchKey</Code>"));
}

#[tokio::test]
async fn test_folder_marker_creates_and_removes_directory() {
    let server = MemoryFtp::new();
    let app = app(&server);

    let (status, _, _) = send(&app, Method::PUT, "/default/photos/2024/", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(server.has_dir("photos/2024"));

    let (status, _, _) = send(&app, Method::DELETE, "/default/photos/2024/", Body::empty()).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!server.has_dir("photos/2024"));
}

// === Method handling ===

#[tokio::test]
async fn test_unsupported_methods() {
    let server = MemoryFtp::new();
    let app = app(&server);

    for (method, uri) in [
        (Method::POST, "/default/a.txt"),
        (Method::PATCH, "/default/a.txt"),
        (Method::PUT, "/default"),
        (Method::DELETE, "/"),
    ] {
        let (status, headers, body) = send(&app, method, uri, Body::empty()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{}", uri);
        assert!(body.contains("<Code>MethodNotAllowed</Code>"));
        assert!(headers.contains_key("x-amz-id-2"));
    }
}

#[tokio::test]
async fn test_empty_key_is_invalid() {
    let server = MemoryFtp::new();
    let (status, _, body) = get(&app(&server), "/default//").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("<Code>InvalidArgument</Code>"));
    assert_eq!(server.connects(), 0);
}
