//! End-to-end tests for the gateway
//!
//! A real listener is started on a free port in front of the in-memory FTP
//! server and driven over HTTP, unsigned with reqwest and signed with the
//! AWS SDK.

use std::net::SocketAddr;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use s3ftp::create_router;
use s3ftp_auth::CredentialStore;
use s3ftp_s3::backend::MemoryFtp;
use s3ftp_s3::S3Gateway;
use tokio::net::TcpListener;

const ACCESS_KEY: &str = "AKIDEXAMPLE";
const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

/// Start a server over `ftp` and return its address
async fn start_test_server(ftp: &MemoryFtp, credentials: CredentialStore) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let gateway = S3Gateway::with_connector(Arc::new(ftp.clone()));
    let app = create_router(&gateway, credentials);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn signed() -> CredentialStore {
    CredentialStore::new([(ACCESS_KEY.to_string(), SECRET_KEY.to_string())])
}

/// Create an S3 client for our local server
async fn create_test_client(addr: SocketAddr, secret: &str) -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(format!("http://{}", addr))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            ACCESS_KEY, secret, None, None, "test",
        ))
        .region(aws_sdk_s3::config::Region::new("us-east-1"))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();
    Client::from_conf(s3_config)
}

// =============================================================================
// UNSIGNED
// =============================================================================

#[tokio::test]
async fn test_health() {
    let ftp = MemoryFtp::new();
    let addr = start_test_server(&ftp, CredentialStore::empty()).await;

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_object_lifecycle_without_credentials() {
    let ftp = MemoryFtp::new();
    let addr = start_test_server(&ftp, CredentialStore::empty()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/default/reports/2024/summary.txt", addr);

    let response = client.put(&url).body("quarterly").send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(ftp.has_dir("reports/2024"));

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "quarterly");

    let listing = client
        .get(format!("http://{}/?list-type=2&prefix=reports/2024/", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(listing.contains("<Key>reports/2024/summary.txt</Key>"));

    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 204);

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert!(response.headers().contains_key("x-amz-request-id"));
}

#[tokio::test]
async fn test_unsigned_request_rejected_when_credentials_configured() {
    let ftp = MemoryFtp::new();
    ftp.seed_file("a.txt", "a");
    let addr = start_test_server(&ftp, signed()).await;

    let response = reqwest::get(format!("http://{}/default/a.txt", addr))
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body = response.text().await.unwrap();
    assert!(body.contains("<Code>AccessDenied</Code>"));

    // Health stays open
    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
}

// =============================================================================
// SIGNED (AWS SDK)
// =============================================================================

#[tokio::test]
async fn test_sdk_list_buckets() {
    let ftp = MemoryFtp::new();
    let addr = start_test_server(&ftp, signed()).await;
    let client = create_test_client(addr, SECRET_KEY).await;

    let result = client.list_buckets().send().await.unwrap();
    let names: Vec<&str> = result.buckets().iter().filter_map(|b| b.name()).collect();
    assert_eq!(names, vec!["default"]);
}

#[tokio::test]
async fn test_sdk_list_objects_v2_with_delimiter() {
    let ftp = MemoryFtp::new();
    ftp.seed_file("docs/a.txt", "hello");
    ftp.seed_file("docs/archive/old.txt", "old");
    let addr = start_test_server(&ftp, signed()).await;
    let client = create_test_client(addr, SECRET_KEY).await;

    let result = client
        .list_objects_v2()
        .bucket("default")
        .prefix("docs/")
        .delimiter("/")
        .send()
        .await
        .unwrap();

    let keys: Vec<&str> = result.contents().iter().filter_map(|o| o.key()).collect();
    assert_eq!(keys, vec!["docs/a.txt"]);

    let prefixes: Vec<&str> = result
        .common_prefixes()
        .iter()
        .filter_map(|p| p.prefix())
        .collect();
    assert_eq!(prefixes, vec!["docs/archive/"]);
    assert_eq!(result.key_count(), Some(2));
    assert_eq!(result.contents()[0].size(), Some(5));
}

#[tokio::test]
async fn test_sdk_get_and_head_object() {
    let ftp = MemoryFtp::new();
    ftp.seed_file("docs/a.txt", "hello");
    let addr = start_test_server(&ftp, signed()).await;
    let client = create_test_client(addr, SECRET_KEY).await;

    let object = client
        .get_object()
        .bucket("default")
        .key("docs/a.txt")
        .send()
        .await
        .unwrap();
    let data = object.body.collect().await.unwrap().into_bytes();
    assert_eq!(data, bytes::Bytes::from("hello"));

    let head = client
        .head_object()
        .bucket("default")
        .key("docs/a.txt")
        .send()
        .await
        .unwrap();
    assert_eq!(head.e_tag(), Some("\"d41d8cd98f00b204e9800998ecf8427e\""));
    assert!(head.last_modified().is_some());
}

#[tokio::test]
async fn test_sdk_missing_key() {
    let ftp = MemoryFtp::new();
    let addr = start_test_server(&ftp, signed()).await;
    let client = create_test_client(addr, SECRET_KEY).await;

    let err = client
        .get_object()
        .bucket("default")
        .key("missing.txt")
        .send()
        .await
        .unwrap_err();
    assert!(err.into_service_error().is_no_such_key());
}

#[tokio::test]
async fn test_sdk_wrong_secret_rejected() {
    let ftp = MemoryFtp::new();
    ftp.seed_file("a.txt", "a");
    let addr = start_test_server(&ftp, signed()).await;
    let client = create_test_client(addr, "not-the-secret").await;

    let result = client
        .list_objects_v2()
        .bucket("default")
        .send()
        .await;
    assert!(result.is_err());
    assert_eq!(ftp.connects(), 0);
}
