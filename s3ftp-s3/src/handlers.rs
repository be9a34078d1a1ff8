//! S3 HTTP request handlers
//!
//! Requests are dispatched on method, path and query rather than on path
//! templates: the same path can be a bucket listing, the bucket list or an
//! object depending on the query string.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::percent_decode_str;
use s3ftp_core::{AwsError, ErrorCode, RequestId};
use tracing::{debug, error};

use crate::backend::path::{self, ROOT};
use crate::backend::{BackendError, BackendSession};
use crate::listing::{self, ListingRequest, ListingStyle, BUCKET, EMPTY_ETAG};
use crate::xml::{format_list_buckets, format_list_objects_v1, format_list_objects_v2};

/// Shared state for S3 handlers
pub struct S3State {
    pub session: Arc<BackendSession>,
}

/// Query parameters for ListObjects and ListObjectsV2
#[derive(Debug, Default)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub list_type: Option<String>,
}

impl ListObjectsQuery {
    /// Build from decoded query pairs. A repeated parameter keeps its first
    /// value; unknown parameters are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "prefix" => &mut query.prefix,
                "delimiter" => &mut query.delimiter,
                "list-type" => &mut query.list_type,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    fn is_v2(&self) -> bool {
        self.list_type.as_deref() == Some("2")
    }

    fn asks_for_listing(&self) -> bool {
        self.list_type.as_deref().is_some_and(|t| !t.is_empty())
            || self.prefix.as_deref().is_some_and(|p| !p.is_empty())
    }

    fn into_request(self) -> ListingRequest {
        ListingRequest::new(self.prefix, self.delimiter)
    }
}

/// Where a request path points
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
    Health,
    Root,
    Bucket(&'a str),
    Object(&'a str),
}

fn target(path: &str) -> Target<'_> {
    if path == "/health" {
        return Target::Health;
    }
    if path.is_empty() || path == "/" {
        return Target::Root;
    }
    let bucket = path.trim_start_matches('/');
    let bucket = bucket.strip_suffix('/').unwrap_or(bucket);
    if !bucket.is_empty() && !bucket.contains('/') {
        return Target::Bucket(bucket);
    }

    let prefix = format!("/{}/", BUCKET);
    match path.strip_prefix(prefix.as_str()) {
        Some(key) => Target::Object(key),
        None => Target::Object(path.trim_start_matches('/')),
    }
}

/// Entry point for every S3 request
pub async fn handle_request(
    State(state): State<Arc<S3State>>,
    method: Method,
    uri: Uri,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let request_id = RequestId::new();
    let query = ListObjectsQuery::from_pairs(pairs);
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();

    debug!(method = %method, path = %path, query = ?query, "Handling S3 request");

    let mut response = match route(&state.session, &method, &path, query, body).await {
        Ok(response) => response,
        Err(err) => error_response(err.with_request_id(request_id.id.clone())),
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id.id) {
        headers.insert(HeaderName::from_static("x-amz-request-id"), value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id.extended_id) {
        headers.insert(HeaderName::from_static("x-amz-id-2"), value);
    }
    response
}

async fn route(
    session: &BackendSession,
    method: &Method,
    path: &str,
    query: ListObjectsQuery,
    body: Bytes,
) -> Result<Response, AwsError> {
    let target = target(path);
    if let Target::Object(key) = target {
        require_key(key)?;
    }

    match *method {
        Method::GET => match target {
            Target::Health => Ok("ok".into_response()),
            Target::Root if query.is_v2() => list_objects(session, query, ListingStyle::V2).await,
            Target::Bucket(bucket) if query.is_v2() => {
                require_bucket(bucket)?;
                list_objects(session, query, ListingStyle::V2).await
            }
            Target::Root if query.asks_for_listing() => {
                list_objects(session, query, ListingStyle::V1).await
            }
            Target::Root => Ok(list_buckets()),
            Target::Bucket(BUCKET) => list_objects(session, query, ListingStyle::V1).await,
            Target::Bucket(key) | Target::Object(key) => get_object(session, key).await,
        },
        Method::HEAD => match target {
            Target::Root | Target::Health => Ok(head_bucket()),
            Target::Bucket(bucket) => {
                require_bucket(bucket)?;
                Ok(head_bucket())
            }
            Target::Object(key) => head_object(session, key).await,
        },
        Method::PUT => match target {
            Target::Object(key) => put_object(session, key, body).await,
            _ => Err(method_not_allowed()),
        },
        Method::DELETE => match target {
            Target::Object(key) => delete_object(session, key).await,
            _ => Err(method_not_allowed()),
        },
        _ => {
            debug!(method = %method, "Method not allowed");
            Err(method_not_allowed())
        }
    }
}

fn require_bucket(bucket: &str) -> Result<(), AwsError> {
    if bucket == BUCKET {
        Ok(())
    } else {
        Err(AwsError::new(ErrorCode::NoSuchBucket, "The specified bucket does not exist")
            .with_resource(bucket))
    }
}

/// A key that normalizes to the backend root names no object
fn require_key(key: &str) -> Result<(), AwsError> {
    if path::is_root(&path::normalize(key)) {
        Err(AwsError::new(ErrorCode::InvalidArgument, "An object key is required").with_resource(key))
    } else {
        Ok(())
    }
}

// === Bucket Operations ===

fn list_buckets() -> Response {
    debug!("Handling ListBuckets request");
    xml_response(format_list_buckets(BUCKET, &Utc::now()))
}

fn head_bucket() -> Response {
    (StatusCode::OK, [("x-amz-bucket-region", "us-east-1")]).into_response()
}

async fn list_objects(
    session: &BackendSession,
    query: ListObjectsQuery,
    style: ListingStyle,
) -> Result<Response, AwsError> {
    let request = query.into_request();

    match listing::list(session, &request, style).await {
        Ok(result) => {
            debug!(
                prefix = %request.prefix,
                objects = result.objects.len(),
                common_prefixes = result.common_prefixes.len(),
                "Listed objects"
            );
            let body = match style {
                ListingStyle::V2 => format_list_objects_v2(&request, &result),
                ListingStyle::V1 => format_list_objects_v1(&request, &result),
            };
            Ok(xml_response(body))
        }
        Err(err) => {
            error!(prefix = %request.prefix, error = %err, "Failed to list FTP directory");
            Err(AwsError::internal(err.to_string()))
        }
    }
}

// === Object Operations ===

async fn get_object(session: &BackendSession, key: &str) -> Result<Response, AwsError> {
    debug!(key = %key, "Getting file from FTP");
    let data = session
        .get(key)
        .await
        .map_err(|e| object_error(e, key, "Failed to get file from FTP"))?;

    debug!(key = %key, bytes = data.len(), "Streaming file to client");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::ETAG, EMPTY_ETAG),
        ],
        Body::from(data),
    )
        .into_response())
}

/// Metadata comes from listing the parent directory
async fn head_object(session: &BackendSession, key: &str) -> Result<Response, AwsError> {
    let normalized = path::normalize(key);
    let dir = path::parent(&normalized).unwrap_or(ROOT);
    let base = path::base_name(&normalized);
    debug!(key = %key, dir = %dir, base = %base, "Checking file on FTP");

    let entries = session
        .list(dir)
        .await
        .map_err(|e| object_error(e, key, "Failed to list FTP directory"))?;

    let entry = entries
        .iter()
        .find(|e| e.name == base)
        .ok_or_else(|| AwsError::no_such_key(key))?;

    let last_modified = entry
        .modified
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_LENGTH, entry.size.to_string()),
            (header::LAST_MODIFIED, last_modified),
            (header::ETAG, EMPTY_ETAG.to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        ],
    )
        .into_response())
}

/// A key ending in `/` is a folder marker and becomes a directory
async fn put_object(session: &BackendSession, key: &str, body: Bytes) -> Result<Response, AwsError> {
    debug!(key = %key, bytes = body.len(), "Putting file to FTP");
    let result = if key.ends_with('/') {
        session.create_dir_all(key).await
    } else {
        session.put(key, body).await
    };

    match result {
        Ok(()) => {
            debug!(key = %key, "Uploaded file");
            Ok((StatusCode::OK, [(header::ETAG, EMPTY_ETAG)]).into_response())
        }
        Err(err) => {
            error!(key = %key, error = %err, "Failed to put file to FTP");
            Err(AwsError::internal(err.to_string()))
        }
    }
}

async fn delete_object(session: &BackendSession, key: &str) -> Result<Response, AwsError> {
    debug!(key = %key, "Deleting file from FTP");
    let result = if key.ends_with('/') {
        session.remove_dir(key).await
    } else {
        session.delete(key).await
    };
    result.map_err(|e| object_error(e, key, "Failed to delete file from FTP"))?;

    debug!(key = %key, "Deleted file");
    Ok(StatusCode::NO_CONTENT.into_response())
}

// === Helper Functions ===

/// Missing keys are 404, anything else is 500 with the backend's text
fn object_error(err: BackendError, key: &str, context: &str) -> AwsError {
    if err.is_not_found() {
        debug!(key = %key, error = %err, "{}", context);
        AwsError::no_such_key(key)
    } else {
        error!(key = %key, error = %err, "{}", context);
        AwsError::internal(err.to_string())
    }
}

fn method_not_allowed() -> AwsError {
    AwsError::new(
        ErrorCode::MethodNotAllowed,
        "The specified method is not allowed against this resource.",
    )
}

fn xml_response(body: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        body,
    )
        .into_response()
}

fn error_response(err: AwsError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/xml")],
        err.to_xml(),
    )
        .into_response()
}
