//! Signature enforcement for the HTTP router

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::credentials::CredentialStore;
use crate::sigv4::{verify_request, AuthError};

/// Path that never requires a signature
pub const HEALTH_PATH: &str = "/health";

/// Reject requests whose SigV4 signature does not verify.
///
/// With an empty store every request passes through, as does the health
/// check.
pub async fn require_signature(
    State(store): State<Arc<CredentialStore>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if store.is_empty() || path == HEALTH_PATH {
        debug!(
            path = %path,
            no_credentials = store.is_empty(),
            "Skipping authentication"
        );
        return next.run(request).await;
    }

    let result = verify_request(
        request.method().as_str(),
        path,
        request.uri().query().unwrap_or(""),
        request.headers(),
        &store,
    );

    match result {
        Ok(access_key_id) => {
            debug!(access_key_id = %access_key_id, "Authentication successful");
            next.run(request).await
        }
        Err(err) => {
            match &err {
                AuthError::UnknownAccessKey(access_key_id) => {
                    warn!(access_key_id = %access_key_id, path = %path, "Rejected request: {}", err);
                }
                _ => warn!(path = %path, "Rejected request: {}", err),
            }
            unauthorized(&err)
        }
    }
}

fn unauthorized(err: &AuthError) -> Response {
    let error = err.to_aws_error();
    let mut response = (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/xml")],
        error.to_xml(),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&error.request_id) {
        response.headers_mut().insert("x-amz-request-id", value);
    }
    response
}
