//! HTTP router for the gateway

use std::sync::Arc;

use axum::{middleware, Router};
use s3ftp_auth::{require_signature, CredentialStore};
use s3ftp_s3::S3Gateway;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the application router: tracing outermost, then signature checks,
/// then the gateway.
pub fn create_router(gateway: &S3Gateway, credentials: CredentialStore) -> Router {
    let credentials = Arc::new(credentials);

    gateway.router().layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(credentials, require_signature)),
    )
}
