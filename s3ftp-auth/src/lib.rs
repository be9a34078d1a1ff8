//! Request authentication for s3ftp
//!
//! Implements AWS Signature Version 4 verification against a static
//! credential store, and the axum middleware that enforces it.

pub mod credentials;
pub mod middleware;
pub mod sigv4;

pub use credentials::CredentialStore;
pub use middleware::require_signature;
pub use sigv4::{verify_request, AuthError};
