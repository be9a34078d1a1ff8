//! S3 gateway over FTP
//!
//! Exposes the root directory of an FTP server as a single S3 bucket named
//! `default`.

pub mod backend;
pub mod handlers;
pub mod listing;
pub mod service;
pub mod xml;

pub use backend::{BackendError, BackendSession};
pub use handlers::S3State;
pub use service::S3Gateway;
