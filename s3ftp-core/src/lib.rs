//! Core types for s3ftp
//!
//! Error codes and request identifiers shared by the authentication layer and
//! the S3 gateway. Nothing in here knows about HTTP frameworks or FTP.

pub mod error;
pub mod request_id;

pub use error::{AwsError, ErrorCode};
pub use request_id::RequestId;
