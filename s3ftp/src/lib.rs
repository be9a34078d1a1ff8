//! s3ftp - S3 protocol gateway in front of an FTP server
//!
//! The root directory of the FTP server appears as a single bucket named
//! `default`. Requests are signed with AWS Signature Version 4 when a key
//! pair is configured.

pub mod config;
pub mod router;

pub use config::{Args, Config};
pub use router::create_router;
