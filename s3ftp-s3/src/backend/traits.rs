//! Backend transport traits

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from backend operations, classified once at the transport boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("FTP server unavailable: {0}")]
    Unavailable(String),

    #[error("FTP login rejected: {0}")]
    AuthFailed(String),

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Other(String),
}

/// Connectivity signatures for errors that carry no structured code
const TRANSIENT_SIGNATURES: &[&str] = &[
    "broken pipe",
    "reset",
    "refused",
    "timeout",
    "timed out",
    "no connection",
    "closed",
];

impl BackendError {
    /// Whether reconnecting may clear the failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Classify an FTP reply
    pub fn from_reply(code: u32, text: &str) -> Self {
        let text = text.trim();
        let message = if text.starts_with(&code.to_string()) {
            text.to_string()
        } else {
            format!("{} {}", code, text)
        };
        let lower = text.to_lowercase();

        match code {
            550 => {
                if ["no such", "not found", "not exist"]
                    .iter()
                    .any(|s| lower.contains(s))
                {
                    Self::NotFound(message)
                } else if ["already exists", "file exists", "cannot create", "can't create"]
                    .iter()
                    .any(|s| lower.contains(s))
                {
                    Self::AlreadyExists(message)
                } else if ["permission denied", "access denied"]
                    .iter()
                    .any(|s| lower.contains(s))
                {
                    Self::PermissionDenied(message)
                } else if lower.contains("not empty") {
                    Self::Other(message)
                } else {
                    Self::NotFound(message)
                }
            }
            521 => Self::AlreadyExists(message),
            421 | 425 | 426 => Self::Transient(message),
            530 => Self::AuthFailed(message),
            _ => Self::from_text(message),
        }
    }

    /// Classify an I/O error from the control or data connection
    pub fn from_io(err: &io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            BrokenPipe | ConnectionReset | ConnectionRefused | ConnectionAborted | NotConnected
            | TimedOut | UnexpectedEof => Self::Transient(err.to_string()),
            _ => Self::from_text(err.to_string()),
        }
    }

    /// Classify by connectivity signature, for errors without a code
    pub fn from_text(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if TRANSIENT_SIGNATURES.iter().any(|s| lower.contains(s)) {
            Self::Transient(message)
        } else {
            Self::Other(message)
        }
    }
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// A live, authenticated FTP control connection.
///
/// Paths are backend-relative and already normalised. Commands are issued
/// one at a time; callers serialise access.
#[async_trait]
pub trait FtpConnection: Send {
    /// LIST
    async fn list(&mut self, path: &str) -> Result<Vec<BackendEntry>, BackendError>;

    /// RETR, fully read
    async fn retrieve(&mut self, path: &str) -> Result<Bytes, BackendError>;

    /// STOR
    async fn store(&mut self, path: &str, data: &[u8]) -> Result<(), BackendError>;

    /// DELE
    async fn delete(&mut self, path: &str) -> Result<(), BackendError>;

    /// MKD
    async fn make_dir(&mut self, path: &str) -> Result<(), BackendError>;

    /// RMD
    async fn remove_dir(&mut self, path: &str) -> Result<(), BackendError>;

    /// QUIT
    async fn quit(&mut self) -> Result<(), BackendError>;

    /// MKD that treats an existing directory as success
    async fn create_dir_if_absent(&mut self, path: &str) -> Result<(), BackendError> {
        match self.make_dir(path).await {
            Err(BackendError::AlreadyExists(_)) => Ok(()),
            other => other,
        }
    }
}

/// Opens authenticated connections to the backend
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn FtpConnection>, BackendError>;
}
