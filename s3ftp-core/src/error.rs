//! S3 error codes and the `<Error>` document

use thiserror::Error;

use crate::request_id::RequestId;

/// Error codes the gateway can put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Authentication
    AccessDenied,
    InvalidAccessKeyId,
    InvalidSignature,

    // Request shape
    InvalidArgument,
    MethodNotAllowed,

    // Namespace
    NoSuchBucket,
    NoSuchKey,

    // Backend
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidSignature => "SignatureDoesNotMatch",
            Self::InvalidArgument => "InvalidArgument",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::InternalError => "InternalError",
        }
    }

    /// Authentication failures are all 401 here, unlike AWS which answers 403.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AccessDenied | Self::InvalidAccessKeyId | Self::InvalidSignature => 401,
            Self::InvalidArgument => 400,
            Self::MethodNotAllowed => 405,
            Self::NoSuchBucket | Self::NoSuchKey => 404,
            Self::InternalError => 500,
        }
    }
}

/// AWS-style error
#[derive(Debug, Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct AwsError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: String,
}

impl AwsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
            request_id: RequestId::new().id,
        }
    }

    /// `NoSuchKey` with the message clients of this gateway expect
    pub fn no_such_key(key: &str) -> Self {
        Self::new(ErrorCode::NoSuchKey, format!("Key \"{}\" does not exist", key))
            .with_resource(key)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Format as S3-style XML error
    pub fn to_xml(&self) -> String {
        let resource_line = self
            .resource
            .as_ref()
            .map(|r| format!("  <Resource>{}</Resource>\n", xml_escape(r)))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>{}</Code>
  <Message>{}</Message>
{}  <RequestId>{}</RequestId>
</Error>"#,
            self.code.as_str(),
            xml_escape(&self.message),
            resource_line,
            self.request_id
        )
    }
}

/// XML escape special characters
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
