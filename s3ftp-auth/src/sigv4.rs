//! AWS Signature Version 4 verification

use std::collections::BTreeMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use s3ftp_core::{AwsError, ErrorCode};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::credentials::CredentialStore;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Region and service every signature is checked against
pub const REGION: &str = "us-east-1";
pub const SERVICE: &str = "s3";

/// SHA-256 of the empty payload, used when the client sends no
/// `x-amz-content-sha256`
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Unreserved characters per RFC 3986 stay as they are
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Authentication failures. All of them are answered with 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingAuthHeader,

    #[error("{0}")]
    InvalidAuthHeader(&'static str),

    #[error("Invalid access key ID")]
    UnknownAccessKey(String),

    #[error("Signature verification failed")]
    SignatureInvalid,
}

impl AuthError {
    pub fn to_aws_error(&self) -> AwsError {
        let code = match self {
            Self::MissingAuthHeader | Self::InvalidAuthHeader(_) => ErrorCode::AccessDenied,
            Self::UnknownAccessKey(_) => ErrorCode::InvalidAccessKeyId,
            Self::SignatureInvalid => ErrorCode::InvalidSignature,
        };
        AwsError::new(code, self.to_string())
    }
}

/// Parsed SigV4 authorization header
#[derive(Debug)]
pub struct AuthorizationHeader {
    pub access_key: String,
    pub date: String,
    pub region: String,
    pub service: String,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

/// Parse an AWS SigV4 authorization header
///
/// Format: AWS4-HMAC-SHA256 Credential=AKID/DATE/REGION/SERVICE/aws4_request,
///         SignedHeaders=host;x-amz-date, Signature=HEX
pub fn parse_authorization_header(header: &str) -> Result<AuthorizationHeader, AuthError> {
    let (scheme, components) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthHeader("Invalid Authorization header format"))?;
    if scheme != ALGORITHM {
        return Err(AuthError::InvalidAuthHeader(
            "Invalid Authorization header format",
        ));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for component in components.split(',') {
        let Some((key, value)) = component.trim().split_once('=') else {
            continue;
        };
        match key {
            "Credential" => credential = Some(value),
            "SignedHeaders" => signed_headers = Some(value),
            "Signature" => signature = Some(value),
            _ => {}
        }
    }

    let credential = credential.ok_or(AuthError::InvalidAuthHeader("Invalid credential format"))?;
    let credential_parts: Vec<&str> = credential.split('/').collect();
    if credential_parts.len() != 5 {
        return Err(AuthError::InvalidAuthHeader("Invalid credential format"));
    }

    let signed_headers = signed_headers.ok_or(AuthError::InvalidAuthHeader(
        "Invalid Authorization header format",
    ))?;
    let signature = signature.ok_or(AuthError::InvalidAuthHeader(
        "Invalid Authorization header format",
    ))?;

    Ok(AuthorizationHeader {
        access_key: credential_parts[0].to_string(),
        date: credential_parts[1].to_string(),
        region: credential_parts[2].to_string(),
        service: credential_parts[3].to_string(),
        signed_headers: signed_headers
            .split(';')
            .map(|h| h.trim().to_lowercase())
            .collect(),
        signature: signature.trim().to_string(),
    })
}

/// Verify the signature of a request.
///
/// `path` is the raw request path and `query` the raw query string, both as
/// they appeared on the wire. Returns the authenticated access key id.
pub fn verify_request(
    method: &str,
    path: &str,
    query: &str,
    headers: &HeaderMap,
    store: &CredentialStore,
) -> Result<String, AuthError> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader("Invalid Authorization header format"))?;
    let auth = parse_authorization_header(header)?;

    let secret = store
        .secret_for(&auth.access_key)
        .ok_or_else(|| AuthError::UnknownAccessKey(auth.access_key.clone()))?;

    let timestamp = match header_value(headers, "x-amz-date") {
        Some(value) => value.to_string(),
        None => Utc::now().format("%Y%m%dT%H%M%SZ").to_string(),
    };
    let date = timestamp.get(..8).ok_or(AuthError::SignatureInvalid)?;
    let payload_hash = header_value(headers, "x-amz-content-sha256").unwrap_or(EMPTY_PAYLOAD_SHA256);

    let canonical_request = create_canonical_request(
        method,
        path,
        query,
        &canonical_headers(headers, &auth.signed_headers)?,
        &auth.signed_headers,
        payload_hash,
    );
    let scope = format!("{}/{}/{}/aws4_request", date, REGION, SERVICE);
    let string_to_sign = create_string_to_sign(&timestamp, &scope, &canonical_request);

    let provided = hex::decode(&auth.signature).map_err(|_| AuthError::SignatureInvalid)?;
    let signing_key = derive_signing_key(secret, date, REGION, SERVICE);
    let mut mac = HmacSha256::new_from_slice(&signing_key).expect("HMAC can take key of any size");
    mac.update(string_to_sign.as_bytes());
    mac.verify_slice(&provided)
        .map_err(|_| AuthError::SignatureInvalid)?;

    Ok(auth.access_key)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Sign a string using HMAC-SHA256
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the signing key
fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Each path segment is decoded then re-encoded, so already-encoded paths
/// are not encoded twice.
fn canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Parameters sorted by key then value. Values are kept exactly as the
/// client sent them.
fn canonical_query_string(query: &str) -> String {
    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();
    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// One `name:value\n` line per signed header. A signed header the request
/// does not carry cannot verify.
fn canonical_headers(headers: &HeaderMap, signed_headers: &[String]) -> Result<String, AuthError> {
    let mut values: BTreeMap<&str, String> = BTreeMap::new();
    for name in signed_headers {
        let mut joined: Option<String> = None;
        for value in headers.get_all(name.as_str()) {
            let value = value.to_str().map_err(|_| AuthError::SignatureInvalid)?;
            let value = collapse_whitespace(value.trim());
            match joined.as_mut() {
                Some(existing) => {
                    existing.push(',');
                    existing.push_str(&value);
                }
                None => joined = Some(value),
            }
        }
        values.insert(name.as_str(), joined.ok_or(AuthError::SignatureInvalid)?);
    }

    Ok(values
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Create the canonical request string
fn create_canonical_request(
    method: &str,
    path: &str,
    query_string: &str,
    canonical_headers: &str,
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        canonical_uri(path),
        canonical_query_string(query_string),
        canonical_headers,
        signed_headers.join(";"),
        payload_hash
    )
}

/// Create the string to sign
fn create_string_to_sign(timestamp: &str, scope: &str, canonical_request: &str) -> String {
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{}\n{}\n{}\n{}", ALGORITHM, timestamp, scope, canonical_hash)
}
