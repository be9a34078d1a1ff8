//! Request ID generation

use base64::Engine;
use uuid::Uuid;

/// Request ID pair put on every gateway response
#[derive(Debug, Clone)]
pub struct RequestId {
    /// `x-amz-request-id`
    pub id: String,
    /// `x-amz-id-2`, base64 encoded
    pub extended_id: String,
}

impl RequestId {
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string().to_uppercase();
        let extended_id = encode(Uuid::new_v4().as_bytes());

        Self { id, extended_id }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
