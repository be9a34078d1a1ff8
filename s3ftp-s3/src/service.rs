//! S3 gateway service

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};

use crate::backend::{BackendSession, Connector};
use crate::handlers::{handle_request, S3State};

/// The S3 gateway in front of one backend session
pub struct S3Gateway {
    session: Arc<BackendSession>,
}

impl S3Gateway {
    pub fn new(session: Arc<BackendSession>) -> Self {
        Self { session }
    }

    /// Gateway with a fresh session over `connector`
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self::new(Arc::new(BackendSession::new(connector)))
    }

    /// Get reference to the backend session
    pub fn session(&self) -> &Arc<BackendSession> {
        &self.session
    }

    /// Every path is handled by the gateway; routing happens on method and
    /// query inside the handler. Object bodies are not size limited.
    pub fn router(&self) -> Router {
        let state = Arc::new(S3State {
            session: self.session.clone(),
        });
        Router::new()
            .fallback(handle_request)
            .layer(DefaultBodyLimit::disable())
            .with_state(state)
    }
}
