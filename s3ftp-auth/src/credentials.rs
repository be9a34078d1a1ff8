//! Static credential store

use std::collections::HashMap;

use tracing::debug;

/// Access key id to secret key, fixed once the store is built.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    /// Build a store from `(access_key_id, secret_key)` pairs. A repeated
    /// access key id keeps the last secret.
    pub fn new(credentials: impl IntoIterator<Item = (String, String)>) -> Self {
        let credentials: HashMap<String, String> = credentials.into_iter().collect();
        for access_key_id in credentials.keys() {
            debug!(access_key_id = %access_key_id, "Registered credentials");
        }
        Self { credentials }
    }

    /// A store with no credentials; requests pass through unauthenticated.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn secret_for(&self, access_key_id: &str) -> Option<&str> {
        self.credentials.get(access_key_id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_key() {
        let store = CredentialStore::new(vec![("AKID".to_owned(), "secret".to_owned())]);

        assert!(!store.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.secret_for("AKID"), Some("secret"));
    }

    #[test]
    fn test_lookup_unknown_key() {
        let store = CredentialStore::new(vec![("AKID".to_owned(), "secret".to_owned())]);
        assert_eq!(store.secret_for("OTHER"), None);
    }

    #[test]
    fn test_empty_store() {
        let store = CredentialStore::empty();
        assert!(store.is_empty());
        assert_eq!(store.secret_for("AKID"), None);
    }
}
