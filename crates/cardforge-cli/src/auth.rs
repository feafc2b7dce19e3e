//! Bearer-token issuance and validation for the HTTP API.
//!
//! Tokens are opaque UUIDs held in memory with a fixed TTL; restarting
//! the server invalidates everything, which is acceptable for a
//! single-user studio tool.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

pub struct TokenStore {
    ttl_secs: u64,
    issued: RwLock<HashMap<String, Instant>>,
}

impl TokenStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a fresh token, dropping any that have already expired.
    pub fn issue(&self) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let mut issued = self.issued.write().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl_secs;
        issued.retain(|_, created| created.elapsed().as_secs() < ttl);
        issued.insert(token.clone(), Instant::now());
        token
    }

    pub fn validate(&self, token: &str) -> bool {
        let issued = self.issued.read().unwrap_or_else(|e| e.into_inner());
        issued
            .get(token)
            .map(|created| created.elapsed().as_secs() < self.ttl_secs)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let store = TokenStore::new(60);
        let token = store.issue();
        assert!(store.validate(&token));
        assert!(!store.validate("not-a-token"));
    }

    #[test]
    fn zero_ttl_token_is_expired() {
        let store = TokenStore::new(0);
        let token = store.issue();
        assert!(!store.validate(&token));
    }
}
