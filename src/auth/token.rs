//! In-memory access token store

use std::sync::{Arc, PoisonError, RwLock};

use crate::types::AccessToken;

/// Process-wide holder of the current access token.
///
/// Cloning yields another handle to the same slot; construct one at startup
/// and hand clones to the client and the session. The token is never
/// written to disk.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    slot: Arc<RwLock<Option<AccessToken>>>,
}

impl TokenStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current token. No shape validation is done.
    pub fn set(&self, token: Option<AccessToken>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = token;
    }

    /// Current token, if any
    #[must_use]
    pub fn get(&self) -> Option<AccessToken> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the current token
    pub fn clear(&self) {
        self.set(None);
    }

    /// True if a token is held
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
