use crate::auth::{AccessToken, AuthProvider};
use crate::errors::AuthenticationError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Auth provider that always hands out the same token.
#[derive(Debug)]
pub struct MockAuthProvider {
    token: String,
    fail: bool,
    calls: AtomicUsize,
}

impl MockAuthProvider {
    /// Creates a provider returning `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a provider whose every call fails.
    pub fn failing() -> Self {
        Self {
            token: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of tokens requested so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn issue(&self) -> Result<AccessToken, AuthenticationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthenticationError::RefreshFailed(
                "mock credentials rejected".to_string(),
            ));
        }
        Ok(AccessToken::new(
            self.token.clone(),
            "Bearer",
            Utc::now() + Duration::hours(1),
            vec![],
        ))
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthenticationError> {
        self.issue()
    }

    async fn refresh_token(&self) -> Result<AccessToken, AuthenticationError> {
        self.issue()
    }

    fn is_expired(&self) -> bool {
        false
    }
}
