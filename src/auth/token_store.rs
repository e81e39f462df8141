use crate::error::{AuthError, Result};
use async_trait::async_trait;
use axum::http::header;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::{AuthenticationResult, Authenticator, HttpConnection};

/// Authenticator backed by an in-memory map of opaque tokens to results.
///
/// The token is the raw value of a header (`Authorization` by default).
/// Unknown or missing tokens are denied.
#[derive(Clone)]
pub struct TokenStoreAuthenticator<U, A> {
    header_name: String,
    tokens: Arc<DashMap<String, AuthenticationResult<U, A>>>,
    single_use: bool,
}

impl<U, A> TokenStoreAuthenticator<U, A>
where
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Create an empty store reading tokens from the `Authorization` header
    pub fn new() -> Self {
        Self::with_header(header::AUTHORIZATION.as_str())
    }

    /// Create an empty store reading tokens from a custom header
    pub fn with_header(header_name: impl Into<String>) -> Self {
        Self {
            header_name: header_name.into(),
            tokens: Arc::new(DashMap::new()),
            single_use: false,
        }
    }

    /// Consume each token on its first successful use
    pub fn single_use(mut self) -> Self {
        self.single_use = true;
        self
    }

    /// Register a token; returns the result previously stored under it
    pub fn insert(
        &self,
        token: impl Into<String>,
        result: AuthenticationResult<U, A>,
    ) -> Option<AuthenticationResult<U, A>> {
        self.tokens.insert(token.into(), result)
    }

    /// Revoke a token
    pub fn remove(&self, token: &str) -> Option<AuthenticationResult<U, A>> {
        self.tokens.remove(token).map(|(_, result)| result)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn lookup(&self, token: &str) -> Option<AuthenticationResult<U, A>> {
        if self.single_use {
            self.remove(token)
        } else {
            self.tokens.get(token).map(|entry| entry.value().clone())
        }
    }
}

impl<U, A> Default for TokenStoreAuthenticator<U, A>
where
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<U, A> Authenticator for TokenStoreAuthenticator<U, A>
where
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    type User = U;
    type Auth = A;

    async fn authenticate(
        &self,
        connection: &HttpConnection<'_>,
    ) -> Result<AuthenticationResult<U, A>> {
        let token = connection
            .header(&self.header_name)
            .filter(|token| !token.is_empty());

        match token.and_then(|token| self.lookup(token)) {
            Some(result) => Ok(result),
            None => {
                debug!(header = %self.header_name, "Token not found in store");
                Err(AuthError::PermissionDenied("unauthenticated".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{request::Parts, Request};

    fn parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(token) = token {
            builder = builder.header("Authorization", token);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn result() -> AuthenticationResult<String, String> {
        AuthenticationResult::new("moishe".to_string(), "abc".to_string())
    }

    #[tokio::test]
    async fn test_unknown_token_denied() {
        let store = TokenStoreAuthenticator::<String, String>::new();
        let parts = parts(Some("abc"));

        let err = store
            .authenticate(&HttpConnection::new(&parts))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionDenied(ref msg) if msg == "unauthenticated"));
    }

    #[tokio::test]
    async fn test_missing_header_denied() {
        let store = TokenStoreAuthenticator::new();
        store.insert("abc", result());
        let parts = parts(None);

        let err = store
            .authenticate(&HttpConnection::new(&parts))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_known_token_is_reusable() {
        let store = TokenStoreAuthenticator::new();
        store.insert("abc", result());
        let parts = parts(Some("abc"));

        for _ in 0..2 {
            let result = store.authenticate(&HttpConnection::new(&parts)).await.unwrap();
            assert_eq!(result.user, "moishe");
            assert_eq!(result.auth, "abc");
        }
        assert!(store.contains("abc"));
    }

    #[tokio::test]
    async fn test_single_use_token_is_consumed() {
        let store = TokenStoreAuthenticator::new().single_use();
        store.insert("abc", result());
        let parts = parts(Some("abc"));

        assert!(store.authenticate(&HttpConnection::new(&parts)).await.is_ok());
        assert!(store.is_empty());
        assert!(store.authenticate(&HttpConnection::new(&parts)).await.is_err());
    }

    #[tokio::test]
    async fn test_custom_header_and_revocation() {
        let store = TokenStoreAuthenticator::with_header("X-Session");
        store.insert("s1", result());
        assert_eq!(store.len(), 1);

        let parts = Request::builder()
            .uri("/")
            .header("x-session", "s1")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        assert!(store.authenticate(&HttpConnection::new(&parts)).await.is_ok());

        assert!(store.remove("s1").is_some());
        assert!(store.authenticate(&HttpConnection::new(&parts)).await.is_err());
    }
}
