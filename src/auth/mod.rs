pub mod api_key;
pub mod jwt;
pub mod token_store;

use crate::error::Result;
use async_trait::async_trait;
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use api_key::{ApiKeyAuth, ApiKeyAuthenticator, ApiKeyUser};
pub use jwt::{Claims, JwtAuthenticator, JwtUser};
pub use token_store::TokenStoreAuthenticator;

/// Identity and credential produced by a successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResult<U, A> {
    /// Who the connection belongs to
    pub user: U,
    /// The credential the identity was established with
    pub auth: A,
}

impl<U, A> AuthenticationResult<U, A> {
    pub fn new(user: U, auth: A) -> Self {
        Self { user, auth }
    }

    pub fn into_parts(self) -> (U, A) {
        (self.user, self.auth)
    }
}

/// Kind of inbound connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Http,
    Websocket,
}

impl ConnectionKind {
    /// Classify a connection from its request line and headers.
    ///
    /// Only a complete RFC 6455 opening handshake counts as a WebSocket:
    /// `GET` with `Connection: upgrade`, `Upgrade: websocket`,
    /// `Sec-WebSocket-Version: 13` and a `Sec-WebSocket-Key`.
    pub fn classify(method: &Method, headers: &HeaderMap) -> Self {
        let header_has_token = |name: header::HeaderName, token: &str| {
            headers.get_all(name).iter().any(|value| {
                value
                    .to_str()
                    .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                    .unwrap_or(false)
            })
        };

        let is_handshake = method == Method::GET
            && header_has_token(header::CONNECTION, "upgrade")
            && header_has_token(header::UPGRADE, "websocket")
            && headers
                .get(header::SEC_WEBSOCKET_VERSION)
                .map(|v| v.as_bytes() == b"13")
                .unwrap_or(false)
            && headers.contains_key(header::SEC_WEBSOCKET_KEY);

        if is_handshake {
            ConnectionKind::Websocket
        } else {
            ConnectionKind::Http
        }
    }

    /// Classify request parts
    pub fn of(parts: &Parts) -> Self {
        Self::classify(&parts.method, &parts.headers)
    }
}

/// Read-only view of an inbound connection handed to an [`Authenticator`]
#[derive(Debug)]
pub struct HttpConnection<'a> {
    parts: &'a Parts,
    kind: ConnectionKind,
}

impl<'a> HttpConnection<'a> {
    pub fn new(parts: &'a Parts) -> Self {
        Self {
            parts,
            kind: ConnectionKind::of(parts),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }
}

/// Pluggable authentication step run once per connection before the handler.
///
/// Returning `Err` denies the connection; the error is converted into the
/// response (typically [`AuthError::PermissionDenied`](crate::error::AuthError::PermissionDenied), a 403).
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Identity written to the `user` scope entry
    type User: Clone + Send + Sync + 'static;
    /// Credential written to the `auth` scope entry
    type Auth: Clone + Send + Sync + 'static;

    async fn authenticate(
        &self,
        connection: &HttpConnection<'_>,
    ) -> Result<AuthenticationResult<Self::User, Self::Auth>>;
}

#[async_trait]
impl<T: Authenticator> Authenticator for Arc<T> {
    type User = T::User;
    type Auth = T::Auth;

    async fn authenticate(
        &self,
        connection: &HttpConnection<'_>,
    ) -> Result<AuthenticationResult<Self::User, Self::Auth>> {
        (**self).authenticate(connection).await
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
}
