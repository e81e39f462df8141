//! Connection scope: the per-request storage the authentication middleware
//! writes to, and the typed accessors handlers read it through.
//!
//! The scope lives in the request's [`Extensions`]. An entry that was never
//! written is reported as [`AuthError::ScopeNotPopulated`], never defaulted.

use crate::auth::{AuthenticationResult, ConnectionKind};
use crate::error::{AuthError, Result};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions, HeaderMap},
};
use std::convert::Infallible;
use std::fmt;

/// Well-known scope entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    User,
    Auth,
}

impl ScopeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKey::User => "user",
            ScopeKey::Auth => "auth",
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication phase of a single connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
    Denied,
}

impl AuthState {
    /// Whether the authentication phase is over for this connection
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuthState::Unauthenticated)
    }
}

#[derive(Clone)]
struct ScopedUser<U>(U);

#[derive(Clone)]
struct ScopedAuth<A>(A);

/// Write an authentication result into the connection scope
pub(crate) fn populate<U, A>(extensions: &mut Extensions, result: AuthenticationResult<U, A>)
where
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    let (user, auth) = result.into_parts();
    extensions.insert(ScopedUser(user));
    extensions.insert(ScopedAuth(auth));
    extensions.insert(AuthState::Authenticated);
}

/// Current authentication state recorded in the scope
pub fn state(extensions: &Extensions) -> AuthState {
    extensions.get::<AuthState>().copied().unwrap_or_default()
}

/// Read the `user` entry of the scope
pub fn user<U>(extensions: &Extensions) -> Result<&U>
where
    U: Send + Sync + 'static,
{
    extensions
        .get::<ScopedUser<U>>()
        .map(|scoped| &scoped.0)
        .ok_or(AuthError::ScopeNotPopulated(ScopeKey::User))
}

/// Read the `auth` entry of the scope
pub fn auth<A>(extensions: &Extensions) -> Result<&A>
where
    A: Send + Sync + 'static,
{
    extensions
        .get::<ScopedAuth<A>>()
        .map(|scoped| &scoped.0)
        .ok_or(AuthError::ScopeNotPopulated(ScopeKey::Auth))
}

/// Handler-side view of an inbound connection and its auth scope.
///
/// Extraction never fails. Reading [`user`](Self::user) or
/// [`auth`](Self::auth) fails when the middleware did not populate that
/// entry, either because no authenticator is installed or because it
/// produced a different type.
///
/// ```ignore
/// async fn handler(conn: AuthConnection<User, Token>) -> Result<Json<Value>> {
///     let user = conn.user()?;
///     Ok(Json(json!({ "id": user.id })))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthConnection<U, A> {
    headers: HeaderMap,
    kind: ConnectionKind,
    state: AuthState,
    user: Option<U>,
    auth: Option<A>,
}

impl<U, A> AuthConnection<U, A>
where
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            headers: parts.headers.clone(),
            kind: ConnectionKind::of(parts),
            state: state(&parts.extensions),
            user: user::<U>(&parts.extensions).ok().cloned(),
            auth: auth::<A>(&parts.extensions).ok().cloned(),
        }
    }
}

impl<U, A> AuthConnection<U, A> {
    pub fn user(&self) -> Result<&U> {
        self.user
            .as_ref()
            .ok_or(AuthError::ScopeNotPopulated(ScopeKey::User))
    }

    pub fn auth(&self) -> Result<&A> {
        self.auth
            .as_ref()
            .ok_or(AuthError::ScopeNotPopulated(ScopeKey::Auth))
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Take ownership of both entries, failing on the first missing one
    pub fn into_parts(self) -> Result<(U, A)> {
        let user = self.user.ok_or(AuthError::ScopeNotPopulated(ScopeKey::User))?;
        let auth = self.auth.ok_or(AuthError::ScopeNotPopulated(ScopeKey::Auth))?;
        Ok((user, auth))
    }
}

#[async_trait]
impl<S, U, A> FromRequestParts<S> for AuthConnection<U, A>
where
    S: Send + Sync,
    U: Clone + Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Extractor for the `user` entry, rejecting with a 500 when it is missing
#[derive(Debug, Clone)]
pub struct AuthUser<U>(pub U);

#[async_trait]
impl<S, U> FromRequestParts<S> for AuthUser<U>
where
    S: Send + Sync,
    U: Clone + Send + Sync + 'static,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        user::<U>(&parts.extensions).cloned().map(AuthUser)
    }
}

/// Extractor for the `auth` entry, rejecting with a 500 when it is missing
#[derive(Debug, Clone)]
pub struct AuthCredential<A>(pub A);

#[async_trait]
impl<S, A> FromRequestParts<S> for AuthCredential<A>
where
    S: Send + Sync,
    A: Clone + Send + Sync + 'static,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        auth::<A>(&parts.extensions).cloned().map(AuthCredential)
    }
}
