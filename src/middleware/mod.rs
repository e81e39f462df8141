//! Tower layer that runs an [`Authenticator`] ahead of every handler.

use crate::auth::{Authenticator, ConnectionKind, HttpConnection};
use crate::config::AuthMiddlewareConfig;
use crate::error::Result;
use crate::scope::{self, AuthState};
use axum::{
    body::Body,
    extract::Request,
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared state for the authentication middleware
struct AuthenticationState<A> {
    authenticator: A,
    exclude: Option<Regex>,
    scopes: Vec<ConnectionKind>,
}

impl<A> AuthenticationState<A> {
    /// Whether a connection must go through the authenticator.
    ///
    /// With `Http` in scope every request is authenticated, whatever its
    /// kind; a WebSocket handshake is an HTTP request too.
    fn applies_to(&self, kind: ConnectionKind, path: &str) -> bool {
        let in_scope =
            self.scopes.contains(&ConnectionKind::Http) || self.scopes.contains(&kind);
        if !in_scope {
            return false;
        }

        match &self.exclude {
            Some(exclude) => !exclude.is_match(path),
            None => true,
        }
    }
}

/// Layer installing an authenticator on a router.
///
/// Nested layers authenticate a connection once: an inner layer skips any
/// connection an outer layer already authenticated, even when the two
/// authenticators produce different `User`/`Auth` types. Handlers asking for
/// the inner layer's types then see an unpopulated scope.
///
/// # Example
/// ```ignore
/// let store = TokenStoreAuthenticator::<User, Token>::new();
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(AuthenticationLayer::new(store));
/// ```
pub struct AuthenticationLayer<A> {
    state: Arc<AuthenticationState<A>>,
}

impl<A> Clone for AuthenticationLayer<A> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<A: Authenticator> AuthenticationLayer<A> {
    /// Authenticate every HTTP and WebSocket connection
    pub fn new(authenticator: A) -> Self {
        Self {
            state: Arc::new(AuthenticationState {
                authenticator,
                exclude: None,
                scopes: vec![ConnectionKind::Http, ConnectionKind::Websocket],
            }),
        }
    }

    /// Authenticate connections selected by `config`
    pub fn with_config(authenticator: A, config: &AuthMiddlewareConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            state: Arc::new(AuthenticationState {
                authenticator,
                exclude: config.exclude_regex()?,
                scopes: config.scopes.clone(),
            }),
        })
    }
}

impl<S, A> Layer<S> for AuthenticationLayer<A> {
    type Service = AuthenticationService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Service that authenticates requests before passing them on
pub struct AuthenticationService<S, A> {
    inner: S,
    state: Arc<AuthenticationState<A>>,
}

impl<S: Clone, A> Clone for AuthenticationService<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S, A> Service<Request<Body>> for AuthenticationService<S, A>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    A: Authenticator,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        let kind = ConnectionKind::classify(request.method(), request.headers());
        let path = request.uri().path().to_string();

        if !state.applies_to(kind, &path) {
            debug!(path = %path, kind = ?kind, "Skipping authentication");
            return Box::pin(ready_inner.call(request));
        }

        let current = scope::state(request.extensions());
        if current.is_terminal() {
            debug!(path = %path, state = ?current, "Authentication already settled");
            return Box::pin(ready_inner.call(request));
        }

        let span = info_span!(
            "authenticate",
            connection_id = %Uuid::new_v4(),
            kind = ?kind,
            path = %path,
        );

        Box::pin(
            async move {
                let (mut parts, body) = request.into_parts();

                let outcome = state
                    .authenticator
                    .authenticate(&HttpConnection::new(&parts))
                    .await;

                match outcome {
                    Ok(result) => {
                        debug!("Connection authenticated");
                        scope::populate(&mut parts.extensions, result);
                        ready_inner.call(Request::from_parts(parts, body)).await
                    }
                    Err(e) => {
                        warn!(error = %e, state = ?AuthState::Denied, "Connection denied");
                        let mut response = e.into_response();
                        response.extensions_mut().insert(AuthState::Denied);
                        Ok(response)
                    }
                }
            }
            .instrument(span),
        )
    }
}
