pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod scope;
pub mod server;
pub mod websocket;

pub use auth::{AuthenticationResult, Authenticator, ConnectionKind, HttpConnection};
pub use error::{AuthError, Result};
pub use middleware::AuthenticationLayer;
pub use scope::{AuthConnection, AuthCredential, AuthState, AuthUser, ScopeKey};
pub use websocket::ScopedWebSocket;

use crate::auth::{ApiKeyAuthenticator, JwtAuthenticator};
use crate::config::AuthgateConfig;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the demo application from configuration.
///
/// JWT takes precedence over API keys when both are configured. Without
/// either, no authenticator is installed and every scope read fails.
pub fn build_app(config: &AuthgateConfig) -> Result<Router> {
    config.validate()?;

    let router = if let Some(jwt) = &config.jwt {
        info!(algorithm = %jwt.algorithm, "Installing JWT authenticator");
        server::router(Some(JwtAuthenticator::new(jwt)?), &config.middleware)?
    } else if let Some(api_key) = &config.api_key {
        info!(
            header = %api_key.header,
            keys = api_key.keys.len(),
            "Installing API key authenticator"
        );
        server::router(Some(ApiKeyAuthenticator::new(api_key)?), &config.middleware)?
    } else {
        warn!("No authenticator configured, scope reads will fail");
        server::router::<ApiKeyAuthenticator>(None, &config.middleware)?
    };

    Ok(router.layer(TraceLayer::new_for_http()))
}

/// Initialize the server
pub async fn init_server(config: AuthgateConfig) -> Result<()> {
    let app = build_app(&config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AuthError::Io)?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AuthError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authgate=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
