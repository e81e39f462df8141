//! Demo routes reporting the authenticated identity over HTTP and WebSocket.

use crate::auth::Authenticator;
use crate::config::AuthMiddlewareConfig;
use crate::error::Result;
use crate::middleware::AuthenticationLayer;
use crate::scope::AuthConnection;
use crate::websocket;
use axum::{
    extract::ws::WebSocketUpgrade,
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Return the scope entries of the current connection
pub async fn whoami<U, A>(connection: AuthConnection<U, A>) -> Result<Json<Value>>
where
    U: Serialize + Clone + Send + Sync + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
{
    Ok(Json(json!({
        "user": connection.user()?,
        "auth": connection.auth()?,
    })))
}

/// Send the scope entries as one JSON message, then close
pub async fn whoami_ws<U, A>(ws: WebSocketUpgrade, connection: AuthConnection<U, A>) -> Response
where
    U: Serialize + Clone + Send + Sync + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
{
    websocket::upgrade(ws, connection, |mut socket| async move {
        let message = json!({
            "user": socket.user()?,
            "auth": socket.auth()?,
        });
        socket.send_json(&message).await?;
        socket.close().await
    })
}

/// Build the demo router, installing `authenticator` when one is given
pub fn router<A>(authenticator: Option<A>, config: &AuthMiddlewareConfig) -> Result<Router>
where
    A: Authenticator,
    A::User: Serialize,
    A::Auth: Serialize,
{
    let router = Router::new()
        .route("/", get(whoami::<A::User, A::Auth>))
        .route("/ws", get(whoami_ws::<A::User, A::Auth>));

    match authenticator {
        Some(authenticator) => {
            Ok(router.layer(AuthenticationLayer::with_config(authenticator, config)?))
        }
        None => Ok(router),
    }
}
