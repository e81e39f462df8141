//! WebSocket handlers with access to the auth scope.
//!
//! A denied handshake never reaches this module: the middleware answers it
//! before the upgrade. Errors raised after the upgrade (including a missing
//! scope entry) drop the socket without a close frame.

use crate::error::{AuthError, Result};
use crate::scope::AuthConnection;
use axum::{
    extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};
use std::borrow::Cow;
use std::future::Future;
use tracing::{debug, error};

/// An accepted WebSocket together with the connection's auth scope
pub struct ScopedWebSocket<U, A> {
    socket: WebSocket,
    connection: AuthConnection<U, A>,
}

impl<U, A> ScopedWebSocket<U, A> {
    pub fn new(socket: WebSocket, connection: AuthConnection<U, A>) -> Self {
        Self { socket, connection }
    }

    pub fn user(&self) -> Result<&U> {
        self.connection.user()
    }

    pub fn auth(&self) -> Result<&A> {
        self.connection.auth()
    }

    pub fn connection(&self) -> &AuthConnection<U, A> {
        &self.connection
    }

    /// Send a value as a JSON text frame
    pub async fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| AuthError::Serialization(format!("Failed to encode message: {}", e)))?;

        self.socket
            .send(Message::Text(text))
            .await
            .map_err(|e| AuthError::Internal(format!("WebSocket send failed: {}", e)))
    }

    /// Receive the next data frame as JSON; `None` once the peer closed
    pub async fn receive_json<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            let message = match self.socket.recv().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Err(AuthError::Internal(format!(
                        "WebSocket receive failed: {}",
                        e
                    )))
                }
                None => return Ok(None),
            };

            let decoded = match message {
                Message::Text(text) => serde_json::from_str(&text),
                Message::Binary(bytes) => serde_json::from_slice(&bytes),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            return decoded
                .map(Some)
                .map_err(|e| AuthError::Serialization(format!("Failed to decode message: {}", e)));
        }
    }

    /// Close the socket with a normal close frame
    pub async fn close(mut self) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: Cow::Borrowed(""),
            })))
            .await
            .map_err(|e| AuthError::Internal(format!("WebSocket close failed: {}", e)))
    }

    /// Drop the connection without a close frame
    pub fn disconnect(self) {
        debug!("Dropping WebSocket connection");
    }
}

/// Upgrade the connection and run `handler` on the accepted socket.
///
/// If the handler fails the error is logged and the socket is dropped, so the
/// client sees an abrupt disconnect with no payload.
///
/// ```ignore
/// async fn ws(ws: WebSocketUpgrade, conn: AuthConnection<User, Token>) -> Response {
///     websocket::upgrade(ws, conn, |mut socket| async move {
///         let id = socket.user()?.id;
///         socket.send_json(&json!({ "id": id })).await?;
///         socket.close().await
///     })
/// }
/// ```
pub fn upgrade<U, A, F, Fut>(
    ws: WebSocketUpgrade,
    connection: AuthConnection<U, A>,
    handler: F,
) -> Response
where
    U: Send + 'static,
    A: Send + 'static,
    F: FnOnce(ScopedWebSocket<U, A>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handler(ScopedWebSocket::new(socket, connection)).await {
            error!(error = %e, "WebSocket handler failed, disconnecting");
        }
    })
}
