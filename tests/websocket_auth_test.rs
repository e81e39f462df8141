// WebSocket tests run against a real listener: the upgrade needs hyper's
// OnUpgrade extension, which `oneshot` requests do not carry.

use authgate::{
    auth::{AuthenticationResult, TokenStoreAuthenticator},
    websocket, AuthConnection, AuthenticationLayer,
};
use axum::{extract::ws::WebSocketUpgrade, response::Response, routing::get, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest, handshake::client::Request, protocol::frame::coding::CloseCode,
        Error as WsError, Message,
    },
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Auth {
    props: String,
}

fn moishe() -> AuthenticationResult<User, Auth> {
    AuthenticationResult::new(
        User {
            name: "moishe".to_string(),
            id: 100,
        },
        Auth {
            props: "abc".to_string(),
        },
    )
}

async fn spawn_server(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn ws_request(addr: SocketAddr, token: &str) -> Request {
    let mut request = format!("ws://{}/", addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", token.parse().unwrap());
    request
}

async fn websocket_route_handler(
    ws: WebSocketUpgrade,
    connection: AuthConnection<User, Auth>,
) -> Response {
    websocket::upgrade(ws, connection, |mut socket| async move {
        assert_eq!(socket.user()?.id, 100);
        assert_eq!(socket.auth()?.props, "abc");
        socket.send_json(&json!({ "data": "123" })).await?;
        socket.close().await
    })
}

async fn user_scope_handler(ws: WebSocketUpgrade, connection: AuthConnection<User, Auth>) -> Response {
    websocket::upgrade(ws, connection, |mut socket| async move {
        let name = socket.user()?.name.clone();
        socket.send_json(&json!({ "name": name })).await
    })
}

async fn auth_scope_handler(ws: WebSocketUpgrade, connection: AuthConnection<User, Auth>) -> Response {
    websocket::upgrade(ws, connection, |mut socket| async move {
        let props = socket.auth()?.props.clone();
        socket.send_json(&json!({ "props": props })).await
    })
}

async fn echo_handler(ws: WebSocketUpgrade, connection: AuthConnection<User, Auth>) -> Response {
    websocket::upgrade(ws, connection, |mut socket| async move {
        while let Some(message) = socket.receive_json::<Value>().await? {
            let reply = json!({ "from": socket.user()?.name, "echo": message });
            socket.send_json(&reply).await?;
        }
        Ok(())
    })
}

/// Assert the server dropped the socket without sending anything
async fn assert_abrupt_disconnect(addr: SocketAddr) {
    let (mut ws, _) = connect_async(ws_request(addr, "yep")).await.unwrap();

    let next = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("server kept the socket open");
    assert!(
        !matches!(
            next,
            Some(Ok(Message::Text(_) | Message::Binary(_) | Message::Close(_)))
        ),
        "expected an abrupt disconnect, got {:?}",
        next
    );
}

#[tokio::test]
async fn test_authentication_middleware_websocket_routes() {
    let store = TokenStoreAuthenticator::<User, Auth>::new().single_use();
    let app = Router::new()
        .route("/", get(websocket_route_handler))
        .layer(AuthenticationLayer::new(store.clone()));
    let addr = spawn_server(app).await;

    match connect_async(ws_request(addr, "abc")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 403),
        Err(e) => panic!("unexpected handshake error: {}", e),
        Ok(_) => panic!("handshake should have been denied"),
    }

    store.insert("abc", moishe());

    let (mut ws, _) = connect_async(ws_request(addr, "abc")).await.unwrap();

    let message = timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let data: Value = match message {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text message, got {:?}", other),
    };
    assert_eq!(data, json!({ "data": "123" }));

    let close = timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match close {
        Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
        other => panic!("expected a close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authentication_middleware_not_installed_raises_for_user_scope_websocket() {
    let app = Router::new().route("/", get(user_scope_handler));
    let addr = spawn_server(app).await;

    assert_abrupt_disconnect(addr).await;
}

#[tokio::test]
async fn test_authentication_middleware_not_installed_raises_for_auth_scope_websocket() {
    let app = Router::new().route("/", get(auth_scope_handler));
    let addr = spawn_server(app).await;

    assert_abrupt_disconnect(addr).await;
}

#[tokio::test]
async fn test_authenticated_echo_round_trip() {
    let store = TokenStoreAuthenticator::<User, Auth>::new();
    store.insert("abc", moishe());
    let app = Router::new()
        .route("/", get(echo_handler))
        .layer(AuthenticationLayer::new(store));
    let addr = spawn_server(app).await;

    let (mut ws, _) = connect_async(ws_request(addr, "abc")).await.unwrap();
    ws.send(Message::Text(json!({ "ping": 1 }).to_string()))
        .await
        .unwrap();

    let reply = timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let reply: Value = match reply {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text message, got {:?}", other),
    };
    assert_eq!(reply, json!({ "from": "moishe", "echo": { "ping": 1 } }));

    ws.close(None).await.unwrap();
}
