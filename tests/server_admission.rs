//! Network-level tests: a real listener serving upgrade requests, exercised
//! with a plain HTTP client and a WebSocket client.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use wsgate::config::EndpointConfig;
use wsgate::endpoint::{HandlerSpec, MethodDecl, ParamSpec, Role};
use wsgate::server::{self, EndpointRegistry};

#[derive(Default)]
struct Echo;

fn echo_spec() -> HandlerSpec {
    HandlerSpec::new("Echo", Echo::default)
        .method(
            MethodDecl::new("on_open")
                .role(Role::OnOpen)
                .param(ParamSpec::session())
                .handler::<Echo, _>(|_, args| {
                    args.session(0)?.send_text("ready")?;
                    Ok(())
                }),
        )
        .method(
            MethodDecl::new("on_message")
                .role(Role::OnMessage)
                .param(ParamSpec::session())
                .param(ParamSpec::text())
                .handler::<Echo, _>(|_, args| {
                    let reply = format!("echo:{}", args.text(1)?);
                    args.session(0)?.send_text(&reply)?;
                    Ok(())
                }),
        )
}

#[derive(Default)]
struct Quiet;

fn quiet_spec() -> HandlerSpec {
    HandlerSpec::new("Quiet", Quiet::default).method(
        MethodDecl::new("on_event")
            .role(Role::OnEvent)
            .param(ParamSpec::session())
            .param(ParamSpec::event())
            .handler::<Quiet, _>(|_, args| {
                if let Some(event) = args.event(1)? {
                    args.session(0)?.send_text(event.label())?;
                }
                Ok(())
            }),
    )
}

#[derive(Default)]
struct Doorman;

fn doorman_spec() -> HandlerSpec {
    HandlerSpec::new("Doorman", Doorman::default).method(
        MethodDecl::new("before_handshake")
            .role(Role::BeforeHandshake)
            .param(ParamSpec::session())
            .handler::<Doorman, _>(|_, args| {
                args.session(0)?.close();
                Ok(())
            }),
    )
}

async fn start_endpoint(config: EndpointConfig, path: &str, spec: &HandlerSpec) {
    let mut registry = EndpointRegistry::new();
    registry.register(&config, path, spec).unwrap();

    for group in registry.build() {
        tokio::spawn(async move {
            let _ = server::serve(group).await;
        });
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn start_server(port: u16) {
    let config = EndpointConfig {
        host: "127.0.0.1".into(),
        port,
        ..EndpointConfig::default()
    };
    start_endpoint(config, "/echo", &echo_spec()).await;
}

#[tokio::test]
async fn websocket_echo_round_trip() {
    let port = 29481;
    start_server(port).await;

    let (mut socket, _response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/echo"))
            .await
            .expect("handshake failed");

    let greeting = socket.next().await.unwrap().unwrap();
    assert_eq!(greeting.into_text().unwrap().as_str(), "ready");

    socket.send(Message::Text("hi".into())).await.unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "echo:hi");

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn unknown_path_is_rejected_with_not_found() {
    let port = 29482;
    start_server(port).await;

    let error = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/missing"))
        .await
        .expect_err("handshake should fail");
    match error {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 404);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn plain_http_request_is_forbidden() {
    let port = 29483;
    start_server(port).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client
        .get(format!("http://127.0.0.1:{port}/echo"))
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(response.text().await.unwrap(), "403 Forbidden");
}

#[tokio::test]
async fn configured_idle_windows_fire_their_own_events() {
    let port = 29484;
    let config = EndpointConfig {
        host: "127.0.0.1".into(),
        port,
        reader_idle_secs: 1,
        all_idle_secs: 1,
        ..EndpointConfig::default()
    };
    start_endpoint(config, "/quiet", &quiet_spec()).await;

    let (mut socket, _response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/quiet"))
            .await
            .expect("handshake failed");

    let mut labels = Vec::new();
    while labels.len() < 2 {
        let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("idle event not delivered")
            .unwrap()
            .unwrap();
        if let Ok(text) = message.into_text() {
            labels.push(text.as_str().to_owned());
        }
    }

    assert!(labels.contains(&"reader-idle".to_owned()), "got {labels:?}");
    assert!(labels.contains(&"all-idle".to_owned()), "got {labels:?}");

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn malformed_handshake_is_a_bad_request() {
    let port = 29485;
    start_server(port).await;

    // Upgrade headers satisfy admission, but the missing Connection header
    // makes the handshake itself undecodable.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client
        .get(format!("http://127.0.0.1:{port}/echo"))
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("Sec-WebSocket-Version", "13")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().await.unwrap(), "400 Bad Request");
}

#[tokio::test]
async fn aborted_handshake_answers_a_bare_forbidden() {
    let port = 29486;
    let config = EndpointConfig {
        host: "127.0.0.1".into(),
        port,
        ..EndpointConfig::default()
    };
    start_endpoint(config, "/guarded", &doorman_spec()).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client
        .get(format!("http://127.0.0.1:{port}/guarded"))
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("Sec-WebSocket-Version", "13")
        .send()
        .await
        .expect("server unreachable");

    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(
        response.headers().get("connection").and_then(|v| v.to_str().ok()),
        Some("close")
    );
    assert!(response.text().await.unwrap().is_empty());
}
