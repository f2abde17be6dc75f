//! Requests and responses travelling over every supported transport.

use std::sync::Arc;

use rstest::rstest;
use streamframe::{
    StreamingConfig,
    endpoint::{NamedPipeClient, NamedPipeServer, WebSocketClient, WebSocketServer},
    message::{HttpContent, StreamingRequest, StreamingResponse},
    protocol::handler_fn,
};
use streamframe_testing::{RecordingRequestHandler, adapter_pair, echo_handler, status_handler};

const BODY_LEN: usize = 10_000;

fn large_post() -> (StreamingRequest, Vec<u8>) {
    let body: Vec<u8> = (0..BODY_LEN).map(|i| b'a' + (i % 26) as u8).collect();
    let mut request = StreamingRequest::create("POST", "/api/messages");
    request.add_stream(HttpContent::bytes("application/octet-stream", body.clone()));
    (request, body)
}

#[tokio::test]
async fn large_post_over_duplex_returns_ok() {
    let handler = RecordingRequestHandler::new();
    let (client, _server) = adapter_pair(status_handler(500), Arc::new(handler.clone())).await;

    let (request, body) = large_post();
    let response = client.adapter.send_request(request).await.expect("response");

    assert_eq!(response.status_code, 200);
    assert!(response.streams.is_empty());
    let seen = handler.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "POST");
    assert_eq!(seen[0].1, "/api/messages");
    assert_eq!(seen[0].2, body);
}

#[rstest]
#[case::empty("")]
#[case::short("hello")]
#[tokio::test]
async fn echo_returns_the_request_body(#[case] body: &str) {
    let (client, _server) = adapter_pair(status_handler(500), echo_handler()).await;
    let mut request = StreamingRequest::create("POST", "/echo");
    if !body.is_empty() {
        request.set_body(body);
    }

    let response = client.adapter.send_request(request).await.expect("response");

    assert_eq!(response.status_code, 200);
    assert_eq!(response.read_body_as_string().await.expect("utf-8"), body);
}

#[tokio::test]
async fn both_sides_can_originate_requests() {
    let (client, server) = adapter_pair(status_handler(201), status_handler(202)).await;

    let (to_server, to_client) = tokio::join!(
        client.adapter.send_request(StreamingRequest::create("GET", "/server")),
        server.adapter.send_request(StreamingRequest::create("GET", "/client")),
    );

    assert_eq!(to_server.expect("server response").status_code, 202);
    assert_eq!(to_client.expect("client response").status_code, 201);
}

#[tokio::test]
async fn json_bodies_round_trip_through_handlers() {
    let handler = handler_fn(|request| async move {
        let value: serde_json::Value = request.read_body_as_json().await.ok()?;
        let mut response = StreamingResponse::ok();
        response
            .set_json_body(&serde_json::json!({ "echo": value }))
            .ok()?;
        Some(response)
    });
    let (client, _server) = adapter_pair(status_handler(500), Arc::new(handler)).await;
    let mut request = StreamingRequest::create("POST", "/json");
    request
        .set_json_body(&serde_json::json!({ "text": "hi" }))
        .expect("encode");

    let response = client.adapter.send_request(request).await.expect("response");
    let value: serde_json::Value = response.read_body_as_json().await.expect("json");

    assert_eq!(value, serde_json::json!({ "echo": { "text": "hi" } }));
}

#[cfg(unix)]
#[tokio::test]
async fn large_post_over_named_pipes_returns_ok() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = StreamingConfig::default().with_pipe_root(dir.path());
    let handler = RecordingRequestHandler::new();
    let server = NamedPipeServer::bind("e2e", Arc::new(handler.clone()), &config)
        .await
        .expect("bind");
    let client = NamedPipeClient::new("e2e", status_handler(500), &config).expect("client");

    let (started, connected) = tokio::join!(server.start(), client.connect());
    started.expect("server start");
    connected.expect("client connect");
    assert!(server.is_connected());
    assert!(client.is_connected());

    let (request, body) = large_post();
    let response = client.send(request).await.expect("response");

    assert_eq!(response.status_code, 200);
    assert!(response.streams.is_empty());
    assert_eq!(handler.seen()[0].2, body);
    client.disconnect().await;
}

#[tokio::test]
async fn large_post_over_websocket_returns_ok() {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (client_ws, server_ws) = tokio::join!(
        tokio_tungstenite::client_async("ws://localhost/api", client_io),
        tokio_tungstenite::accept_async(server_io),
    );
    let (client_ws, _) = client_ws.expect("client handshake");
    let server_ws = server_ws.expect("server handshake");

    let config = StreamingConfig::default();
    let handler = RecordingRequestHandler::new();
    let server = WebSocketServer::accept(server_ws, Arc::new(handler.clone()), &config)
        .await
        .expect("accept");
    let client = WebSocketClient::new("ws://localhost/api", status_handler(500), &config);
    client.connect_stream(client_ws).await.expect("attach");

    let (request, body) = large_post();
    let response = client.send(request).await.expect("response");

    assert_eq!(response.status_code, 200);
    assert!(response.streams.is_empty());
    assert_eq!(handler.seen()[0].2, body);
    assert!(server.is_connected());
}
