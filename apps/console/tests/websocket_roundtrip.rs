//! Session establishment and traffic over a real websocket.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

use whisker_console::client::Console;
use whisker_console::transport::websocket::{WebSocketConfig, WebSocketTransport};

#[tokio::test]
async fn establishes_session_and_exchanges_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let seen_uri = Arc::new(Mutex::new(None::<String>));
    let seen_protocol = Arc::new(Mutex::new(None::<String>));

    let server_uri = seen_uri.clone();
    let server_protocol = seen_protocol.clone();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let callback = move |request: &Request, mut response: Response| {
            *server_uri.lock().unwrap() = Some(request.uri().to_string());
            *server_protocol.lock().unwrap() = request
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            response
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("whisker"));
            Ok(response)
        };
        let mut ws = accept_hdr_async(stream, callback).await.expect("handshake");

        // Push the initial server state.
        let mut frame = b"whisker.proto.ServerStateMessage\0".to_vec();
        frame.extend_from_slice(
            serde_json::json!({"mapIds": ["m"], "vehicles": {}})
                .to_string()
                .as_bytes(),
        );
        ws.send(Message::Binary(frame)).await.expect("server send");

        // Wait for one client request.
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(frame))) => return frame,
                Some(Ok(_)) => continue,
                other => panic!("client frame expected, got {other:?}"),
            }
        }
    });

    let transport = WebSocketTransport::connect(WebSocketConfig::new(
        addr.to_string(),
        "console0",
    ))
    .await
    .expect("connect");

    let console = Console::new();
    console.connect(Arc::new(transport), Arc::new(|_| {}));

    let deadline = Instant::now() + Duration::from_secs(2);
    while console.map_ids() != vec!["m".to_string()] {
        assert!(Instant::now() < deadline, "server state never arrived");
        sleep(Duration::from_millis(10)).await;
    }

    console.request_resource_files().await;

    let frame = timeout(Duration::from_secs(2), server)
        .await
        .expect("server finished")
        .expect("server task");
    assert!(frame.starts_with(b"whisker.proto.RequestResourceFilesMessage\0"));

    assert_eq!(
        seen_uri.lock().unwrap().as_deref(),
        Some("/?client_id=console0")
    );
    assert_eq!(seen_protocol.lock().unwrap().as_deref(), Some("whisker"));

    console.disconnect();
}
