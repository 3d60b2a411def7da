//! Websocket client transport.
//!
//! Dials `ws://<host:port>/?client_id=<id>` with the `whisker` subprotocol.
//! The connection is considered established only once the handshake
//! completes; there is no application-level handshake on top.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::Transport;

pub const SUBPROTOCOL: &str = "whisker";

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// `host:port` of the fleet server.
    pub server_address: String,
    /// Client id announced in the query string.
    pub client_id: String,
}

impl WebSocketConfig {
    pub fn new(server_address: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            client_id: client_id.into(),
        }
    }

    pub fn build_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("ws://{}/", self.server_address))
            .with_context(|| format!("invalid server address {:?}", self.server_address))?;
        url.query_pairs_mut().append_pair("client_id", &self.client_id);
        Ok(url)
    }
}

pub struct WebSocketTransport {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: Arc<AtomicBool>,
    io_task: tokio::task::JoinHandle<()>,
}

impl WebSocketTransport {
    /// Dial the server and complete the websocket handshake.
    pub async fn connect(config: WebSocketConfig) -> Result<Self> {
        let url = config.build_url()?;
        let mut request = url.as_str().into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let (ws_stream, _response) = connect_async(request)
            .await
            .with_context(|| format!("websocket connect to {url} failed"))?;

        let (tx_out, rx_out) = mpsc::unbounded_channel::<Vec<u8>>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<Vec<u8>>();
        let connected = Arc::new(AtomicBool::new(true));

        let io_task = tokio::spawn(run_websocket(ws_stream, rx_out, tx_in, connected.clone()));

        Ok(Self {
            tx: tx_out,
            rx: AsyncMutex::new(rx_in),
            connected,
            io_task,
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(anyhow!("websocket is not connected"));
        }
        self.tx
            .send(frame.to_vec())
            .map_err(|_| anyhow!("websocket writer has shut down"))
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
        self.io_task.abort();
    }
}

async fn run_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<Vec<u8>>,
    tx_in: mpsc::UnboundedSender<Vec<u8>>,
    connected: Arc<AtomicBool>,
) {
    let (mut sink, mut stream) = ws_stream.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx_out.recv().await {
            if sink.send(Message::Binary(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Binary(frame)) => {
                if tx_in.send(frame).is_err() {
                    break;
                }
            }
            Ok(Message::Text(text)) => {
                if tx_in.send(text.into_bytes()).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Ping/pong are handled by tungstenite itself.
            _ => {}
        }
    }

    connected.store(false, Ordering::Release);
    writer.abort();
    let _ = writer.await;
    // Dropping tx_in here closes the inbound channel, which the session
    // observes as end-of-stream.
}
