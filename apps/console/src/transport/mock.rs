//! In-memory duplex transport for tests.
//!
//! [`MockTransport::pair`] returns two cross-wired endpoints: frames sent on
//! one side arrive on the other. Dropping or severing either side terminates
//! the stream for its peer, which is how tests exercise disconnect handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use super::Transport;

pub struct MockTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (MockTransport, MockTransport) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        (
            MockTransport {
                tx: Mutex::new(Some(tx_a)),
                rx: AsyncMutex::new(rx_b),
                connected: connected.clone(),
            },
            MockTransport {
                tx: Mutex::new(Some(tx_b)),
                rx: AsyncMutex::new(rx_a),
                connected,
            },
        )
    }

    /// Simulate an abnormal transport termination. Dropping the sender wakes
    /// a peer parked in `recv` with end-of-stream.
    pub fn sever(&self) {
        self.connected.store(false, Ordering::Release);
        self.tx.lock().unwrap().take();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, frame: &[u8]) -> Result<()> {
        let tx = self.tx.lock().unwrap();
        let tx = tx
            .as_ref()
            .ok_or_else(|| anyhow!("mock transport is severed"))?;
        tx.send(frame.to_vec())
            .map_err(|_| anyhow!("peer endpoint has gone away"))
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        if !self.is_connected() {
            return None;
        }
        self.rx.lock().await.recv().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
