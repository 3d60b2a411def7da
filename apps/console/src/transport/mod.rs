//! Byte-stream transport seam.
//!
//! The session layer only sees this trait; the real implementation is the
//! websocket client in [`websocket`], and tests drive the session through the
//! in-memory pair in [`mock`].

use anyhow::Result;
use async_trait::async_trait;

pub mod mock;
pub mod websocket;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one frame to the remote peer.
    async fn send(&self, frame: &[u8]) -> Result<()>;

    /// Receive the next frame. `None` means the stream has terminated, either
    /// by an orderly close or a transport failure; the two are not
    /// distinguished.
    async fn recv(&self) -> Option<Vec<u8>>;

    fn is_connected(&self) -> bool;
}
