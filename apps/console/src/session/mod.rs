//! Connection channel: one duplex session with the fleet server.
//!
//! A [`Connection`] owns at most one transport at a time. Inbound frames are
//! decoded and handed to the [`MessageRouter`] strictly in receipt order;
//! undecodable frames are dropped and logged, never surfaced. Outbound sends
//! are dropped silently when no session is open — callers must not assume
//! delivery. Both an orderly close and an abnormal transport termination are
//! reported through the same state-change callback, exactly once per session.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::{InboundMessage, OutboundMessage, wire};
use crate::transport::Transport;

/// Receives every decoded inbound message. Dispatch is synchronous with
/// respect to frame arrival, so implementations must not block.
pub trait MessageRouter: Send + Sync {
    fn route(&self, message: InboundMessage);
}

pub type StateChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    transport: Arc<dyn Transport>,
    read_task: JoinHandle<()>,
    on_state_change: StateChangeCallback,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                active: Mutex::new(None),
            }),
        }
    }

    /// Install an already-established transport and start dispatching.
    ///
    /// The transport has signalled success by the time it exists, so the
    /// state callback fires `true` here and never optimistically before.
    /// A no-op if a session is already open.
    pub fn open(
        &self,
        transport: Arc<dyn Transport>,
        router: Arc<dyn MessageRouter>,
        on_state_change: StateChangeCallback,
    ) {
        let mut active = self.inner.active.lock().unwrap();
        if active.is_some() {
            trace!("open ignored: session already established");
            return;
        }

        let read_task = tokio::spawn(read_loop(
            self.inner.clone(),
            transport.clone(),
            router,
        ));
        *active = Some(ActiveSession {
            transport,
            read_task,
            on_state_change: on_state_change.clone(),
        });
        drop(active);

        on_state_change(true);
    }

    /// Request session shutdown. Idempotent.
    pub fn close(&self) {
        let Some(session) = self.inner.active.lock().unwrap().take() else {
            return;
        };
        session.read_task.abort();
        (session.on_state_change)(false);
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .active
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|session| session.transport.is_connected())
    }

    /// Serialize and write one frame. Dropped silently — not queued, not
    /// retried — when no session is open.
    pub async fn send(&self, message: OutboundMessage) {
        let transport = {
            let active = self.inner.active.lock().unwrap();
            match active.as_ref() {
                Some(session) if session.transport.is_connected() => session.transport.clone(),
                _ => {
                    trace!(name = message.name(), "dropping send: not connected");
                    return;
                }
            }
        };

        let frame = match wire::encode(&message) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(name = message.name(), %err, "failed to encode message");
                return;
            }
        };
        if let Err(err) = transport.send(&frame).await {
            debug!(name = message.name(), %err, "transport rejected frame");
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_loop(
    inner: Arc<ConnectionInner>,
    transport: Arc<dyn Transport>,
    router: Arc<dyn MessageRouter>,
) {
    while let Some(frame) = transport.recv().await {
        match wire::decode(&frame) {
            Ok(message) => router.route(message),
            Err(err) => debug!(%err, "dropping undecodable frame"),
        }
    }

    // End of stream: orderly close and abnormal termination land here alike.
    // Whoever removes the session from the slot reports the transition, so
    // the callback fires at most once even if `close` races with us.
    let session = inner.active.lock().unwrap().take();
    if let Some(session) = session {
        (session.on_state_change)(false);
    }
}
