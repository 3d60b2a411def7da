//! Response-paced poll timers.
//!
//! Each timer schedules exactly one future fire a fixed quiet period after it
//! is armed, and never reschedules itself: re-arming happens only from the
//! handler that processed the corresponding response. Polling therefore
//! self-throttles to round-trip latency instead of piling up requests on a
//! slow network.
//!
//! Fires are delivered as events into the owning map view's channel, so a
//! fire can still be queued when the timer is re-armed or cancelled; the
//! epoch carried by the event lets the view discard such stale fires.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::map_view::{MapViewEvent, PollKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Armed,
    AwaitingResponse,
}

pub struct PollTimer {
    kind: PollKind,
    period: Duration,
    events: mpsc::UnboundedSender<MapViewEvent>,
    state: PollState,
    epoch: u64,
    pending: Option<JoinHandle<()>>,
}

impl PollTimer {
    pub fn new(
        kind: PollKind,
        period: Duration,
        events: mpsc::UnboundedSender<MapViewEvent>,
    ) -> Self {
        Self {
            kind,
            period,
            events,
            state: PollState::Idle,
            epoch: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Cancel any pending fire and schedule exactly one new one.
    pub fn arm(&mut self) {
        self.abort_pending();
        self.epoch += 1;

        let events = self.events.clone();
        let kind = self.kind;
        let epoch = self.epoch;
        let period = self.period;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let _ = events.send(MapViewEvent::Poll { kind, epoch });
        }));
        self.state = PollState::Armed;
    }

    /// Called when a fire event is dequeued. Returns whether the fire is
    /// current; a stale epoch means the timer was re-armed or cancelled after
    /// the fire was queued and the event must be ignored.
    pub fn accept_fire(&mut self, epoch: u64) -> bool {
        if self.state != PollState::Armed || epoch != self.epoch {
            return false;
        }
        self.pending = None;
        self.state = PollState::AwaitingResponse;
        true
    }

    /// Synchronously cancel any pending fire.
    pub fn cancel(&mut self) {
        self.abort_pending();
        self.epoch += 1;
        self.state = PollState::Idle;
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
