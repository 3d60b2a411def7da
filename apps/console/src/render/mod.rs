//! Interface to the external rendering pipeline.
//!
//! The sync engine never draws; it pushes change notifications into a
//! [`RenderSink`] and coalesces redraw requests so that any number of state
//! changes inside one scheduling turn produce at most one render pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::client::poses::Indicator;
use crate::client::tiles::TileRaster;
use crate::protocol::{Pose2, SubmapId};

/// Consumer of sync-engine change events. Implementations must not block:
/// calls arrive on the map view's event turn.
pub trait RenderSink: Send + Sync {
    fn tile_pose_changed(&self, submap_id: SubmapId, global_pose: Pose2);
    fn tile_raster_changed(&self, submap_id: SubmapId, raster: &Arc<TileRaster>, submap_pose: Pose2);
    fn tile_removed(&self, submap_id: SubmapId);
    fn indicator_upserted(&self, indicator: &Indicator);
    fn indicator_removed(&self, vehicle_id: &str);
    /// A render pass is wanted. Consume the token when the pass actually
    /// executes; until then further requests are suppressed.
    fn redraw_requested(&self, token: RedrawToken);
}

/// Clears the coalescer's pending flag when the render pass runs (or when the
/// sink discards the token).
#[derive(Debug)]
pub struct RedrawToken {
    pending: Arc<AtomicBool>,
}

impl RedrawToken {
    /// Mark the render pass as executed.
    pub fn complete(self) {}
}

impl Drop for RedrawToken {
    fn drop(&mut self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Pending-flag deduplication of redraw requests. The flag is set on the
/// first request and cleared only when the render pass executes, so repeated
/// requests within one turn collapse into a single pass.
#[derive(Debug, Default)]
pub struct RedrawCoalescer {
    pending: Arc<AtomicBool>,
}

impl RedrawCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, sink: &dyn RenderSink) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            sink.redraw_requested(RedrawToken {
                pending: self.pending.clone(),
            });
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

/// Sink for the headless binary: logs every change event.
#[derive(Debug, Default)]
pub struct TracingSink;

impl RenderSink for TracingSink {
    fn tile_pose_changed(&self, submap_id: SubmapId, global_pose: Pose2) {
        info!(%submap_id, x = global_pose.x, y = global_pose.y, r = global_pose.r, "tile pose");
    }

    fn tile_raster_changed(
        &self,
        submap_id: SubmapId,
        raster: &Arc<TileRaster>,
        submap_pose: Pose2,
    ) {
        info!(
            %submap_id,
            width = raster.image.width(),
            height = raster.image.height(),
            resolution = raster.resolution,
            x = submap_pose.x,
            y = submap_pose.y,
            "tile raster"
        );
    }

    fn tile_removed(&self, submap_id: SubmapId) {
        info!(%submap_id, "tile removed");
    }

    fn indicator_upserted(&self, indicator: &Indicator) {
        info!(
            vehicle_id = %indicator.vehicle_id,
            x = indicator.pose.x,
            y = indicator.pose.y,
            "indicator"
        );
    }

    fn indicator_removed(&self, vehicle_id: &str) {
        info!(vehicle_id, "indicator removed");
    }

    fn redraw_requested(&self, token: RedrawToken) {
        // Headless: the "render pass" is immediate.
        token.complete();
    }
}

/// Test sink that records every event in order. Redraw tokens are held until
/// [`RecordingSink::run_render_pass`] is called, mirroring a renderer whose
/// pass runs on the next animation frame — this is what lets tests observe
/// coalescing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RenderEvent>>,
    held_tokens: Mutex<Vec<RedrawToken>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    TilePose(SubmapId, Pose2),
    TileRaster(SubmapId, u32, u32),
    TileRemoved(SubmapId),
    IndicatorUpserted(String, Pose2, f64, String),
    IndicatorRemoved(String),
    Redraw,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take_events(&self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }

    /// Execute the pending render pass, completing every held token.
    pub fn run_render_pass(&self) {
        for token in self.held_tokens.lock().unwrap().drain(..) {
            token.complete();
        }
    }

    fn push(&self, event: RenderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RenderSink for RecordingSink {
    fn tile_pose_changed(&self, submap_id: SubmapId, global_pose: Pose2) {
        self.push(RenderEvent::TilePose(submap_id, global_pose));
    }

    fn tile_raster_changed(
        &self,
        submap_id: SubmapId,
        raster: &Arc<TileRaster>,
        _submap_pose: Pose2,
    ) {
        self.push(RenderEvent::TileRaster(
            submap_id,
            raster.image.width(),
            raster.image.height(),
        ));
    }

    fn tile_removed(&self, submap_id: SubmapId) {
        self.push(RenderEvent::TileRemoved(submap_id));
    }

    fn indicator_upserted(&self, indicator: &Indicator) {
        self.push(RenderEvent::IndicatorUpserted(
            indicator.vehicle_id.clone(),
            indicator.pose,
            indicator.keep_out_radius,
            indicator.label.clone(),
        ));
    }

    fn indicator_removed(&self, vehicle_id: &str) {
        self.push(RenderEvent::IndicatorRemoved(vehicle_id.to_string()));
    }

    fn redraw_requested(&self, token: RedrawToken) {
        self.push(RenderEvent::Redraw);
        self.held_tokens.lock().unwrap().push(token);
    }
}
