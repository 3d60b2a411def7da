//! Per-map view context.
//!
//! Everything belonging to one viewed map — the tile store, the indicator
//! set, both poll timers, and the redraw coalescer — is owned by a single
//! task consuming one event channel. Inbound messages, decode completions,
//! and timer fires all arrive as discrete turns on that channel, so no two
//! turns touching the same map state ever run concurrently and no locking is
//! needed. Ordering between turns is not guaranteed once decode is involved,
//! which is why texture commits re-validate against the store first.

use std::sync::Arc;
use std::time::Duration;

use image::ImageError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::protocol::{
    MapDataMessage, OutboundMessage, Pose2, RequestMapDataMessage, RequestSubmapTexturesMessage,
    RequestVehiclePosesMessage, SubmapId, SubmapTextureMessage, VehiclePosesMessage,
};
use crate::render::{RedrawCoalescer, RenderSink};
use crate::session::Connection;

use super::VehicleDirectory;
use super::poll::PollTimer;
use super::poses::IndicatorSet;
use super::tiles::{CommitOutcome, TileRaster, TileStore};

/// Quiet period between a processed map-metadata response and the next
/// request.
pub const MAP_DATA_REQUEST_PERIOD: Duration = Duration::from_millis(200);
/// Quiet period between a processed pose response and the next request.
pub const VEHICLE_POSES_REQUEST_PERIOD: Duration = Duration::from_millis(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    MapData,
    VehiclePoses,
}

pub struct DecodedTexture {
    pub submap_id: SubmapId,
    pub version: u64,
    pub submap_pose: Pose2,
    pub result: Result<TileRaster, ImageError>,
}

pub enum MapViewEvent {
    MapData(MapDataMessage),
    SubmapTexture(SubmapTextureMessage),
    VehiclePoses(VehiclePosesMessage),
    TextureDecoded(DecodedTexture),
    Poll { kind: PollKind, epoch: u64 },
    Shutdown,
}

/// Handle to a live map view. Dropping it without calling
/// [`MapView::dispose`] aborts the task.
pub struct MapView {
    map_id: String,
    events: mpsc::UnboundedSender<MapViewEvent>,
    task: JoinHandle<()>,
}

impl MapView {
    /// Create the view context and start its event loop. Both poll timers are
    /// armed immediately, so the first requests go out one quiet period after
    /// creation.
    pub fn spawn(
        map_id: impl Into<String>,
        connection: Connection,
        directory: VehicleDirectory,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        let map_id = map_id.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut state = ViewState {
            map_id: map_id.clone(),
            connection,
            directory,
            sink,
            tiles: TileStore::new(map_id.clone()),
            indicators: IndicatorSet::new(),
            redraw: RedrawCoalescer::new(),
            map_data_timer: PollTimer::new(
                PollKind::MapData,
                MAP_DATA_REQUEST_PERIOD,
                events_tx.clone(),
            ),
            poses_timer: PollTimer::new(
                PollKind::VehiclePoses,
                VEHICLE_POSES_REQUEST_PERIOD,
                events_tx.clone(),
            ),
            events_tx: events_tx.clone(),
        };

        let task = tokio::spawn(async move {
            state.map_data_timer.arm();
            state.poses_timer.arm();
            state.run(events_rx).await;
        });

        Self {
            map_id,
            events: events_tx,
            task,
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Queue one event for the view's next turn. No-op after disposal.
    pub fn deliver(&self, event: MapViewEvent) {
        let _ = self.events.send(event);
    }

    /// Tear the view down: both poll timers are cancelled before the task
    /// exits, and any decode completion still in flight becomes a no-op.
    pub async fn dispose(mut self) {
        let _ = self.events.send(MapViewEvent::Shutdown);
        let _ = (&mut self.task).await;
    }
}

impl Drop for MapView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ViewState {
    map_id: String,
    connection: Connection,
    directory: VehicleDirectory,
    sink: Arc<dyn RenderSink>,
    tiles: TileStore,
    indicators: IndicatorSet,
    redraw: RedrawCoalescer,
    map_data_timer: PollTimer,
    poses_timer: PollTimer,
    events_tx: mpsc::UnboundedSender<MapViewEvent>,
}

impl ViewState {
    async fn run(&mut self, mut events: mpsc::UnboundedReceiver<MapViewEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                MapViewEvent::MapData(update) => self.on_map_data(update).await,
                MapViewEvent::SubmapTexture(texture) => self.on_submap_texture(texture),
                MapViewEvent::VehiclePoses(poses) => self.on_vehicle_poses(poses),
                MapViewEvent::TextureDecoded(decoded) => self.on_texture_decoded(decoded),
                MapViewEvent::Poll { kind, epoch } => self.on_poll(kind, epoch).await,
                MapViewEvent::Shutdown => {
                    self.map_data_timer.cancel();
                    self.poses_timer.cancel();
                    return;
                }
            }
        }
    }

    async fn on_map_data(&mut self, update: MapDataMessage) {
        let outcome = self.tiles.apply_map_data(&update);

        if !outcome.fetch.is_empty() {
            self.connection
                .send(OutboundMessage::RequestSubmapTextures(
                    RequestSubmapTexturesMessage {
                        map_id: self.map_id.clone(),
                        submap_ids: outcome.fetch.clone(),
                    },
                ))
                .await;
        }

        self.map_data_timer.arm();

        for key in &outcome.poses_changed {
            if let Some(pose) = self.tiles.get(key).and_then(|tile| tile.global_pose()) {
                self.sink.tile_pose_changed(*key, pose);
            }
        }
        for key in &outcome.evicted {
            self.sink.tile_removed(*key);
        }
        if outcome.resynced {
            self.redraw.request(&*self.sink);
        }
    }

    fn on_submap_texture(&mut self, texture: SubmapTextureMessage) {
        self.tiles.note_texture_arrival(texture.submap_id);

        // Decode off the critical path; the completion re-enters as an event
        // and is re-validated there, because a newer update or a teardown may
        // run in between.
        let events = self.events_tx.clone();
        let SubmapTextureMessage {
            submap_id,
            version,
            texture: bytes,
            resolution,
            submap_pose,
            ..
        } = texture;
        tokio::task::spawn_blocking(move || {
            let result = image::load_from_memory(&bytes).map(|decoded| TileRaster {
                image: decoded.into_luma8(),
                resolution,
            });
            let _ = events.send(MapViewEvent::TextureDecoded(DecodedTexture {
                submap_id,
                version,
                submap_pose,
                result,
            }));
        });

        // A texture arrival also counts as activity pacing the next poll.
        self.map_data_timer.arm();
    }

    fn on_texture_decoded(&mut self, decoded: DecodedTexture) {
        let raster = match decoded.result {
            Ok(raster) => raster,
            Err(err) => {
                debug!(submap_id = %decoded.submap_id, %err, "discarding undecodable texture");
                return;
            }
        };

        let raster = Arc::new(raster);
        match self.tiles.commit_texture(
            decoded.submap_id,
            decoded.version,
            raster.clone(),
            decoded.submap_pose,
        ) {
            CommitOutcome::Committed => {
                self.sink
                    .tile_raster_changed(decoded.submap_id, &raster, decoded.submap_pose);
                self.redraw.request(&*self.sink);
            }
            outcome @ (CommitOutcome::SupersededVersion | CommitOutcome::TileEvicted) => {
                trace!(
                    submap_id = %decoded.submap_id,
                    version = decoded.version,
                    ?outcome,
                    "stale texture discarded"
                );
            }
        }
    }

    fn on_vehicle_poses(&mut self, poses: VehiclePosesMessage) {
        let directory = self.directory.clone();
        let outcome = self.indicators.reconcile(&poses.vehicle_poses, |id| {
            directory
                .read()
                .unwrap()
                .get(id)
                .map(|info| info.keep_out_radius)
        });

        for id in outcome.created.iter().chain(&outcome.updated) {
            if let Some(indicator) = self.indicators.get(id) {
                self.sink.indicator_upserted(indicator);
                self.redraw.request(&*self.sink);
            }
        }
        for id in &outcome.removed {
            self.sink.indicator_removed(id);
            self.redraw.request(&*self.sink);
        }

        self.poses_timer.arm();
    }

    async fn on_poll(&mut self, kind: PollKind, epoch: u64) {
        match kind {
            PollKind::MapData => {
                if self.map_data_timer.accept_fire(epoch) {
                    self.connection
                        .send(OutboundMessage::RequestMapData(RequestMapDataMessage {
                            map_id: self.map_id.clone(),
                            have_version: self.tiles.have_version(),
                        }))
                        .await;
                }
            }
            PollKind::VehiclePoses => {
                if self.poses_timer.accept_fire(epoch) {
                    self.connection
                        .send(OutboundMessage::RequestVehiclePoses(
                            RequestVehiclePosesMessage {
                                map_id: self.map_id.clone(),
                            },
                        ))
                        .await;
                }
            }
        }
    }
}
