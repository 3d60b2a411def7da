//! Connection-wide console state and inbound message routing.
//!
//! One [`Console`] spans the life of the process. It owns the connection, the
//! registry of open map views, and the state every view shares: the server's
//! map list, the vehicle directory, and the map resource file list. All of it
//! resets when the connection drops — map views included — so a reconnect
//! starts from a clean slate, mirroring the server's own notion of a fresh
//! session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, trace};

use crate::protocol::{InboundMessage, ServerStateMessage, VehicleInfo};
use crate::render::RenderSink;
use crate::session::{Connection, MessageRouter, StateChangeCallback};
use crate::transport::Transport;

use super::VehicleDirectory;
use super::map_view::{MapView, MapViewEvent};

#[derive(Clone)]
pub struct Console {
    connection: Connection,
    shared: Arc<ConsoleShared>,
}

struct ConsoleShared {
    map_ids: RwLock<Vec<String>>,
    resource_files: RwLock<Vec<String>>,
    directory: VehicleDirectory,
    views: RwLock<HashMap<String, MapView>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            connection: Connection::new(),
            shared: Arc::new(ConsoleShared {
                map_ids: RwLock::new(Vec::new()),
                resource_files: RwLock::new(Vec::new()),
                directory: Arc::new(RwLock::new(HashMap::new())),
                views: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Attach an established transport and start processing. `on_change`
    /// observes connection-state transitions after the console's own
    /// bookkeeping has run.
    pub fn connect(&self, transport: Arc<dyn Transport>, on_change: StateChangeCallback) {
        let router = Arc::new(ConsoleRouter {
            shared: self.shared.clone(),
        });

        let shared = self.shared.clone();
        let state_callback: StateChangeCallback = Arc::new(move |connected| {
            if !connected {
                let shared = shared.clone();
                tokio::spawn(async move { shared.reset().await });
            }
            on_change(connected);
        });

        self.connection.open(transport, router, state_callback);
    }

    pub fn disconnect(&self) {
        self.connection.close();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn map_ids(&self) -> Vec<String> {
        self.shared.map_ids.read().unwrap().clone()
    }

    pub fn resource_files(&self) -> Vec<String> {
        self.shared.resource_files.read().unwrap().clone()
    }

    pub fn vehicle(&self, vehicle_id: &str) -> Option<VehicleInfo> {
        self.shared.directory.read().unwrap().get(vehicle_id).cloned()
    }

    pub fn vehicle_ids(&self) -> Vec<String> {
        self.shared.directory.read().unwrap().keys().cloned().collect()
    }

    /// Open a view for `map_id`, wiring its change events into `sink`.
    /// Replaces any existing view for the same map.
    pub async fn open_map_view(&self, map_id: &str, sink: Arc<dyn RenderSink>) {
        let view = MapView::spawn(
            map_id,
            self.connection.clone(),
            self.shared.directory.clone(),
            sink,
        );
        let previous = self
            .shared
            .views
            .write()
            .unwrap()
            .insert(map_id.to_string(), view);
        if let Some(previous) = previous {
            debug!(map_id, "replacing existing map view");
            previous.dispose().await;
        }
        info!(map_id, "map view opened");
    }

    pub async fn close_map_view(&self, map_id: &str) {
        let view = self.shared.views.write().unwrap().remove(map_id);
        if let Some(view) = view {
            view.dispose().await;
            info!(map_id, "map view closed");
        }
    }

    pub fn has_map_view(&self, map_id: &str) -> bool {
        self.shared.views.read().unwrap().contains_key(map_id)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleShared {
    fn apply_server_state(&self, state: ServerStateMessage) {
        *self.map_ids.write().unwrap() = state.map_ids;
        *self.directory.write().unwrap() = state.vehicles;
    }

    async fn reset(&self) {
        let views: Vec<MapView> = {
            let mut registry = self.views.write().unwrap();
            registry.drain().map(|(_, view)| view).collect()
        };
        for view in views {
            view.dispose().await;
        }
        self.map_ids.write().unwrap().clear();
        self.resource_files.write().unwrap().clear();
        self.directory.write().unwrap().clear();
    }
}

struct ConsoleRouter {
    shared: Arc<ConsoleShared>,
}

impl ConsoleRouter {
    fn deliver_to_view(&self, map_id: &str, event: MapViewEvent) {
        match self.shared.views.read().unwrap().get(map_id) {
            Some(view) => view.deliver(event),
            // Forward-compatibility allowance: traffic for maps without an
            // open view is not an error.
            None => trace!(map_id, "discarding message for map without a view"),
        }
    }
}

impl MessageRouter for ConsoleRouter {
    fn route(&self, message: InboundMessage) {
        match message {
            InboundMessage::ServerState(state) => self.shared.apply_server_state(state),
            InboundMessage::ResourceFiles(files) => {
                *self.shared.resource_files.write().unwrap() = files.maps;
            }
            InboundMessage::MapData(update) => {
                let map_id = update.map_id.clone();
                self.deliver_to_view(&map_id, MapViewEvent::MapData(update));
            }
            InboundMessage::SubmapTexture(texture) => {
                let map_id = texture.map_id.clone();
                self.deliver_to_view(&map_id, MapViewEvent::SubmapTexture(texture));
            }
            InboundMessage::VehiclePoses(poses) => match poses.map_id.clone() {
                Some(map_id) => self.deliver_to_view(&map_id, MapViewEvent::VehiclePoses(poses)),
                None => trace!("discarding pose batch without a map id"),
            },
        }
    }
}
