//! Wire contract with the whisker fleet server.
//!
//! Every message travels as one frame: the namespaced message name, a single
//! `0x00` delimiter byte, then the serialized body. The set of message types
//! is closed; inbound frames decode into [`InboundMessage`] and outbound
//! traffic is built from [`OutboundMessage`], so dispatch is an exhaustive
//! match rather than a string-keyed handler table.

pub mod wire;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 2-D rigid transform: translation plus rotation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub r: f64,
}

impl Pose2 {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r }
    }
}

/// Composite identity of a submap tile, stable for the tile's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmapId {
    #[serde(default)]
    pub trajectory_id: i32,
    #[serde(default)]
    pub index: i32,
}

impl SubmapId {
    pub fn new(trajectory_id: i32, index: i32) -> Self {
        Self {
            trajectory_id,
            index,
        }
    }
}

impl fmt::Display for SubmapId {
    // ':' cannot occur in the textual form of either integer field
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.trajectory_id, self.index)
    }
}

/// One entry of a map metadata update. `global_pose` is only populated when
/// the update is a full resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmapEntry {
    pub submap_id: SubmapId,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_pose: Option<Pose2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDataMessage {
    pub map_id: String,
    #[serde(default)]
    pub map_version: u64,
    #[serde(default)]
    pub is_new_map_version: bool,
    #[serde(default)]
    pub submaps: Vec<SubmapEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmapTextureMessage {
    pub map_id: String,
    pub submap_id: SubmapId,
    #[serde(default)]
    pub version: u64,
    /// PNG-encoded occupancy raster.
    #[serde(default)]
    pub texture: Vec<u8>,
    /// Metres per pixel.
    #[serde(default)]
    pub resolution: f64,
    #[serde(default)]
    pub submap_pose: Pose2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePose {
    pub vehicle_id: String,
    #[serde(default)]
    pub pose: Pose2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePosesMessage {
    #[serde(default)]
    pub map_id: Option<String>,
    #[serde(default)]
    pub vehicle_poses: Vec<VehiclePose>,
}

/// Per-vehicle metadata published by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    #[serde(default)]
    pub assigned_map_id: String,
    #[serde(default)]
    pub keep_out_radius: f64,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStateMessage {
    #[serde(default)]
    pub map_ids: Vec<String>,
    #[serde(default)]
    pub vehicles: HashMap<String, VehicleInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceFilesMessage {
    #[serde(default)]
    pub maps: Vec<String>,
}

/// Messages the console consumes. The closed set doubles as the decode
/// schema: a frame naming anything else is a decode error.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ServerState(ServerStateMessage),
    ResourceFiles(ResourceFilesMessage),
    MapData(MapDataMessage),
    SubmapTexture(SubmapTextureMessage),
    VehiclePoses(VehiclePosesMessage),
}

impl InboundMessage {
    pub fn name(&self) -> &'static str {
        match self {
            InboundMessage::ServerState(_) => "ServerStateMessage",
            InboundMessage::ResourceFiles(_) => "ResourceFilesMessage",
            InboundMessage::MapData(_) => "MapDataMessage",
            InboundMessage::SubmapTexture(_) => "SubmapTextureMessage",
            InboundMessage::VehiclePoses(_) => "VehiclePosesMessage",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMapDataMessage {
    pub map_id: String,
    #[serde(default)]
    pub have_version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSubmapTexturesMessage {
    pub map_id: String,
    #[serde(default)]
    pub submap_ids: Vec<SubmapId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestVehiclePosesMessage {
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCreateMapMessage {
    pub map_id: String,
    #[serde(default)]
    pub use_overlapping_trimmer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDeleteMapMessage {
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSaveMapMessage {
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLoadMapMessage {
    pub map_id: String,
    pub map_file_name: String,
    #[serde(default)]
    pub is_frozen: bool,
    #[serde(default)]
    pub use_overlapping_trimmer: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResourceFilesMessage {}

/// An empty `map_id` with no optional fields unassigns the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAssignVehicleToMapMessage {
    pub vehicle_id: String,
    pub map_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_pose: Option<Pose2>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_global_localization: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_localization_trimmer: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDeleteVehicleMessage {
    pub vehicle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStartObservationLogMessage {
    pub vehicle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStopObservationLogMessage {
    pub vehicle_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeCapabilityMessage {
    pub vehicle_id: String,
    pub capability: String,
    #[serde(default)]
    pub input: String,
}

/// Messages the console produces.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    RequestMapData(RequestMapDataMessage),
    RequestSubmapTextures(RequestSubmapTexturesMessage),
    RequestVehiclePoses(RequestVehiclePosesMessage),
    RequestCreateMap(RequestCreateMapMessage),
    RequestDeleteMap(RequestDeleteMapMessage),
    RequestSaveMap(RequestSaveMapMessage),
    RequestLoadMap(RequestLoadMapMessage),
    RequestResourceFiles(RequestResourceFilesMessage),
    RequestAssignVehicleToMap(RequestAssignVehicleToMapMessage),
    RequestDeleteVehicle(RequestDeleteVehicleMessage),
    RequestStartObservationLog(RequestStartObservationLogMessage),
    RequestStopObservationLog(RequestStopObservationLogMessage),
    InvokeCapability(InvokeCapabilityMessage),
}

impl OutboundMessage {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::RequestMapData(_) => "RequestMapDataMessage",
            OutboundMessage::RequestSubmapTextures(_) => "RequestSubmapTexturesMessage",
            OutboundMessage::RequestVehiclePoses(_) => "RequestVehiclePosesMessage",
            OutboundMessage::RequestCreateMap(_) => "RequestCreateMapMessage",
            OutboundMessage::RequestDeleteMap(_) => "RequestDeleteMapMessage",
            OutboundMessage::RequestSaveMap(_) => "RequestSaveMapMessage",
            OutboundMessage::RequestLoadMap(_) => "RequestLoadMapMessage",
            OutboundMessage::RequestResourceFiles(_) => "RequestResourceFilesMessage",
            OutboundMessage::RequestAssignVehicleToMap(_) => "RequestAssignVehicleToMapMessage",
            OutboundMessage::RequestDeleteVehicle(_) => "RequestDeleteVehicleMessage",
            OutboundMessage::RequestStartObservationLog(_) => "RequestStartObservationLogMessage",
            OutboundMessage::RequestStopObservationLog(_) => "RequestStopObservationLogMessage",
            OutboundMessage::InvokeCapability(_) => "InvokeCapabilityMessage",
        }
    }
}
