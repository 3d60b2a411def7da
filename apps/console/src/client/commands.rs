//! One-shot request senders.
//!
//! Fire-and-forget wrappers over [`Console`]'s connection: each builds one
//! request message and sends it. Like every send, a request issued while
//! disconnected is dropped silently.

use crate::protocol::{
    InvokeCapabilityMessage, OutboundMessage, Pose2, RequestAssignVehicleToMapMessage,
    RequestCreateMapMessage, RequestDeleteMapMessage, RequestDeleteVehicleMessage,
    RequestLoadMapMessage, RequestResourceFilesMessage, RequestSaveMapMessage,
    RequestStartObservationLogMessage, RequestStopObservationLogMessage,
};

use super::Console;

/// Parameters for assigning a vehicle to a map.
#[derive(Debug, Clone, Copy)]
pub struct VehicleAssignment {
    pub initial_pose: Pose2,
    pub allow_global_localization: bool,
    pub use_localization_trimmer: bool,
}

impl Console {
    pub async fn create_map(&self, map_id: &str, use_overlapping_trimmer: bool) {
        self.connection()
            .send(OutboundMessage::RequestCreateMap(RequestCreateMapMessage {
                map_id: map_id.to_string(),
                use_overlapping_trimmer,
            }))
            .await;
    }

    pub async fn delete_map(&self, map_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestDeleteMap(RequestDeleteMapMessage {
                map_id: map_id.to_string(),
            }))
            .await;
    }

    /// Saving unassigns all vehicles from the map server-side.
    pub async fn save_map(&self, map_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestSaveMap(RequestSaveMapMessage {
                map_id: map_id.to_string(),
            }))
            .await;
    }

    pub async fn load_map(
        &self,
        map_id: &str,
        map_file_name: &str,
        is_frozen: bool,
        use_overlapping_trimmer: bool,
    ) {
        self.connection()
            .send(OutboundMessage::RequestLoadMap(RequestLoadMapMessage {
                map_id: map_id.to_string(),
                map_file_name: map_file_name.to_string(),
                is_frozen,
                use_overlapping_trimmer,
            }))
            .await;
    }

    /// Refresh the server's list of loadable map files; the reply arrives as
    /// a `ResourceFilesMessage`.
    pub async fn request_resource_files(&self) {
        self.connection()
            .send(OutboundMessage::RequestResourceFiles(
                RequestResourceFilesMessage::default(),
            ))
            .await;
    }

    pub async fn assign_vehicle_to_map(
        &self,
        vehicle_id: &str,
        map_id: &str,
        assignment: VehicleAssignment,
    ) {
        self.connection()
            .send(OutboundMessage::RequestAssignVehicleToMap(
                RequestAssignVehicleToMapMessage {
                    vehicle_id: vehicle_id.to_string(),
                    map_id: map_id.to_string(),
                    initial_pose: Some(assignment.initial_pose),
                    allow_global_localization: Some(assignment.allow_global_localization),
                    use_localization_trimmer: Some(assignment.use_localization_trimmer),
                },
            ))
            .await;
    }

    /// An empty map id with no assignment parameters unassigns the vehicle.
    pub async fn unassign_vehicle(&self, vehicle_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestAssignVehicleToMap(
                RequestAssignVehicleToMapMessage {
                    vehicle_id: vehicle_id.to_string(),
                    map_id: String::new(),
                    initial_pose: None,
                    allow_global_localization: None,
                    use_localization_trimmer: None,
                },
            ))
            .await;
    }

    pub async fn delete_vehicle(&self, vehicle_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestDeleteVehicle(
                RequestDeleteVehicleMessage {
                    vehicle_id: vehicle_id.to_string(),
                },
            ))
            .await;
    }

    pub async fn start_observation_log(&self, vehicle_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestStartObservationLog(
                RequestStartObservationLogMessage {
                    vehicle_id: vehicle_id.to_string(),
                },
            ))
            .await;
    }

    pub async fn stop_observation_log(&self, vehicle_id: &str) {
        self.connection()
            .send(OutboundMessage::RequestStopObservationLog(
                RequestStopObservationLogMessage {
                    vehicle_id: vehicle_id.to_string(),
                },
            ))
            .await;
    }

    pub async fn invoke_capability(&self, vehicle_id: &str, capability: &str, input: &str) {
        self.connection()
            .send(OutboundMessage::InvokeCapability(InvokeCapabilityMessage {
                vehicle_id: vehicle_id.to_string(),
                capability: capability.to_string(),
                input: input.to_string(),
            }))
            .await;
    }
}
