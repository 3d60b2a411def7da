//! Frame codec: `"whisker.proto.<Name>"` + one `0x00` byte + JSON body.
//!
//! Pure functions of their input. The namespace prefix is fixed; only the
//! suffix selects the message type.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{InboundMessage, OutboundMessage};

pub const NAMESPACE: &str = "whisker.proto.";

const DELIMITER: u8 = 0;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame has no delimiter byte")]
    MissingDelimiter,
    #[error("frame name is not valid utf-8")]
    InvalidName,
    #[error("message name outside the wire namespace: {0}")]
    ForeignNamespace(String),
    #[error("unknown message type: {0}")]
    UnknownMessage(String),
    #[error("malformed {name} body: {source}")]
    MalformedBody {
        name: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to serialize {name} body: {source}")]
    BodySerialize {
        name: &'static str,
        source: serde_json::Error,
    },
}

pub fn encode(message: &OutboundMessage) -> Result<Vec<u8>, WireError> {
    let name = message.name();
    let body = match message {
        OutboundMessage::RequestMapData(m) => encode_body(name, m),
        OutboundMessage::RequestSubmapTextures(m) => encode_body(name, m),
        OutboundMessage::RequestVehiclePoses(m) => encode_body(name, m),
        OutboundMessage::RequestCreateMap(m) => encode_body(name, m),
        OutboundMessage::RequestDeleteMap(m) => encode_body(name, m),
        OutboundMessage::RequestSaveMap(m) => encode_body(name, m),
        OutboundMessage::RequestLoadMap(m) => encode_body(name, m),
        OutboundMessage::RequestResourceFiles(m) => encode_body(name, m),
        OutboundMessage::RequestAssignVehicleToMap(m) => encode_body(name, m),
        OutboundMessage::RequestDeleteVehicle(m) => encode_body(name, m),
        OutboundMessage::RequestStartObservationLog(m) => encode_body(name, m),
        OutboundMessage::RequestStopObservationLog(m) => encode_body(name, m),
        OutboundMessage::InvokeCapability(m) => encode_body(name, m),
    }?;

    let mut frame = Vec::with_capacity(NAMESPACE.len() + name.len() + 1 + body.len());
    frame.extend_from_slice(NAMESPACE.as_bytes());
    frame.extend_from_slice(name.as_bytes());
    frame.push(DELIMITER);
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode(frame: &[u8]) -> Result<InboundMessage, WireError> {
    let delimiter = frame
        .iter()
        .position(|&b| b == DELIMITER)
        .ok_or(WireError::MissingDelimiter)?;
    let name = std::str::from_utf8(&frame[..delimiter]).map_err(|_| WireError::InvalidName)?;
    let name = name
        .strip_prefix(NAMESPACE)
        .ok_or_else(|| WireError::ForeignNamespace(name.to_string()))?;
    let body = &frame[delimiter + 1..];

    match name {
        "ServerStateMessage" => {
            decode_body("ServerStateMessage", body).map(InboundMessage::ServerState)
        }
        "ResourceFilesMessage" => {
            decode_body("ResourceFilesMessage", body).map(InboundMessage::ResourceFiles)
        }
        "MapDataMessage" => decode_body("MapDataMessage", body).map(InboundMessage::MapData),
        "SubmapTextureMessage" => {
            decode_body("SubmapTextureMessage", body).map(InboundMessage::SubmapTexture)
        }
        "VehiclePosesMessage" => {
            decode_body("VehiclePosesMessage", body).map(InboundMessage::VehiclePoses)
        }
        other => Err(WireError::UnknownMessage(other.to_string())),
    }
}

fn encode_body<T: Serialize>(name: &'static str, message: &T) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(message).map_err(|source| WireError::BodySerialize { name, source })
}

fn decode_body<T: DeserializeOwned>(name: &'static str, body: &[u8]) -> Result<T, WireError> {
    serde_json::from_slice(body).map_err(|source| WireError::MalformedBody { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        MapDataMessage, Pose2, RequestMapDataMessage, RequestSubmapTexturesMessage, SubmapEntry,
        SubmapId, VehiclePose, VehiclePosesMessage,
    };

    #[test]
    fn encode_prefixes_name_and_delimiter() {
        let frame = encode(&OutboundMessage::RequestMapData(RequestMapDataMessage {
            map_id: "warehouse".into(),
            have_version: 7,
        }))
        .expect("encode");

        let expected_prefix = b"whisker.proto.RequestMapDataMessage\0";
        assert_eq!(&frame[..expected_prefix.len()], expected_prefix);

        let body: serde_json::Value =
            serde_json::from_slice(&frame[expected_prefix.len()..]).expect("body json");
        assert_eq!(body["mapId"], "warehouse");
        assert_eq!(body["haveVersion"], 7);
    }

    #[test]
    fn decode_map_data_frame() {
        let body = serde_json::json!({
            "mapId": "warehouse",
            "mapVersion": 3,
            "isNewMapVersion": true,
            "submaps": [
                {
                    "submapId": {"trajectoryId": 0, "index": 4},
                    "version": 12,
                    "globalPose": {"x": 1.5, "y": -2.0, "r": 0.25}
                }
            ]
        });
        let mut frame = b"whisker.proto.MapDataMessage\0".to_vec();
        frame.extend_from_slice(body.to_string().as_bytes());

        let decoded = decode(&frame).expect("decode");
        let InboundMessage::MapData(map_data) = decoded else {
            panic!("expected MapDataMessage, got {decoded:?}");
        };
        assert_eq!(
            map_data,
            MapDataMessage {
                map_id: "warehouse".into(),
                map_version: 3,
                is_new_map_version: true,
                submaps: vec![SubmapEntry {
                    submap_id: SubmapId::new(0, 4),
                    version: 12,
                    global_pose: Some(Pose2::new(1.5, -2.0, 0.25)),
                }],
            }
        );
    }

    #[test]
    fn frame_without_delimiter_is_rejected() {
        let err = decode(b"whisker.proto.MapDataMessage{}").unwrap_err();
        assert!(matches!(err, WireError::MissingDelimiter));
    }

    #[test]
    fn unknown_message_name_is_rejected() {
        let err = decode(b"whisker.proto.NoSuchMessage\0{}").unwrap_err();
        assert!(matches!(err, WireError::UnknownMessage(name) if name == "NoSuchMessage"));
    }

    #[test]
    fn foreign_namespace_is_rejected() {
        let err = decode(b"other.proto.MapDataMessage\0{}").unwrap_err();
        assert!(matches!(err, WireError::ForeignNamespace(_)));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = decode(b"whisker.proto.MapDataMessage\0not json").unwrap_err();
        assert!(matches!(
            err,
            WireError::MalformedBody {
                name: "MapDataMessage",
                ..
            }
        ));
    }

    #[test]
    fn vehicle_poses_round_trip_via_json_body() {
        let body = serde_json::json!({
            "mapId": "warehouse",
            "vehiclePoses": [
                {"vehicleId": "agv1", "pose": {"x": 0.5, "y": 0.25, "r": 1.0}}
            ]
        });
        let mut frame = b"whisker.proto.VehiclePosesMessage\0".to_vec();
        frame.extend_from_slice(body.to_string().as_bytes());

        let decoded = decode(&frame).expect("decode");
        assert_eq!(
            decoded,
            InboundMessage::VehiclePoses(VehiclePosesMessage {
                map_id: Some("warehouse".into()),
                vehicle_poses: vec![VehiclePose {
                    vehicle_id: "agv1".into(),
                    pose: Pose2::new(0.5, 0.25, 1.0),
                }],
            })
        );
    }

    #[test]
    fn unassign_omits_optional_assignment_fields() {
        use crate::protocol::RequestAssignVehicleToMapMessage;

        let frame = encode(&OutboundMessage::RequestAssignVehicleToMap(
            RequestAssignVehicleToMapMessage {
                vehicle_id: "agv1".into(),
                map_id: String::new(),
                initial_pose: None,
                allow_global_localization: None,
                use_localization_trimmer: None,
            },
        ))
        .expect("encode");

        let delimiter = frame.iter().position(|&b| b == 0).unwrap();
        assert_eq!(
            &frame[..delimiter],
            b"whisker.proto.RequestAssignVehicleToMapMessage"
        );
        let body: serde_json::Value = serde_json::from_slice(&frame[delimiter + 1..]).unwrap();
        assert_eq!(body["mapId"], "");
        assert!(body.get("initialPose").is_none());
        assert!(body.get("allowGlobalLocalization").is_none());
    }

    #[test]
    fn assignment_carries_pose_and_flags() {
        use crate::protocol::RequestAssignVehicleToMapMessage;

        let frame = encode(&OutboundMessage::RequestAssignVehicleToMap(
            RequestAssignVehicleToMapMessage {
                vehicle_id: "agv1".into(),
                map_id: "warehouse".into(),
                initial_pose: Some(Pose2::new(1.0, 2.0, 0.5)),
                allow_global_localization: Some(true),
                use_localization_trimmer: Some(false),
            },
        ))
        .expect("encode");

        let delimiter = frame.iter().position(|&b| b == 0).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&frame[delimiter + 1..]).unwrap();
        assert_eq!(body["initialPose"]["x"], 1.0);
        assert_eq!(body["allowGlobalLocalization"], true);
        assert_eq!(body["useLocalizationTrimmer"], false);
    }

    #[test]
    fn texture_request_lists_all_submap_ids() {
        let frame = encode(&OutboundMessage::RequestSubmapTextures(
            RequestSubmapTexturesMessage {
                map_id: "warehouse".into(),
                submap_ids: vec![SubmapId::new(0, 1), SubmapId::new(1, 3)],
            },
        ))
        .expect("encode");

        let delimiter = frame.iter().position(|&b| b == 0).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&frame[delimiter + 1..]).unwrap();
        assert_eq!(body["submapIds"].as_array().unwrap().len(), 2);
        assert_eq!(body["submapIds"][0]["trajectoryId"], 0);
        assert_eq!(body["submapIds"][1]["index"], 3);
    }
}
