use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::error::MessageError;
use crate::id::{NetworkEntityId, PlayerId};
use crate::snapshot::Pose;
use crate::state::{StateMap, StateValue};

pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x5445_5448;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    TransformUpdate,
    StateUpdate,
    FullStateSync,
    PlayerLeft,
    PlayerJoined,
    ClockSync,
}

/// Pose sample for one entity. Absent fields were not replicated.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct TransformUpdate {
    pub network_id: NetworkEntityId,
    pub timestamp: f64,
    pub position: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
    pub velocity: Option<[f32; 3]>,
}

impl TransformUpdate {
    pub fn new(network_id: NetworkEntityId, timestamp: f64) -> Self {
        Self {
            network_id,
            timestamp,
            position: None,
            rotation: None,
            scale: None,
            velocity: None,
        }
    }

    pub fn from_pose(network_id: NetworkEntityId, timestamp: f64, pose: &Pose) -> Self {
        Self {
            network_id,
            timestamp,
            position: pose.position.map(|v| v.to_array()),
            rotation: pose.rotation.map(Quat::to_array),
            scale: pose.scale.map(|v| v.to_array()),
            velocity: pose.velocity.map(|v| v.to_array()),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position.map(Vec3::from),
            rotation: self.rotation.map(|q| Quat::from_array(q).normalize()),
            scale: self.scale.map(Vec3::from),
            velocity: self.velocity.map(Vec3::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StateEntry {
    pub key: String,
    pub value: StateValue,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct StateUpdate {
    pub player_id: PlayerId,
    pub timestamp: f64,
    pub state: Vec<StateEntry>,
    /// Set when `state` is the sender's whole row.
    pub is_full: bool,
}

impl StateUpdate {
    pub fn single(player_id: PlayerId, timestamp: f64, key: &str, value: StateValue) -> Self {
        Self {
            player_id,
            timestamp,
            state: vec![StateEntry {
                key: key.to_string(),
                value,
            }],
            is_full: false,
        }
    }

    pub fn full(player_id: PlayerId, timestamp: f64, row: &StateMap) -> Self {
        Self {
            player_id,
            timestamp,
            state: entries(row),
            is_full: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct PlayerState {
    pub player_id: PlayerId,
    pub state: Vec<StateEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct FullStateSync {
    pub states: Vec<PlayerState>,
}

impl FullStateSync {
    pub fn from_table<'a>(rows: impl IntoIterator<Item = (PlayerId, &'a StateMap)>) -> Self {
        Self {
            states: rows
                .into_iter()
                .map(|(player_id, row)| PlayerState {
                    player_id,
                    state: entries(row),
                })
                .collect(),
        }
    }
}

fn entries(row: &BTreeMap<String, StateValue>) -> Vec<StateEntry> {
    row.iter()
        .map(|(key, value)| StateEntry {
            key: key.clone(),
            value: value.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Message {
    TransformUpdate(TransformUpdate),
    StateUpdate(StateUpdate),
    FullStateSync(FullStateSync),
    PlayerLeft {
        player_id: PlayerId,
    },
    PlayerJoined {
        player_id: PlayerId,
    },
    ClockSync {
        server_time_ms: f64,
        round_trip_ms: f64,
    },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::TransformUpdate(_) => MessageKind::TransformUpdate,
            Self::StateUpdate(_) => MessageKind::StateUpdate,
            Self::FullStateSync(_) => MessageKind::FullStateSync,
            Self::PlayerLeft { .. } => MessageKind::PlayerLeft,
            Self::PlayerJoined { .. } => MessageKind::PlayerJoined,
            Self::ClockSync { .. } => MessageKind::ClockSync,
        }
    }
}

/// Wire framing for one message.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Envelope {
    pub magic: u32,
    pub version: u32,
    pub sender: PlayerId,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender: PlayerId, message: Message) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sender,
            message,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(MessageError::Serialize)
    }

    pub fn decode(data: &[u8]) -> Result<Self, MessageError> {
        // Received buffers carry no alignment guarantee.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);

        let envelope = rkyv::from_bytes::<Self, rancor::Error>(&aligned)
            .map_err(MessageError::Deserialize)?;
        if !envelope.is_valid() {
            return Err(MessageError::InvalidEnvelope {
                magic: envelope.magic,
                version: envelope.version,
            });
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_update_carries_only_present_fields() {
        let pose = Pose::at(Vec3::new(1.0, 2.0, 3.0)).with_rotation(Quat::from_rotation_y(0.5));
        let update = TransformUpdate::from_pose(NetworkEntityId(7), 42.0, &pose);

        assert_eq!(update.position, Some([1.0, 2.0, 3.0]));
        assert!(update.scale.is_none());
        assert!(update.velocity.is_none());

        let decoded = update.pose();
        assert_eq!(decoded.position, pose.position);
        assert!(decoded.rotation.unwrap().dot(Quat::from_rotation_y(0.5)) > 0.99999);
        assert!(decoded.scale.is_none());
    }

    #[test]
    fn envelope_survives_the_wire() {
        let mut row = StateMap::new();
        row.insert("health".to_string(), StateValue::Int(100));
        row.insert("name".to_string(), StateValue::from("ana"));
        let message = Message::StateUpdate(StateUpdate::full(PlayerId(3), 12.5, &row));

        let bytes = Envelope::new(PlayerId(3), message.clone()).encode().unwrap();
        let envelope = Envelope::decode(&bytes).unwrap();

        assert_eq!(envelope.sender, PlayerId(3));
        assert_eq!(envelope.message, message);
        assert_eq!(envelope.message.kind(), MessageKind::StateUpdate);
    }

    #[test]
    fn foreign_envelope_rejected() {
        let mut envelope = Envelope::new(
            PlayerId(1),
            Message::PlayerLeft {
                player_id: PlayerId(2),
            },
        );
        envelope.magic = 0xDEAD_BEEF;
        let bytes = envelope.encode().unwrap();

        assert!(matches!(
            Envelope::decode(&bytes),
            Err(MessageError::InvalidEnvelope { magic: 0xDEAD_BEEF, .. })
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            Envelope::decode(&[1, 2, 3]),
            Err(MessageError::Deserialize(_))
        ));
    }
}
