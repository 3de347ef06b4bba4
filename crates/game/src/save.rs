//! Save data and its binary codec.

use glam::{Quat, Vec3};
use hopper_physics::{PhysicsError, PlatformSaveState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from encoding, decoding or applying save data.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("{0} trailing bytes after save data")]
    TrailingBytes(usize),

    #[error("save data does not fit this level: {0}")]
    Rejected(#[from] PhysicsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerSaveState {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Everything persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    pub player: PlayerSaveState,
    pub platforms: Vec<PlatformSaveState>,
}

/// Encode save data to bytes.
pub fn encode(data: &SaveData) -> Result<Vec<u8>, SaveError> {
    Ok(bincode::serde::encode_to_vec(data, bincode::config::standard())?)
}

/// Decode save data from bytes. The whole buffer must be consumed.
pub fn decode(bytes: &[u8]) -> Result<SaveData, SaveError> {
    let (data, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    if read != bytes.len() {
        return Err(SaveError::TrailingBytes(bytes.len() - read));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopper_physics::platform::PlatformTraversalState;
    use hopper_physics::PlatformId;

    fn sample() -> SaveData {
        SaveData {
            player: PlayerSaveState {
                position: Vec3::new(1.5, 2.0, -3.25),
                rotation: Quat::from_rotation_y(0.75),
            },
            platforms: vec![PlatformSaveState {
                platform: PlatformId(0),
                position: Vec3::new(0.0, 1.25, 4.0),
                traversal: PlatformTraversalState {
                    current_index: 1,
                    next_index: 0,
                    travel_direction: -1,
                    is_idling: false,
                    move_elapsed_us: 1_250_000,
                    idle_elapsed_us: 500_000,
                },
                transition_progress: 0.625,
            }],
        }
    }

    #[test]
    fn roundtrip_save() {
        let data = sample();

        let encoded = encode(&data).unwrap();
        let decoded = decode(&encoded).unwrap();

        assert_eq!(decoded, data);
    }

    #[test]
    fn truncated_data_fails() {
        let encoded = encode(&sample()).unwrap();

        let result = decode(&encoded[..encoded.len() / 2]);

        assert!(matches!(result, Err(SaveError::Decode(_))), "{result:?}");
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut encoded = encode(&sample()).unwrap();
        encoded.extend_from_slice(&[0, 0]);

        assert!(matches!(decode(&encoded), Err(SaveError::TrailingBytes(2))));
    }
}
