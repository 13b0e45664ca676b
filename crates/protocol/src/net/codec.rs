use rkyv::rancor;
use rkyv::util::AlignedVec;

use super::protocol::{ClientMessage, ServerMessage};

pub const MAX_FRAME_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    Oversized(usize),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

fn check_size(len: usize) -> Result<(), CodecError> {
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::Oversized(len));
    }
    Ok(())
}

// Frames may arrive in buffers of any alignment.
fn aligned(data: &[u8]) -> AlignedVec {
    let mut buffer = AlignedVec::with_capacity(data.len());
    buffer.extend_from_slice(data);
    buffer
}

impl ServerMessage {
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(CodecError::Serialize)?;
        check_size(bytes.len())?;
        Ok(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        check_size(data.len())?;
        rkyv::from_bytes::<Self, rancor::Error>(&aligned(data)).map_err(CodecError::Deserialize)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ClientMessage {
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(CodecError::Serialize)?;
        check_size(bytes.len())?;
        Ok(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        check_size(data.len())?;
        rkyv::from_bytes::<Self, rancor::Error>(&aligned(data)).map_err(CodecError::Deserialize)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}
