//! Wire types shared between a room server and its participants.

pub mod asset;
pub mod entity;
pub mod net;

pub use asset::{AssetId, AssetKind, AssetSource};
pub use entity::{EntityDescriptor, EntityModification, RemoteEntityId, Shape, Vector3};
pub use net::{ClientMessage, CodecError, MAX_FRAME_SIZE, ServerMessage};
