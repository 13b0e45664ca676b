use roomsync::{AssetId, RemoteEntityId};

use crate::host::LocalEntityHandle;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("entity {0} already exists")]
    DuplicateEntity(RemoteEntityId),
    #[error("entity {0} not found")]
    EntityNotFound(RemoteEntityId),
    #[error("entity {0} is already looking at the viewpoint")]
    AlreadyBound(RemoteEntityId),
    #[error("entity {entity} cannot be created: asset {asset} is unavailable")]
    AssetUnavailable {
        entity: RemoteEntityId,
        asset: AssetId,
    },
    #[error("entity {entity} has unsupported type `{entity_type}`")]
    UnsupportedType {
        entity: RemoteEntityId,
        entity_type: String,
    },
    #[error("entity {entity} could not be built")]
    Build {
        entity: RemoteEntityId,
        #[source]
        source: anyhow::Error,
    },
    #[error("local handle {0:?} is already mapped")]
    HandleInUse(LocalEntityHandle),
    #[error("asset {0} is already registered")]
    DuplicateAsset(AssetId),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("not joined to a session")]
    NotJoined,
    #[error("session engine stopped")]
    EngineStopped,
}

impl SyncError {
    /// Errors caused by a single out-of-order or duplicated message. These are
    /// dropped without affecting the rest of the session.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            SyncError::DuplicateEntity(_)
                | SyncError::EntityNotFound(_)
                | SyncError::AlreadyBound(_)
                | SyncError::DuplicateAsset(_)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("room rejected join: {0}")]
    Rejected(String),
    #[error("connection closed")]
    Closed,
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
