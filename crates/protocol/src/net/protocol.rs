use rkyv::{Archive, Deserialize, Serialize};

use crate::asset::{AssetId, AssetSource};
use crate::entity::{EntityDescriptor, EntityModification, RemoteEntityId, Vector3};

#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    CreateEntity(EntityDescriptor),
    ModifyEntity(EntityModification),
    DeleteEntity {
        id: RemoteEntityId,
    },
    LookAt {
        id: RemoteEntityId,
    },
    RegisterModel {
        id: AssetId,
        url: String,
    },
    RegisterTexture {
        id: AssetId,
        src: String,
        version: u32,
        content_type: String,
    },
    RegisterSound {
        id: AssetId,
        url: String,
    },
    PlaySound {
        sound_id: String,
    },
    SendMessage {
        message: String,
    },
    PlayerJoined {
        session_id: String,
        display_name: String,
    },
    PlayerLeft {
        session_id: String,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateEntity(_) => "createEntity",
            Self::ModifyEntity(_) => "modifyEntity",
            Self::DeleteEntity { .. } => "deleteEntity",
            Self::LookAt { .. } => "lookAt",
            Self::RegisterModel { .. } => "registerModel",
            Self::RegisterTexture { .. } => "registerTexture",
            Self::RegisterSound { .. } => "registerSound",
            Self::PlaySound { .. } => "playSound",
            Self::SendMessage { .. } => "sendMessage",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
        }
    }

    /// Splits an asset registration into the asset id and where to load it from.
    pub fn asset_registration(&self) -> Option<(AssetId, AssetSource)> {
        match self {
            Self::RegisterModel { id, url } => {
                Some((id.clone(), AssetSource::Model { url: url.clone() }))
            }
            Self::RegisterTexture {
                id,
                src,
                version,
                content_type,
            } => Some((
                id.clone(),
                AssetSource::Texture {
                    src: src.clone(),
                    version: *version,
                    content_type: content_type.clone(),
                },
            )),
            Self::RegisterSound { id, url } => {
                Some((id.clone(), AssetSource::Audio { url: url.clone() }))
            }
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[rkyv(derive(Debug))]
#[serde(tag = "kind", content = "payload", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "onEntityCreated")]
    EntityCreated { id: RemoteEntityId },
    #[serde(rename = "onEntityDestroyed")]
    EntityDestroyed { id: RemoteEntityId },
    #[serde(rename = "onEntityHoverEntered")]
    HoverEntered { id: RemoteEntityId },
    #[serde(rename = "onEntityHoverExit")]
    HoverExit { id: RemoteEntityId },
    #[serde(rename = "onEntityClicked")]
    Clicked {
        id: RemoteEntityId,
        is_left: bool,
        is_right: bool,
    },
    #[serde(rename = "updatePosition")]
    UpdatePosition(Vector3),
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EntityCreated { .. } => "onEntityCreated",
            Self::EntityDestroyed { .. } => "onEntityDestroyed",
            Self::HoverEntered { .. } => "onEntityHoverEntered",
            Self::HoverExit { .. } => "onEntityHoverExit",
            Self::Clicked { .. } => "onEntityClicked",
            Self::UpdatePosition(_) => "updatePosition",
        }
    }
}
