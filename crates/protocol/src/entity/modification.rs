use rkyv::{Archive, Deserialize, Serialize};

use super::descriptor::Vector3;
use super::id::RemoteEntityId;

/// Field-level delta for an existing entity. Absent fields are left untouched.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
#[serde(rename_all = "camelCase")]
pub struct EntityModification {
    pub id: RemoteEntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl EntityModification {
    pub fn new(id: impl Into<RemoteEntityId>) -> Self {
        Self {
            id: id.into(),
            visible: None,
            position: None,
            scale: None,
            color: None,
        }
    }
}
