use std::collections::HashSet;

use glam::Vec3;
use rkyv::{Archive, Deserialize, Serialize};

use crate::asset::AssetId;

use super::id::RemoteEntityId;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn one() -> Self {
        Self::ONE
    }
}

impl From<Vector3> for Vec3 {
    fn from(value: Vector3) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<Vec3> for Vector3 {
    fn from(value: Vec3) -> Self {
        Self::new(value.x, value.y, value.z)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Default,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct Shape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f32>,
}

/// Creation payload for one entity and, recursively, its children.
///
/// `assets` lists the asset ids the entity factory needs before this node can
/// be built. `parent` attaches the root of the tree under an entity that
/// already exists locally; children are always attached to the node that
/// contains them.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[rkyv(serialize_bounds(
    __S: rkyv::ser::Writer + rkyv::ser::Allocator,
    __S::Error: rkyv::rancor::Source,
))]
#[rkyv(deserialize_bounds(__D::Error: rkyv::rancor::Source))]
#[rkyv(bytecheck(
    bounds(
        __C: rkyv::validation::ArchiveContext,
        __C::Error: rkyv::rancor::Source,
    )
))]
#[serde(rename_all = "camelCase")]
pub struct EntityDescriptor {
    pub id: RemoteEntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub position: Vector3,
    #[serde(default)]
    pub rotation: Vector3,
    #[serde(default = "Vector3::one")]
    pub scale: Vector3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RemoteEntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[rkyv(omit_bounds)]
    pub children: Vec<EntityDescriptor>,
}

impl EntityDescriptor {
    pub fn new(id: impl Into<RemoteEntityId>, name: impl Into<String>, entity_type: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: entity_type.to_owned(),
            shape: Shape::default(),
            position: Vector3::ZERO,
            rotation: Vector3::ZERO,
            scale: Vector3::ONE,
            color: None,
            opacity: None,
            assets: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: EntityDescriptor) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_asset(mut self, asset: impl Into<AssetId>) -> Self {
        self.assets.push(asset.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<RemoteEntityId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![WalkNode {
                parent: self.parent.as_ref(),
                descriptor: self,
            }],
        }
    }

    pub fn required_assets(&self) -> Vec<AssetId> {
        let mut seen = HashSet::new();
        self.walk()
            .flat_map(|node| node.descriptor.assets.iter())
            .filter(|asset| seen.insert(*asset))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &RemoteEntityId> {
        self.walk().map(|node| &node.descriptor.id)
    }

    pub fn node_count(&self) -> usize {
        self.walk().count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WalkNode<'a> {
    /// The tree parent, or the descriptor's own `parent` for the root.
    pub parent: Option<&'a RemoteEntityId>,
    pub descriptor: &'a EntityDescriptor,
}

pub struct Walk<'a> {
    stack: Vec<WalkNode<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.descriptor.children.iter().rev() {
            self.stack.push(WalkNode {
                parent: Some(&node.descriptor.id),
                descriptor: child,
            });
        }
        Some(node)
    }
}
