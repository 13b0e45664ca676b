//! Collaborators the engine drives but does not own: the entity factory, the
//! scene the mirrored entities live in, the asset loader and the relay for
//! pass-through messages.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use glam::{Quat, Vec3};

use roomsync::{AssetId, AssetSource, EntityDescriptor};

use crate::assets::AssetGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalEntityHandle(pub u64);

impl fmt::Display for LocalEntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(pub String);

impl Locator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported entity type `{0}`")]
    UnsupportedType(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait EntityFactory: Send {
    /// Builds the node for a single descriptor. Children are built by separate
    /// calls; `descriptor.children` must be ignored here.
    fn build(
        &mut self,
        descriptor: &EntityDescriptor,
        assets: &AssetGate,
    ) -> Result<LocalEntityHandle, BuildError>;
}

pub trait Scene: Send {
    fn attach(&mut self, parent: Option<LocalEntityHandle>, child: LocalEntityHandle);

    /// Releases a node. Called once per entity, children before parents.
    fn dispose(&mut self, handle: LocalEntityHandle);

    fn set_visible(&mut self, handle: LocalEntityHandle, visible: bool);

    fn set_position(&mut self, handle: LocalEntityHandle, position: Vec3);

    fn set_scale(&mut self, handle: LocalEntityHandle, scale: Vec3);

    fn set_color(&mut self, handle: LocalEntityHandle, color: &str);

    fn set_rotation(&mut self, handle: LocalEntityHandle, rotation: Quat);

    fn world_position(&self, handle: LocalEntityHandle) -> Option<Vec3>;

    /// World position of the local participant's point of view.
    fn viewpoint(&self) -> Vec3;
}

pub trait Relay: Send {
    fn play_sound(&mut self, sound_id: &str);

    fn broadcast_chat(&mut self, message: &str);
}

pub type LoadFuture = Pin<Box<dyn Future<Output = anyhow::Result<Locator>> + Send + 'static>>;

pub trait AssetLoader: Send + Sync {
    fn resolve(&self, id: &AssetId, source: &AssetSource) -> LoadFuture;
}

pub struct Host {
    pub factory: Box<dyn EntityFactory>,
    pub scene: Box<dyn Scene>,
    pub relay: Box<dyn Relay>,
    pub loader: Arc<dyn AssetLoader>,
}

impl Host {
    pub fn new(
        factory: impl EntityFactory + 'static,
        scene: impl Scene + 'static,
        relay: impl Relay + 'static,
        loader: impl AssetLoader + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            scene: Box::new(scene),
            relay: Box::new(relay),
            loader: Arc::new(loader),
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
