use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use roomsync::{AssetId, EntityDescriptor, RemoteEntityId};

use crate::assets::AssetGate;
use crate::config::SpawnOrder;
use crate::error::SyncError;
use crate::host::{BuildError, EntityFactory, LocalEntityHandle, Scene};
use crate::registry::EntityRegistry;

#[derive(Debug, Clone)]
pub struct PendingCreation {
    pub descriptor: EntityDescriptor,
    pub required_assets: Vec<AssetId>,
    pub queued_at: Instant,
}

impl PendingCreation {
    pub fn new(descriptor: EntityDescriptor, queued_at: Instant) -> Self {
        let required_assets = descriptor.required_assets();
        Self {
            descriptor,
            required_assets,
            queued_at,
        }
    }

    pub fn id(&self) -> &RemoteEntityId {
        &self.descriptor.id
    }

    pub fn requires(&self, asset: &AssetId) -> bool {
        self.required_assets.contains(asset)
    }

    fn is_realizable(&self, assets: &AssetGate, registry: &EntityRegistry) -> bool {
        self.required_assets.iter().all(|asset| assets.is_ready(asset))
            && self
                .descriptor
                .parent
                .as_ref()
                .is_none_or(|parent| registry.contains(parent))
    }

    pub fn blocker(&self, assets: &AssetGate, registry: &EntityRegistry) -> Option<SyncError> {
        if let Some(asset) = self.required_assets.iter().find(|a| !assets.is_ready(a)) {
            return Some(SyncError::AssetUnavailable {
                entity: self.id().clone(),
                asset: asset.clone(),
            });
        }
        match &self.descriptor.parent {
            Some(parent) if !registry.contains(parent) => {
                Some(SyncError::EntityNotFound(parent.clone()))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SpawnQueue {
    order: SpawnOrder,
    items: VecDeque<PendingCreation>,
    queued_ids: HashSet<RemoteEntityId>,
    gate_opened_at: Option<Instant>,
}

impl SpawnQueue {
    pub fn new(order: SpawnOrder) -> Self {
        Self {
            order,
            items: VecDeque::new(),
            queued_ids: HashSet::new(),
            gate_opened_at: None,
        }
    }

    pub fn enqueue(
        &mut self,
        creation: PendingCreation,
        registry: &EntityRegistry,
    ) -> Result<(), SyncError> {
        let mut seen = HashSet::new();
        for id in creation.descriptor.ids() {
            if registry.contains(id) || self.queued_ids.contains(id) || !seen.insert(id) {
                return Err(SyncError::DuplicateEntity(id.clone()));
            }
        }

        self.queued_ids.extend(creation.descriptor.ids().cloned());
        log::debug!(
            "queued creation of {} ({} nodes, {} assets)",
            creation.id(),
            creation.descriptor.node_count(),
            creation.required_assets.len()
        );
        self.items.push_back(creation);
        Ok(())
    }

    /// Removes the next creation that can be realized. Does nothing while any
    /// asset is still pending.
    pub fn take_next(
        &mut self,
        assets: &AssetGate,
        registry: &EntityRegistry,
    ) -> Option<PendingCreation> {
        if !assets.is_all_ready() {
            return None;
        }

        let index = match self.order {
            SpawnOrder::Fifo => self
                .items
                .iter()
                .position(|item| item.is_realizable(assets, registry)),
            SpawnOrder::Lifo => self
                .items
                .iter()
                .rposition(|item| item.is_realizable(assets, registry)),
        }?;

        let creation = self.items.remove(index)?;
        self.forget(&creation);
        Some(creation)
    }

    pub fn fail_dependents(&mut self, asset: &AssetId) -> Vec<PendingCreation> {
        self.extract(|item| item.requires(asset))
    }

    /// Removes creations that are still blocked after waiting longer than
    /// `ttl` with the gate open. Time spent behind a pending load does not
    /// count, and a zero `ttl` disables expiry.
    pub fn expire(
        &mut self,
        now: Instant,
        ttl: Duration,
        assets: &AssetGate,
        registry: &EntityRegistry,
    ) -> Vec<PendingCreation> {
        if !assets.is_all_ready() {
            self.gate_opened_at = None;
            return Vec::new();
        }
        let opened_at = *self.gate_opened_at.get_or_insert(now);
        if ttl.is_zero() {
            return Vec::new();
        }
        self.extract(|item| {
            let waiting_since = item.queued_at.max(opened_at);
            now.saturating_duration_since(waiting_since) > ttl
                && !item.is_realizable(assets, registry)
        })
    }

    fn extract(
        &mut self,
        mut predicate: impl FnMut(&PendingCreation) -> bool,
    ) -> Vec<PendingCreation> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for item in self.items.drain(..) {
            if predicate(&item) {
                removed.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.items = kept;

        for creation in &removed {
            for id in creation.descriptor.ids() {
                self.queued_ids.remove(id);
            }
        }
        removed
    }

    fn forget(&mut self, creation: &PendingCreation) {
        for id in creation.descriptor.ids() {
            self.queued_ids.remove(id);
        }
    }

    pub fn is_queued(&self, id: &RemoteEntityId) -> bool {
        self.queued_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.queued_ids.clear();
        self.gate_opened_at = None;
    }

    pub fn drain_one(
        &mut self,
        assets: &AssetGate,
        registry: &mut EntityRegistry,
        factory: &mut dyn EntityFactory,
        scene: &mut dyn Scene,
    ) -> Option<Result<Vec<RemoteEntityId>, SyncError>> {
        let creation = self.take_next(assets, registry)?;
        Some(realize(&creation, assets, registry, factory, scene))
    }
}

/// Builds a whole descriptor tree, parents before children. On any failure
/// every node built so far is unregistered and disposed again.
pub fn realize(
    creation: &PendingCreation,
    assets: &AssetGate,
    registry: &mut EntityRegistry,
    factory: &mut dyn EntityFactory,
    scene: &mut dyn Scene,
) -> Result<Vec<RemoteEntityId>, SyncError> {
    let mut built: Vec<(RemoteEntityId, LocalEntityHandle)> = Vec::new();

    for node in creation.descriptor.walk() {
        let descriptor = node.descriptor;
        let handle = match factory.build(descriptor, assets) {
            Ok(handle) => handle,
            Err(err) => {
                rollback(&built, registry, scene);
                return Err(build_error(&descriptor.id, err));
            }
        };

        let parent = node.parent.cloned();
        if let Err(err) = registry.register(descriptor.id.clone(), handle, &descriptor.name, parent)
        {
            // A handle already in use belongs to a live entity.
            if !matches!(err, SyncError::HandleInUse(_)) {
                scene.dispose(handle);
            }
            rollback(&built, registry, scene);
            return Err(err);
        }

        let parent_handle = node
            .parent
            .and_then(|parent| registry.lookup_by_remote(parent))
            .map(|entity| entity.local_handle);
        scene.attach(parent_handle, handle);
        built.push((descriptor.id.clone(), handle));
    }

    Ok(built.into_iter().map(|(id, _)| id).collect())
}

fn rollback(
    built: &[(RemoteEntityId, LocalEntityHandle)],
    registry: &mut EntityRegistry,
    scene: &mut dyn Scene,
) {
    for (id, handle) in built.iter().rev() {
        registry.remove(id);
        scene.dispose(*handle);
    }
}

fn build_error(entity: &RemoteEntityId, err: BuildError) -> SyncError {
    match err {
        BuildError::UnsupportedType(entity_type) => SyncError::UnsupportedType {
            entity: entity.clone(),
            entity_type,
        },
        BuildError::Other(source) => SyncError::Build {
            entity: entity.clone(),
            source,
        },
    }
}
