use std::collections::HashMap;

use roomsync::RemoteEntityId;

use crate::error::SyncError;
use crate::host::LocalEntityHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub remote_id: RemoteEntityId,
    pub local_handle: LocalEntityHandle,
    pub display_name: String,
    pub parent: Option<RemoteEntityId>,
}

/// Identity map between remote entities and the local nodes mirroring them.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    by_remote: HashMap<RemoteEntityId, EntityRef>,
    by_local: HashMap<LocalEntityHandle, RemoteEntityId>,
    children: HashMap<RemoteEntityId, Vec<RemoteEntityId>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        remote_id: RemoteEntityId,
        local_handle: LocalEntityHandle,
        display_name: impl Into<String>,
        parent: Option<RemoteEntityId>,
    ) -> Result<EntityRef, SyncError> {
        if self.by_remote.contains_key(&remote_id) {
            return Err(SyncError::DuplicateEntity(remote_id));
        }
        if self.by_local.contains_key(&local_handle) {
            return Err(SyncError::HandleInUse(local_handle));
        }
        if let Some(parent_id) = &parent {
            if !self.by_remote.contains_key(parent_id) {
                return Err(SyncError::EntityNotFound(parent_id.clone()));
            }
            self.children
                .entry(parent_id.clone())
                .or_default()
                .push(remote_id.clone());
        }

        let entity = EntityRef {
            remote_id: remote_id.clone(),
            local_handle,
            display_name: display_name.into(),
            parent,
        };
        self.by_local.insert(local_handle, remote_id.clone());
        self.by_remote.insert(remote_id, entity.clone());

        Ok(entity)
    }

    pub fn lookup_by_remote(&self, remote_id: &RemoteEntityId) -> Option<&EntityRef> {
        self.by_remote.get(remote_id)
    }

    pub fn lookup_by_local(&self, local_handle: LocalEntityHandle) -> Option<&EntityRef> {
        self.by_local
            .get(&local_handle)
            .and_then(|remote_id| self.by_remote.get(remote_id))
    }

    pub fn contains(&self, remote_id: &RemoteEntityId) -> bool {
        self.by_remote.contains_key(remote_id)
    }

    /// Removes one entity. Children that are still registered lose their parent.
    pub fn remove(&mut self, remote_id: &RemoteEntityId) -> Option<EntityRef> {
        let entity = self.by_remote.remove(remote_id)?;
        self.by_local.remove(&entity.local_handle);

        if let Some(parent_id) = &entity.parent {
            if let Some(siblings) = self.children.get_mut(parent_id) {
                siblings.retain(|id| id != remote_id);
                if siblings.is_empty() {
                    self.children.remove(parent_id);
                }
            }
        }

        for child_id in self.children.remove(remote_id).unwrap_or_default() {
            if let Some(child) = self.by_remote.get_mut(&child_id) {
                child.parent = None;
            }
        }

        Some(entity)
    }

    pub fn remove_subtree(&mut self, remote_id: &RemoteEntityId) -> Vec<EntityRef> {
        self.subtree(remote_id)
            .into_iter()
            .filter_map(|id| self.remove(&id))
            .collect()
    }

    pub fn subtree(&self, remote_id: &RemoteEntityId) -> Vec<RemoteEntityId> {
        if !self.contains(remote_id) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut stack = vec![(remote_id.clone(), false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id.clone(), true));
            if let Some(children) = self.children.get(&id) {
                for child in children.iter().rev() {
                    stack.push((child.clone(), false));
                }
            }
        }
        order
    }

    pub fn drain(&mut self) -> Vec<EntityRef> {
        let mut roots: Vec<RemoteEntityId> = self
            .by_remote
            .values()
            .filter(|entity| entity.parent.is_none())
            .map(|entity| entity.remote_id.clone())
            .collect();
        roots.sort();

        let mut drained = Vec::with_capacity(self.by_remote.len());
        for root in roots {
            drained.extend(self.remove_subtree(&root));
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.by_remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_remote.is_empty()
    }

    #[cfg(test)]
    fn assert_inverse(&self) {
        assert_eq!(self.by_remote.len(), self.by_local.len());
        for (remote_id, entity) in &self.by_remote {
            assert_eq!(&entity.remote_id, remote_id);
            assert_eq!(self.by_local.get(&entity.local_handle), Some(remote_id));
        }
        for (handle, remote_id) in &self.by_local {
            assert_eq!(
                self.by_remote.get(remote_id).map(|e| e.local_handle),
                Some(*handle)
            );
        }
    }
}
