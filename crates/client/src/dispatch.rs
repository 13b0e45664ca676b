use glam::Vec3;
use tokio::time::Instant;

use roomsync::{
    ClientMessage, EntityDescriptor, EntityModification, RemoteEntityId, ServerMessage,
};

use crate::engine::Engine;
use crate::error::SyncError;
use crate::host::LocalEntityHandle;
use crate::spawn::PendingCreation;
use crate::transport::Session;

impl<S: Session> Engine<S> {
    pub(crate) fn dispatch(&mut self, message: ServerMessage) -> Result<(), SyncError> {
        log::debug!("dispatching {}", message.kind());

        match message {
            ServerMessage::CreateEntity(descriptor) => self.create_entity(descriptor),
            ServerMessage::ModifyEntity(modification) => self.modify_entity(&modification),
            ServerMessage::DeleteEntity { id } => self.delete_entity(&id),
            ServerMessage::LookAt { id } => self.look_at(id),
            registration @ (ServerMessage::RegisterModel { .. }
            | ServerMessage::RegisterTexture { .. }
            | ServerMessage::RegisterSound { .. }) => self.register_asset(&registration),
            ServerMessage::PlaySound { sound_id } => {
                self.host.relay.play_sound(&sound_id);
                Ok(())
            }
            ServerMessage::SendMessage { message } => {
                self.host.relay.broadcast_chat(&message);
                Ok(())
            }
            ServerMessage::PlayerJoined {
                session_id,
                display_name,
            } => {
                log::info!("{display_name} joined the room");
                self.roster.join(session_id, display_name);
                Ok(())
            }
            ServerMessage::PlayerLeft { session_id } => {
                if let Some(player) = self.roster.leave(&session_id) {
                    log::info!("{} left the room", player.display_name);
                }
                Ok(())
            }
        }
    }

    fn create_entity(&mut self, descriptor: EntityDescriptor) -> Result<(), SyncError> {
        let creation = PendingCreation::new(descriptor, Instant::now());
        if let Some(asset) = creation
            .required_assets
            .iter()
            .find(|asset| self.assets.is_failed(asset))
        {
            return Err(SyncError::AssetUnavailable {
                entity: creation.id().clone(),
                asset: asset.clone(),
            });
        }

        self.spawn_queue.enqueue(creation, &self.registry)
    }

    fn modify_entity(&mut self, modification: &EntityModification) -> Result<(), SyncError> {
        let handle = self.local_handle(&modification.id)?;
        let scene = &mut self.host.scene;

        if let Some(visible) = modification.visible {
            scene.set_visible(handle, visible);
        }
        if let Some(position) = modification.position {
            scene.set_position(handle, position.into());
        }
        if let Some(scale) = modification.scale {
            scene.set_scale(handle, Vec3::splat(scale));
        }
        if let Some(color) = &modification.color {
            scene.set_color(handle, color);
        }
        Ok(())
    }

    fn delete_entity(&mut self, id: &RemoteEntityId) -> Result<(), SyncError> {
        if !self.registry.contains(id) {
            return Err(SyncError::EntityNotFound(id.clone()));
        }

        for entity in self.registry.remove_subtree(id) {
            self.timers.unbind_look_at(&entity.remote_id);
            self.interaction.forget(entity.local_handle);
            self.host.scene.dispose(entity.local_handle);
            log::debug!("destroyed entity {}", entity.remote_id);
            self.send(ClientMessage::EntityDestroyed {
                id: entity.remote_id,
            });
        }
        Ok(())
    }

    fn look_at(&mut self, id: RemoteEntityId) -> Result<(), SyncError> {
        self.local_handle(&id)?;
        self.timers.bind_look_at(id, self.config.look_at_interval())
    }

    fn register_asset(&mut self, registration: &ServerMessage) -> Result<(), SyncError> {
        let Some((id, source)) = registration.asset_registration() else {
            return Ok(());
        };

        let load = self
            .assets
            .register_pending(id.clone(), &source, self.host.loader.as_ref())?;
        log::debug!("loading {} asset {id} from {}", source.kind().as_str(), source.location());
        self.timers.spawn_load(self.generation, id, load);
        Ok(())
    }

    fn local_handle(&self, id: &RemoteEntityId) -> Result<LocalEntityHandle, SyncError> {
        self.registry
            .lookup_by_remote(id)
            .map(|entity| entity.local_handle)
            .ok_or_else(|| SyncError::EntityNotFound(id.clone()))
    }
}
