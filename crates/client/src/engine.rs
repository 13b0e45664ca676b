use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use roomsync::{AssetId, ClientMessage, RemoteEntityId, ServerMessage};

use crate::assets::{AssetGate, ReadySignal};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::host::{Host, LocalEntityHandle, Locator};
use crate::interaction::{InteractionReporter, PointerButtons};
use crate::orient::look_rotation;
use crate::registry::{EntityRef, EntityRegistry};
use crate::roster::Roster;
use crate::session::timers::Timers;
use crate::spawn::SpawnQueue;
use crate::transport::Session;

#[derive(Debug)]
pub(crate) enum EngineEvent {
    SpawnTick,
    Heartbeat,
    LookAtTick(RemoteEntityId),
    AssetSettled {
        generation: u64,
        id: AssetId,
        result: Result<Locator, String>,
    },
}

#[derive(Debug)]
pub(crate) enum Command {
    Hover(Option<LocalEntityHandle>),
    Click(PointerButtons),
    Entity(RemoteEntityId, oneshot::Sender<Option<EntityRef>>),
    Stats(oneshot::Sender<SessionStats>),
    ReadySignal(oneshot::Sender<ReadySignal>),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub generation: u64,
    pub entities: usize,
    pub queued_creations: usize,
    pub pending_assets: usize,
    pub look_at_bindings: usize,
    pub players: usize,
}

/// All mutable state of one joined session. Owned by a single task; see
/// [`run`].
pub(crate) struct Engine<S: Session> {
    pub(crate) session: S,
    pub(crate) host: Host,
    pub(crate) config: SyncConfig,
    pub(crate) generation: u64,
    pub(crate) registry: EntityRegistry,
    pub(crate) assets: AssetGate,
    pub(crate) spawn_queue: SpawnQueue,
    pub(crate) interaction: InteractionReporter,
    pub(crate) roster: Roster,
    pub(crate) timers: Timers,
}

impl<S: Session> Engine<S> {
    pub(crate) fn new(
        session: S,
        host: Host,
        config: SyncConfig,
        generation: u64,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            session,
            host,
            generation,
            registry: EntityRegistry::new(),
            assets: AssetGate::new(),
            spawn_queue: SpawnQueue::new(config.spawn_order),
            interaction: InteractionReporter::new(config.click_debounce()),
            roster: Roster::new(),
            timers: Timers::new(events),
            config,
        }
    }

    pub(crate) fn send(&mut self, message: ClientMessage) {
        let kind = message.kind();
        if let Err(e) = self.session.send(message) {
            log::warn!("failed to send {kind}: {e}");
        }
    }

    pub(crate) fn handle_command(&mut self, command: Command) {
        match command {
            Command::Hover(target) => {
                for message in self.interaction.update_hover(target, &self.registry) {
                    self.send(message);
                }
            }
            Command::Click(buttons) => {
                if let Some(message) =
                    self.interaction
                        .report_click(buttons, Instant::now(), &self.registry)
                {
                    self.send(message);
                }
            }
            Command::Entity(id, reply) => {
                let _ = reply.send(self.registry.lookup_by_remote(&id).cloned());
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            Command::ReadySignal(reply) => {
                let _ = reply.send(self.assets.ready_signal(self.config.asset_poll_interval()));
            }
            Command::Leave => {}
        }
    }

    pub(crate) fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SpawnTick => self.spawn_tick(),
            EngineEvent::Heartbeat => self.heartbeat(),
            EngineEvent::LookAtTick(id) => self.look_at_tick(&id),
            EngineEvent::AssetSettled {
                generation,
                id,
                result,
            } => self.asset_settled(generation, id, result),
        }
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            generation: self.generation,
            entities: self.registry.len(),
            queued_creations: self.spawn_queue.len(),
            pending_assets: self.assets.pending_count(),
            look_at_bindings: self.timers.look_at_count(),
            players: self.roster.len(),
        }
    }

    fn spawn_tick(&mut self) {
        let expired = self.spawn_queue.expire(
            Instant::now(),
            self.config.pending_creation_ttl(),
            &self.assets,
            &self.registry,
        );
        for creation in expired {
            match creation.blocker(&self.assets, &self.registry) {
                Some(reason) => log::error!("gave up on creating {}: {reason}", creation.id()),
                None => log::error!("gave up on creating {}", creation.id()),
            }
        }

        let Host { factory, scene, .. } = &mut self.host;
        let drained = self.spawn_queue.drain_one(
            &self.assets,
            &mut self.registry,
            &mut **factory,
            &mut **scene,
        );
        match drained {
            None => {}
            Some(Ok(created)) => {
                for id in created {
                    log::debug!("created entity {id}");
                    self.send(ClientMessage::EntityCreated { id });
                }
            }
            Some(Err(e)) => log::error!("entity creation failed: {e}"),
        }
    }

    fn heartbeat(&mut self) {
        let position = self.host.scene.viewpoint();
        if let Some(message) = self.interaction.report_position(position) {
            self.send(message);
        }
    }

    fn look_at_tick(&mut self, id: &RemoteEntityId) {
        let Some(handle) = self.registry.lookup_by_remote(id).map(|e| e.local_handle) else {
            self.timers.unbind_look_at(id);
            return;
        };

        let scene = &mut self.host.scene;
        let Some(position) = scene.world_position(handle) else {
            return;
        };
        if let Some(rotation) = look_rotation(position, scene.viewpoint()) {
            scene.set_rotation(handle, rotation);
        }
    }

    fn asset_settled(&mut self, generation: u64, id: AssetId, result: Result<Locator, String>) {
        if generation != self.generation {
            log::debug!(
                "ignoring asset {id} from generation {generation} (current {})",
                self.generation
            );
            return;
        }

        match result {
            Ok(locator) => {
                if self.assets.mark_ready(&id, locator) {
                    log::debug!("asset {id} ready, {} pending", self.assets.pending_count());
                }
            }
            Err(reason) => {
                if !self.assets.mark_failed(&id, reason.as_str()) {
                    return;
                }
                log::warn!("asset {id} failed to load: {reason}");
                for creation in self.spawn_queue.fail_dependents(&id) {
                    let err = SyncError::AssetUnavailable {
                        entity: creation.id().clone(),
                        asset: id.clone(),
                    };
                    log::error!("{err}");
                }
            }
        }
    }

    /// Stops every timer and load, disposes every mirrored entity and closes
    /// the session. Returns the collaborators for the next join.
    pub(crate) fn teardown(mut self) -> Host {
        self.timers.cancel_all();
        let entities = self.registry.drain();
        for entity in &entities {
            self.host.scene.dispose(entity.local_handle);
        }
        self.spawn_queue.clear();
        self.roster.clear();
        self.session.close();

        log::info!(
            "left session generation {} ({} entities disposed)",
            self.generation,
            entities.len()
        );
        self.host
    }

    pub(crate) fn handle_message(&mut self, message: ServerMessage) {
        let kind = message.kind();
        if let Err(err) = self.dispatch(message) {
            if err.is_protocol_violation() {
                log::warn!("dropping {kind}: {err}");
            } else {
                log::error!("{kind} failed: {err}");
            }
        }
    }
}

/// Engine task body: one message, event or command at a time until the
/// handle asks to leave, drops, or the room closes the inbound stream.
pub(crate) async fn run<S: Session>(
    mut engine: Engine<S>,
    mut inbound: mpsc::UnboundedReceiver<ServerMessage>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) -> Host {
    engine.timers.start(&engine.config);

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Leave) | None => break,
                Some(command) => engine.handle_command(command),
            },
            message = inbound.recv() => match message {
                Some(message) => engine.handle_message(message),
                None => {
                    log::info!("room closed session generation {}", engine.generation);
                    break;
                }
            },
            Some(event) = events.recv() => engine.handle_event(event),
        }
    }

    engine.teardown()
}
