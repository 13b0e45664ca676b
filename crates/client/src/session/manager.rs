use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use roomsync::RemoteEntityId;

use crate::config::SyncConfig;
use crate::engine::{self, Command, Engine, SessionStats};
use crate::error::SyncError;
use crate::host::{Host, LocalEntityHandle};
use crate::interaction::PointerButtons;
use crate::registry::EntityRef;
use crate::transport::{JoinRequest, Joined, Transport};

struct ActiveSession {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<Host>,
    generation: u64,
}

/// Owns the connection to a room across joins.
pub struct SessionManager<T: Transport> {
    transport: T,
    config: SyncConfig,
    host: Option<Host>,
    active: Option<ActiveSession>,
    generation: u64,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(transport: T, host: Host, config: SyncConfig) -> Self {
        Self {
            transport,
            config,
            host: Some(host),
            active: None,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_joined(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    pub async fn join(&mut self, request: &JoinRequest) -> Result<u64, SyncError> {
        self.leave().await;
        if self.host.is_none() {
            return Err(SyncError::EngineStopped);
        }

        let Joined { session, inbound } = self.transport.join(request).await?;
        let Some(host) = self.host.take() else {
            return Err(SyncError::EngineStopped);
        };

        self.generation += 1;
        let generation = self.generation;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Engine::new(session, host, self.config.clone(), generation, events_tx);
        let task = tokio::spawn(engine::run(engine, inbound, commands_rx, events_rx));

        log::info!(
            "joined as {} on {} (generation {generation})",
            request.display_name,
            request.device
        );
        self.active = Some(ActiveSession {
            commands: commands_tx,
            task,
            generation,
        });
        Ok(generation)
    }

    pub async fn leave(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        let _ = active.commands.send(Command::Leave);
        match active.task.await {
            Ok(host) => self.host = Some(host),
            Err(e) => log::error!("session generation {} was lost: {e}", active.generation),
        }
        true
    }

    pub fn update_hover(&self, target: Option<LocalEntityHandle>) -> Result<(), SyncError> {
        self.command(Command::Hover(target))
    }

    pub fn report_click(&self, buttons: PointerButtons) -> Result<(), SyncError> {
        self.command(Command::Click(buttons))
    }

    pub async fn entity(&self, id: &RemoteEntityId) -> Result<Option<EntityRef>, SyncError> {
        self.query(|reply| Command::Entity(id.clone(), reply)).await
    }

    pub async fn stats(&self) -> Result<SessionStats, SyncError> {
        self.query(Command::Stats).await
    }

    /// Waits until no registered asset is still loading. `false` if the
    /// session ended first.
    pub async fn assets_ready(&self) -> Result<bool, SyncError> {
        let signal = self.query(Command::ReadySignal).await?;
        Ok(signal.wait().await)
    }

    fn command(&self, command: Command) -> Result<(), SyncError> {
        let active = self.active.as_ref().ok_or(SyncError::NotJoined)?;
        active
            .commands
            .send(command)
            .map_err(|_| SyncError::EngineStopped)
    }

    async fn query<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(command(reply_tx))?;
        reply_rx.await.map_err(|_| SyncError::EngineStopped)
    }
}
