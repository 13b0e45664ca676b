use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use roomsync::{AssetId, RemoteEntityId};

use crate::config::SyncConfig;
use crate::engine::EngineEvent;
use crate::error::SyncError;
use crate::host::LoadFuture;

#[derive(Debug)]
pub(crate) struct LookAtBinding {
    pub(crate) remote_id: RemoteEntityId,
    task: JoinHandle<()>,
}

/// Every periodic task and in-flight load started for one session. Tasks only
/// post [`EngineEvent`]s; nothing here touches engine state.
#[derive(Debug)]
pub(crate) struct Timers {
    events: mpsc::UnboundedSender<EngineEvent>,
    spawn_tick: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    look_ats: HashMap<RemoteEntityId, LookAtBinding>,
    loads: Vec<JoinHandle<()>>,
}

impl Timers {
    pub(crate) fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            events,
            spawn_tick: None,
            heartbeat: None,
            look_ats: HashMap::new(),
            loads: Vec::new(),
        }
    }

    pub(crate) fn start(&mut self, config: &SyncConfig) {
        self.cancel_all();
        self.spawn_tick = Some(self.periodic(config.spawn_tick(), || EngineEvent::SpawnTick));
        self.heartbeat = Some(self.periodic(config.position_interval(), || EngineEvent::Heartbeat));
        log::debug!(
            "started spawn tick ({:?}) and heartbeat ({:?})",
            config.spawn_tick(),
            config.position_interval()
        );
    }

    fn periodic(
        &self,
        period: Duration,
        event: impl Fn() -> EngineEvent + Send + 'static,
    ) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if events.send(event()).is_err() {
                    break;
                }
            }
        })
    }

    pub(crate) fn bind_look_at(
        &mut self,
        remote_id: RemoteEntityId,
        period: Duration,
    ) -> Result<(), SyncError> {
        if self.look_ats.contains_key(&remote_id) {
            return Err(SyncError::AlreadyBound(remote_id));
        }

        let id = remote_id.clone();
        let task = self.periodic(period, move || EngineEvent::LookAtTick(id.clone()));
        self.look_ats.insert(
            remote_id.clone(),
            LookAtBinding {
                remote_id,
                task,
            },
        );
        Ok(())
    }

    pub(crate) fn unbind_look_at(&mut self, remote_id: &RemoteEntityId) -> bool {
        match self.look_ats.remove(remote_id) {
            Some(binding) => {
                binding.task.abort();
                log::debug!("look-at binding for {} ended", binding.remote_id);
                true
            }
            None => false,
        }
    }

    pub(crate) fn look_at_count(&self) -> usize {
        self.look_ats.len()
    }

    pub(crate) fn spawn_load(&mut self, generation: u64, id: AssetId, load: LoadFuture) {
        self.loads.retain(|task| !task.is_finished());

        let events = self.events.clone();
        self.loads.push(tokio::spawn(async move {
            let result = load.await.map_err(|e| format!("{e:#}"));
            let _ = events.send(EngineEvent::AssetSettled {
                generation,
                id,
                result,
            });
        }));
    }

    pub(crate) fn cancel_all(&mut self) {
        if let Some(task) = self.spawn_tick.take() {
            task.abort();
        }
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
        for (_, binding) in self.look_ats.drain() {
            binding.task.abort();
        }
        for task in self.loads.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
