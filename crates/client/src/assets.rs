use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;

use roomsync::{AssetId, AssetKind, AssetSource};

use crate::error::SyncError;
use crate::host::{AssetLoader, LoadFuture, Locator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Ready(Locator),
    Failed(String),
}

#[derive(Debug)]
struct AssetRecord {
    id: AssetId,
    kind: AssetKind,
    state: AssetState,
}

/// Tracks every asset the room has announced and whether it finished loading.
#[derive(Debug)]
pub struct AssetGate {
    records: HashMap<AssetId, AssetRecord>,
    pending: usize,
    readiness: watch::Sender<usize>,
}

impl Default for AssetGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetGate {
    pub fn new() -> Self {
        let (readiness, _) = watch::channel(0);
        Self {
            records: HashMap::new(),
            pending: 0,
            readiness,
        }
    }

    /// Records the asset as pending and returns the loader's resolve future.
    pub fn register_pending(
        &mut self,
        id: AssetId,
        source: &AssetSource,
        loader: &dyn AssetLoader,
    ) -> Result<LoadFuture, SyncError> {
        if self.records.contains_key(&id) {
            return Err(SyncError::DuplicateAsset(id));
        }

        let load = loader.resolve(&id, source);
        let record = AssetRecord {
            id: id.clone(),
            kind: source.kind(),
            state: AssetState::Pending,
        };
        self.records.insert(id, record);
        self.pending += 1;
        self.publish();

        Ok(load)
    }

    pub fn mark_ready(&mut self, id: &AssetId, locator: Locator) -> bool {
        self.settle(id, AssetState::Ready(locator))
    }

    pub fn mark_failed(&mut self, id: &AssetId, reason: impl Into<String>) -> bool {
        self.settle(id, AssetState::Failed(reason.into()))
    }

    fn settle(&mut self, id: &AssetId, state: AssetState) -> bool {
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        if record.state != AssetState::Pending {
            return false;
        }

        log::trace!("{} asset {} settled: {state:?}", record.kind.as_str(), record.id);
        record.state = state;
        self.pending -= 1;
        self.publish();
        true
    }

    fn publish(&self) {
        self.readiness.send_replace(self.pending);
    }

    pub fn is_all_ready(&self) -> bool {
        self.pending == 0
    }

    pub fn is_ready(&self, id: &AssetId) -> bool {
        matches!(self.state(id), Some(AssetState::Ready(_)))
    }

    pub fn is_failed(&self, id: &AssetId) -> bool {
        matches!(self.state(id), Some(AssetState::Failed(_)))
    }

    pub fn state(&self, id: &AssetId) -> Option<&AssetState> {
        self.records.get(id).map(|record| &record.state)
    }

    pub fn locator(&self, id: &AssetId) -> Option<&Locator> {
        match self.state(id) {
            Some(AssetState::Ready(locator)) => Some(locator),
            _ => None,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn ready_signal(&self, poll_interval: Duration) -> ReadySignal {
        ReadySignal {
            pending: self.readiness.subscribe(),
            poll_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadySignal {
    pending: watch::Receiver<usize>,
    poll_interval: Duration,
}

impl ReadySignal {
    /// Resolves `true` once no asset is pending, or `false` if the gate was
    /// dropped first.
    pub async fn wait(mut self) -> bool {
        loop {
            if *self.pending.borrow_and_update() == 0 {
                return true;
            }
            match tokio::time::timeout(self.poll_interval, self.pending.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return false,
                Err(_) => log::trace!("asset gate still pending, polling again"),
            }
        }
    }
}
