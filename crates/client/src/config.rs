use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnOrder {
    #[default]
    Fifo,
    Lifo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub spawn_tick_ms: u64,
    pub position_interval_ms: u64,
    pub look_at_interval_ms: u64,
    pub click_debounce_ms: u64,
    pub asset_poll_interval_ms: u64,
    pub pending_creation_ttl_secs: u64,
    pub spawn_order: SpawnOrder,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spawn_tick_ms: 100,
            position_interval_ms: 100,
            look_at_interval_ms: 16,
            click_debounce_ms: 500,
            asset_poll_interval_ms: 250,
            pending_creation_ttl_secs: 60,
            spawn_order: SpawnOrder::Fifo,
        }
    }
}

impl SyncConfig {
    pub fn spawn_tick(&self) -> Duration {
        Duration::from_millis(self.spawn_tick_ms.max(1))
    }

    pub fn position_interval(&self) -> Duration {
        Duration::from_millis(self.position_interval_ms.max(1))
    }

    pub fn look_at_interval(&self) -> Duration {
        Duration::from_millis(self.look_at_interval_ms.max(1))
    }

    pub fn click_debounce(&self) -> Duration {
        Duration::from_millis(self.click_debounce_ms)
    }

    pub fn asset_poll_interval(&self) -> Duration {
        Duration::from_millis(self.asset_poll_interval_ms.max(1))
    }

    pub fn pending_creation_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_creation_ttl_secs)
    }
}
