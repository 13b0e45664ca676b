//! Participant side of a shared room: mirrors the room's entities into a local
//! scene and reports the participant's interactions back.

pub mod assets;
pub mod config;
mod dispatch;
mod engine;
pub mod error;
pub mod host;
pub mod interaction;
pub mod orient;
pub mod registry;
pub mod roster;
mod session;
pub mod spawn;
pub mod transport;

pub use assets::{AssetGate, AssetState, ReadySignal};
pub use config::{SpawnOrder, SyncConfig};
pub use engine::SessionStats;
pub use error::{ConnectionError, SyncError};
pub use host::{
    AssetLoader, BuildError, EntityFactory, Host, LoadFuture, LocalEntityHandle, Locator, Relay,
    Scene,
};
pub use interaction::{HoverState, InteractionReporter, PointerButtons};
pub use registry::{EntityRef, EntityRegistry};
pub use roster::{Player, Roster};
pub use session::SessionManager;
pub use spawn::{PendingCreation, SpawnQueue};
pub use transport::{
    JoinRequest, Joined, MemoryRoom, MemorySession, MemoryTransport, RoomConnection, Session,
    Transport, memory_room,
};
