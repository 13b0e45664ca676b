mod manager;
pub(crate) mod timers;

pub use manager::SessionManager;
