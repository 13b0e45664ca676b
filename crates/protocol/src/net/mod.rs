mod codec;
mod protocol;

pub use codec::{CodecError, MAX_FRAME_SIZE};
pub use protocol::{ClientMessage, ServerMessage};
