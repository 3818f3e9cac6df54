//! Remote voice session: the transport seam and incoming message types.

pub mod message;
pub mod transport;

pub use message::{ProtocolError, ServerMessage, TtsEvent};
pub use transport::{
    AbortReason, AudioCallback, ChannelCallback, ErrorCallback, JsonCallback, ListeningMode,
    SessionTransport,
};
