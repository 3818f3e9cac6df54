//! Typed view of incoming JSON control messages.
//!
//! Every message carries a `"type"` discriminator.  The payload fields of
//! each type are deserialised with serde; unknown types and malformed
//! payloads become a [`ProtocolError`] that the caller logs and drops.
//!
//! | type  | fields                                      |
//! |-------|---------------------------------------------|
//! | `tts` | `state`: start / stop / sentence_start, `text` |
//! | `stt` | `text`                                      |
//! | `llm` | `emotion`                                   |
//! | `iot` | `commands`: array of command objects        |

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors produced while interpreting a control message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message has no \"type\" field")]
    MissingType,

    #[error("\"type\" field is not a string: {0}")]
    InvalidType(Value),

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error("malformed {kind} message: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Text-to-speech playback events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtsEvent {
    Start,
    Stop,
    SentenceStart { text: Option<String> },
    /// A state this device does not act on.
    Other(String),
}

/// An incoming control message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Tts(TtsEvent),
    Stt { text: Option<String> },
    Llm { emotion: Option<String> },
    Iot { commands: Vec<Value> },
}

#[derive(Deserialize)]
struct TtsPayload {
    state: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct SttPayload {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct LlmPayload {
    #[serde(default)]
    emotion: Option<String>,
}

#[derive(Deserialize)]
struct IotPayload {
    #[serde(default)]
    commands: Vec<Value>,
}

fn payload<T>(kind: &'static str, value: &Value) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(value).map_err(|source| ProtocolError::Malformed { kind, source })
}

impl ServerMessage {
    /// Interpret a JSON control message.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use voice_device_core::protocol::{ServerMessage, TtsEvent};
    ///
    /// let msg = ServerMessage::parse(&json!({"type": "tts", "state": "start"})).unwrap();
    /// assert_eq!(msg, ServerMessage::Tts(TtsEvent::Start));
    /// ```
    pub fn parse(value: &Value) -> Result<Self, ProtocolError> {
        let kind = match value.get("type") {
            None => return Err(ProtocolError::MissingType),
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(ProtocolError::InvalidType(other.clone())),
        };

        match kind {
            "tts" => {
                let TtsPayload { state, text } = payload("tts", value)?;
                let event = match state.as_str() {
                    "start" => TtsEvent::Start,
                    "stop" => TtsEvent::Stop,
                    "sentence_start" => TtsEvent::SentenceStart { text },
                    _ => TtsEvent::Other(state),
                };
                Ok(ServerMessage::Tts(event))
            }
            "stt" => {
                let SttPayload { text } = payload("stt", value)?;
                Ok(ServerMessage::Stt { text })
            }
            "llm" => {
                let LlmPayload { emotion } = payload("llm", value)?;
                Ok(ServerMessage::Llm { emotion })
            }
            "iot" => {
                let IotPayload { commands } = payload("iot", value)?;
                Ok(ServerMessage::Iot { commands })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}
