// ABOUTME: Handshake messages exchanged with devbox over the IPC channel
// One JSON value per line; outbound records use camelCase keys with absent fields omitted

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Status value devbox sends once the environment is ready.
pub const STATUS_FINISHED: &str = "finished";

/// Structured handshake record, as the extension writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<String>,
}

impl HandshakeMessage {
    /// The outbound message telling devbox where the workspace lives.
    pub fn config_dir(dir: &Path) -> Self {
        Self {
            status: None,
            config_dir: Some(dir.to_string_lossy().into_owned()),
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            config_dir: None,
        }
    }

    pub fn finished() -> Self {
        Self::status(STATUS_FINISHED)
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Whatever well-formed JSON devbox sent, kept verbatim.
///
/// Devbox owns the inbound shape, so nothing is coerced into a record: an
/// array, a bare string or a record with a non-string `status` all survive
/// decoding and are judged by `is_finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage(Value);

impl InboundMessage {
    /// Fails only when the line is not JSON at all.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim()).map(Self)
    }

    /// Success is a JSON object whose `status` is exactly the string `"finished"`.
    pub fn is_finished(&self) -> bool {
        self.status() == Some(STATUS_FINISHED)
    }

    /// The `status` field when the message is a record holding a string there.
    pub fn status(&self) -> Option<&str> {
        self.0.as_object()?.get("status")?.as_str()
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}

impl From<HandshakeMessage> for InboundMessage {
    fn from(message: HandshakeMessage) -> Self {
        let mut record = serde_json::Map::new();
        if let Some(status) = message.status {
            record.insert("status".to_string(), Value::String(status));
        }
        if let Some(config_dir) = message.config_dir {
            record.insert("configDir".to_string(), Value::String(config_dir));
        }
        Self(Value::Object(record))
    }
}

impl std::fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
