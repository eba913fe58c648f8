//! Agent worker wire protocol.
//!
//! Workers emit newline-delimited JSON objects on stdout, each of the form
//! `{"type": "...", "payload": {...}}`. Stderr is free text and never parsed
//! as protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One structured message emitted by an agent worker on stdout.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Build stage transition, optionally carrying a 0-100 progress value.
    Progress {
        #[serde(default)]
        payload: ProgressPayload,
    },

    /// A file the worker produced for the project.
    FileGenerated {
        #[serde(default)]
        payload: FilePayload,
    },

    /// Free-form chatter from one of the agent roles. Relayed, never persisted.
    AgentMessage {
        #[serde(default)]
        payload: Value,
    },

    /// Structured error report from the worker itself.
    Error {
        #[serde(default)]
        payload: ErrorPayload,
    },

    /// Message types this version does not know. Still broadcast.
    #[serde(untagged)]
    Unknown(Value),
}

/// Payload of a `progress` message.
///
/// A status projection happens only when both `stage` and `progress` are
/// present; a payload missing either is broadcast but not persisted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProgressPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_generated: Option<Vec<String>>,
}

/// Payload of a `file_generated` message.
///
/// Only `fileName` and `content` are required for persistence; the rest
/// default (`filePath` to the file name, `fileType` to `"unknown"`,
/// `createdBy` to `"Agent"`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Payload of an `error` message.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

/// Splits raw worker output into protocol messages.
///
/// A chunk may contain zero, one or many complete messages. Blank lines are
/// ignored and a line that is not valid JSON is dropped with a warning
/// without affecting the rest of the chunk. A trailing line not yet
/// terminated by a newline is buffered and prepended to the next chunk, so a
/// message split across two chunks is reconstructed instead of being dropped
/// as two fragments. Call [`LineDecoder::finish`] at end of stream to parse
/// whatever the worker left unterminated.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one raw chunk into an ordered sequence of messages.
    pub fn decode(&mut self, chunk: &str) -> Vec<AgentMessage> {
        self.buf.push_str(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(message) = parse_line(line.trim()) {
                messages.push(message);
            }
        }
        messages
    }

    /// Parse the buffered trailing text, if any. Used at end of stream.
    pub fn finish(&mut self) -> Option<AgentMessage> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(rest.trim())
    }
}

fn parse_line(line: &str) -> Option<AgentMessage> {
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(error) => {
            warn!(%error, line, "Dropping unparseable agent message");
            None
        }
    }
}
