//! Parser for Claude CLI stream-json output.
//!
//! The wire format is treated as untrusted and evolving: every field read
//! falls back to an empty default and unknown shapes pass through as
//! [`StreamEvent::Other`].

use backchannel_types::{PermissionRequest, StreamEvent};
use serde_json::{Map, Value};
use tracing::debug;

/// Parser for Claude's stream-json output format.
#[derive(Debug, Default)]
pub struct OutputParser {
    /// Buffer for incomplete lines.
    buffer: String,
    /// Session id from the first `system`/`init` event.
    session_id: Option<String>,
    /// Set once the `result` event has been produced.
    finished: bool,
}

impl OutputParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id latched from the init event, if seen.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the terminal `result` event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Parse one line of output into zero or more events.
    ///
    /// Lines that are not JSON objects are skipped: the CLI interleaves
    /// diagnostics with its event stream.
    pub fn parse_line(&mut self, line: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let data = match serde_json::from_str::<Value>(trimmed) {
            Ok(data @ Value::Object(_)) => data,
            Ok(_) => {
                debug!(target: "backchannel::parser", "Skipping non-object JSON line: {}", trimmed);
                return Vec::new();
            }
            Err(e) => {
                debug!(target: "backchannel::parser", "Skipping non-JSON line: {}: {}", e, truncate(trimmed));
                return Vec::new();
            }
        };

        let event_type = str_field(&data, "type").to_string();
        let subtype = data.get("subtype").and_then(Value::as_str).map(str::to_string);

        match (event_type.as_str(), subtype.as_deref()) {
            ("system", Some("init")) => {
                let session_id = data
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                self.latch_session_id(session_id.as_deref());
                vec![StreamEvent::SystemInit {
                    session_id,
                    payload: data,
                }]
            }
            ("user", _) => {
                let mut events: Vec<StreamEvent> = (0..count_permission_denials(&data))
                    .map(|_| StreamEvent::ToolPermissionDenied {
                        payload: data.clone(),
                    })
                    .collect();
                events.push(StreamEvent::UserEcho { payload: data });
                events
            }
            ("assistant", _) => vec![StreamEvent::AssistantText {
                text: assistant_text(&data),
                payload: data,
            }],
            ("result", _) => {
                let mut events: Vec<StreamEvent> = data
                    .get("permission_denials")
                    .and_then(Value::as_array)
                    .map(|denials| {
                        denials
                            .iter()
                            .map(|denial| StreamEvent::ToolPermissionRequest {
                                request: permission_request(denial),
                                payload: data.clone(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                events.push(StreamEvent::Result {
                    result: str_field(&data, "result").to_string(),
                    is_error: data.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                    payload: data,
                });
                self.finished = true;
                events
            }
            _ => vec![StreamEvent::Other {
                event_type,
                subtype,
                payload: data,
            }],
        }
    }

    /// Parse streaming data that may contain partial lines.
    pub fn parse_chunk(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        // Process complete lines
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            events.extend(self.parse_line(&line));
        }

        events
    }

    /// Reset the parser state for a new session.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.session_id = None;
        self.finished = false;
    }

    fn latch_session_id(&mut self, session_id: Option<&str>) {
        match (&self.session_id, session_id) {
            (None, Some(id)) => {
                debug!(target: "backchannel::parser", "Claude session id: {}", id);
                self.session_id = Some(id.to_string());
            }
            (Some(current), Some(id)) if current != id => {
                debug!(
                    target: "backchannel::parser",
                    "Ignoring second init for session {} (latched {})",
                    id, current
                );
            }
            _ => {}
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Build a permission request from a `permission_denials` entry.
fn permission_request(denial: &Value) -> PermissionRequest {
    PermissionRequest {
        tool_name: str_field(denial, "tool_name").to_string(),
        tool_use_id: str_field(denial, "tool_use_id").to_string(),
        tool_input: denial
            .get("tool_input")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new),
    }
}

/// Number of tool results in a `user` message that failed on permissions.
fn count_permission_denials(data: &Value) -> usize {
    let Some(content) = data
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
    else {
        return 0;
    };

    content
        .iter()
        .filter(|item| {
            str_field(item, "type") == "tool_result"
                && item.get("is_error").and_then(Value::as_bool).unwrap_or(false)
                && content_text(item.get("content"))
                    .to_lowercase()
                    .contains("permission")
        })
        .count()
}

/// Flatten a tool result's `content`, which may be a string or a block list.
fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Join the text blocks of an assistant message.
fn assistant_text(data: &Value) -> String {
    data.get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| str_field(block, "type") == "text")
                .map(|block| str_field(block, "text"))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn truncate(s: &str) -> String {
    s.chars().take(100).collect()
}
