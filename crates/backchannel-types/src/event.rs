//! Classified events from Claude CLI stream-json output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Closed set of event kinds produced by the stream parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventKind {
    SystemInit,
    UserEcho,
    AssistantText,
    ToolPermissionRequest,
    ToolPermissionDenied,
    Result,
    Other,
}

/// A tool use that Claude wanted to perform but was not allowed to.
///
/// Read from the `permission_denials` list of a `result` event. Every field
/// falls back to an empty value when absent from the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub tool_name: String,
    /// Unique for the lifetime of one Claude process.
    pub tool_use_id: String,
    pub tool_input: Map<String, Value>,
}

impl PermissionRequest {
    /// Look up a string field of the tool input.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.tool_input.get(key).and_then(Value::as_str)
    }
}

/// One classified unit of Claude's output stream.
///
/// Every variant keeps the raw decoded object in `payload` so callers can
/// inspect fields the parser does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// `system`/`init`, carrying the session id Claude assigned.
    SystemInit {
        session_id: Option<String>,
        payload: Value,
    },
    /// A `user` message echoed back (usually tool results).
    UserEcho { payload: Value },
    /// An `assistant` message; `text` joins all text blocks.
    AssistantText { text: String, payload: Value },
    /// A tool use blocked pending approval, reported with the result.
    ToolPermissionRequest {
        request: PermissionRequest,
        payload: Value,
    },
    /// A tool result that failed because permission was refused.
    ToolPermissionDenied { payload: Value },
    /// End of turn.
    Result {
        result: String,
        is_error: bool,
        payload: Value,
    },
    /// Anything the parser does not classify.
    Other {
        event_type: String,
        subtype: Option<String>,
        payload: Value,
    },
}

impl StreamEvent {
    pub fn kind(&self) -> StreamEventKind {
        match self {
            StreamEvent::SystemInit { .. } => StreamEventKind::SystemInit,
            StreamEvent::UserEcho { .. } => StreamEventKind::UserEcho,
            StreamEvent::AssistantText { .. } => StreamEventKind::AssistantText,
            StreamEvent::ToolPermissionRequest { .. } => StreamEventKind::ToolPermissionRequest,
            StreamEvent::ToolPermissionDenied { .. } => StreamEventKind::ToolPermissionDenied,
            StreamEvent::Result { .. } => StreamEventKind::Result,
            StreamEvent::Other { .. } => StreamEventKind::Other,
        }
    }

    /// The raw decoded object this event was built from.
    pub fn payload(&self) -> &Value {
        match self {
            StreamEvent::SystemInit { payload, .. }
            | StreamEvent::UserEcho { payload }
            | StreamEvent::AssistantText { payload, .. }
            | StreamEvent::ToolPermissionRequest { payload, .. }
            | StreamEvent::ToolPermissionDenied { payload }
            | StreamEvent::Result { payload, .. }
            | StreamEvent::Other { payload, .. } => payload,
        }
    }

    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Result { .. })
    }

    pub fn permission_request(&self) -> Option<&PermissionRequest> {
        match self {
            StreamEvent::ToolPermissionRequest { request, .. } => Some(request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_and_terminal() {
        let result = StreamEvent::Result {
            result: "done".into(),
            is_error: false,
            payload: json!({"type": "result"}),
        };
        assert_eq!(result.kind(), StreamEventKind::Result);
        assert!(result.is_terminal());

        let other = StreamEvent::Other {
            event_type: "stream_event".into(),
            subtype: None,
            payload: json!({"type": "stream_event"}),
        };
        assert_eq!(other.kind(), StreamEventKind::Other);
        assert!(!other.is_terminal());
        assert_eq!(other.payload()["type"], "stream_event");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let event = StreamEvent::ToolPermissionRequest {
            request: PermissionRequest {
                tool_name: "Bash".into(),
                tool_use_id: "toolu_1".into(),
                tool_input: json!({"command": "ls"}).as_object().cloned().unwrap(),
            },
            payload: Value::Null,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "tool_permission_request");
        assert_eq!(value["request"]["tool_name"], "Bash");
        assert_eq!(event.permission_request().unwrap().input_str("command"), Some("ls"));
    }
}
