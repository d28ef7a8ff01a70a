//! Terminal multiplexer pane types.

use serde::{Deserialize, Serialize};

/// Status of the tmux session hosting the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneStatus {
    pub session_name: String,
    pub exists: bool,
    /// `None` when the session does not exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached: Option<bool>,
}

impl PaneStatus {
    pub fn missing(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            exists: false,
            attached: None,
        }
    }
}
