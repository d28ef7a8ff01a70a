//! Error types for Backchannel.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackchannelError {
    #[error("{program} is not installed (not found on PATH)")]
    DependencyMissing { program: String },

    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Claude output ended without a result event (exit code: {exit_code:?}){}", stderr_suffix(.stderr))]
    IncompleteStream {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("tmux {operation} failed: {reason}")]
    Capability {
        operation: &'static str,
        reason: String,
    },

    #[error("Claude command failed: {0}")]
    CommandFailed(String),

    #[error("Process spawn failed: {0}")]
    ProcessSpawnFailed(String),

    #[error("Turn cancelled")]
    Cancelled,

    #[error(
        "Cannot answer permission request {tool_use_id}: Claude print mode does not accept permission responses on stdin"
    )]
    PermissionResponseUnsupported { tool_use_id: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl BackchannelError {
    /// Whether retrying the same turn may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackchannelError::Timeout { .. })
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
