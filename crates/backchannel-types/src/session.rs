//! Session continuation modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix of the textual form of [`SessionMode::Resume`].
const RESUME_PREFIX: &str = "resume:";

/// How a turn attaches to Claude's conversation history.
///
/// Textual form: `fresh`, `continue`, or `resume:<session_id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SessionMode {
    /// Start a new conversation every turn.
    Fresh,
    /// Continue the most recently used conversation (`--continue`).
    #[default]
    Continue,
    /// Resume a specific conversation (`--resume <id>`).
    Resume(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionModeError {
    #[error("session mode 'resume:' requires a session ID, use 'resume:<session_id>'")]
    MissingSessionId,

    #[error("session mode must be 'fresh', 'continue', or 'resume:<session_id>', not '{0}'")]
    Unknown(String),
}

impl SessionMode {
    /// CLI flags selecting this mode.
    pub fn cli_args(&self) -> Vec<String> {
        match self {
            SessionMode::Fresh => Vec::new(),
            SessionMode::Continue => vec!["--continue".to_string()],
            SessionMode::Resume(id) => vec!["--resume".to_string(), id.clone()],
        }
    }

    pub fn resume_id(&self) -> Option<&str> {
        match self {
            SessionMode::Resume(id) => Some(id),
            _ => None,
        }
    }
}

impl FromStr for SessionMode {
    type Err = SessionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "fresh" => Ok(SessionMode::Fresh),
            "continue" => Ok(SessionMode::Continue),
            _ => match s.strip_prefix(RESUME_PREFIX) {
                Some(id) if !id.trim().is_empty() => Ok(SessionMode::Resume(id.trim().to_string())),
                Some(_) => Err(SessionModeError::MissingSessionId),
                None => Err(SessionModeError::Unknown(s.to_string())),
            },
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Fresh => f.write_str("fresh"),
            SessionMode::Continue => f.write_str("continue"),
            SessionMode::Resume(id) => write!(f, "{RESUME_PREFIX}{id}"),
        }
    }
}

impl TryFrom<String> for SessionMode {
    type Error = SessionModeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SessionMode> for String {
    fn from(mode: SessionMode) -> Self {
        mode.to_string()
    }
}
