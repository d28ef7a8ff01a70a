//! Discover Claude Code sessions recorded under ~/.claude.
//!
//! Claude keeps one transcript per session at
//! `~/.claude/projects/<escaped-cwd>/<session-id>.jsonl`, where the working
//! directory is escaped by replacing `/` with `-`.

use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Longest first-prompt preview kept.
const PREVIEW_CHARS: usize = 80;

const NO_PROMPT: &str = "(no prompt found)";

/// A session from Claude's ~/.claude storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeSession {
    /// Claude's session UUID
    pub session_id: String,
    /// Transcript modification time
    pub timestamp: DateTime<Utc>,
    /// First user prompt, truncated
    pub first_prompt: String,
}

/// Reads Claude Code session data from ~/.claude.
pub struct ClaudeSessionReader {
    claude_dir: PathBuf,
}

impl ClaudeSessionReader {
    /// Create a new reader with the default ~/.claude directory.
    pub fn new() -> Self {
        let claude_dir = dirs::home_dir().unwrap_or_default().join(".claude");
        Self { claude_dir }
    }

    /// Create a reader with a custom Claude directory (for testing).
    pub fn with_dir(claude_dir: PathBuf) -> Self {
        Self { claude_dir }
    }

    /// Directory holding the transcripts for `cwd`.
    pub fn project_dir(&self, cwd: &Path) -> PathBuf {
        let escaped = cwd.to_string_lossy().replace('/', "-");
        self.claude_dir.join("projects").join(escaped)
    }

    /// Most recent sessions for `cwd`, newest first, at most `limit`.
    pub fn list_sessions(&self, cwd: &Path, limit: usize) -> Result<Vec<ClaudeSession>> {
        let dir = self.project_dir(cwd);
        if !dir.is_dir() {
            debug!(target: "backchannel::sessions", "No Claude sessions directory at {:?}", dir);
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(_) => continue,
            };
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(session_id) = session_id_from_path(&path) else {
                continue;
            };

            match read_session(&path, session_id) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    debug!(target: "backchannel::sessions", "Could not read session file {:?}: {}", path, e);
                }
            }
        }

        // Sort by timestamp descending (most recent first)
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions.truncate(limit);

        debug!(
            target: "backchannel::sessions",
            "Found {} sessions for {:?}",
            sessions.len(),
            cwd
        );
        Ok(sessions)
    }

    /// Check if a session transcript exists for `cwd`.
    pub fn session_exists(&self, cwd: &Path, session_id: &str) -> bool {
        Uuid::parse_str(session_id).is_ok()
            && self
                .project_dir(cwd)
                .join(format!("{session_id}.jsonl"))
                .is_file()
    }
}

impl Default for ClaudeSessionReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Transcript stem, if it is a session UUID.
fn session_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    Uuid::parse_str(stem).ok()?;
    Some(stem.to_string())
}

fn read_session(path: &Path, session_id: String) -> std::io::Result<ClaudeSession> {
    let modified = std::fs::metadata(path)?.modified()?;
    let reader = BufReader::new(File::open(path)?);

    let first_prompt = reader
        .lines()
        .map_while(|line| line.ok())
        .find_map(|line| {
            let entry: Value = serde_json::from_str(&line).ok()?;
            first_user_prompt(&entry)
        })
        .unwrap_or_else(|| NO_PROMPT.to_string());

    Ok(ClaudeSession {
        session_id,
        timestamp: DateTime::<Utc>::from(modified),
        first_prompt,
    })
}

/// Prompt text of a `user` transcript entry: string content or the first
/// block's `text`.
fn first_user_prompt(entry: &Value) -> Option<String> {
    if entry.get("type").and_then(Value::as_str) != Some("user") {
        return None;
    }
    let text = match entry.get("message")?.get("content")? {
        Value::String(s) if !s.is_empty() => s.as_str(),
        Value::Array(blocks) => blocks.first()?.as_object()?.get("text").and_then(Value::as_str).unwrap_or_default(),
        _ => return None,
    };
    Some(truncate_preview(text))
}

/// Truncate preview text to a reasonable length.
fn truncate_preview(s: &str) -> String {
    s.chars().take(PREVIEW_CHARS).collect()
}
