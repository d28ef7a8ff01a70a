//! Subcommand implementations and their terminal rendering.

use crate::config::Config;
use backchannel_core::{
    ClaudeSession, ClaudeSessionReader, ClaudeStreamSession, PaneRelay, Result, TmuxClient,
    TurnOutcome, run_print,
};
use backchannel_types::{PaneStatus, PermissionRequest, StreamEvent};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run one stream-json turn.
///
/// Permission requests and denials are reported on stderr as they arrive;
/// the caller prints the result.
pub async fn ask(config: &Config, prompt: &str, cancel: CancellationToken) -> Result<TurnOutcome> {
    let mut session = ClaudeStreamSession::start(
        &config.claude_command(),
        &config.stream_options(),
        prompt,
        cancel,
    )?;

    let mut outcome = TurnOutcome::default();
    while let Some(event) = session.next_event().await? {
        match &event {
            StreamEvent::ToolPermissionRequest { request, .. } => {
                eprintln!("{}", describe_permission_request(request));
            }
            StreamEvent::ToolPermissionDenied { .. } => {
                eprintln!("Tool use blocked: permission not granted");
            }
            StreamEvent::AssistantText { text, .. } if !text.is_empty() => {
                debug!(target: "backchannel::process", "Assistant: {}", text);
            }
            _ => {}
        }
        outcome.record(event);
    }

    outcome.session_id = session.session_id().map(str::to_string);
    session.close().await;

    if let Some(id) = &outcome.session_id {
        info!(target: "backchannel::sessions", "Turn finished in session {}", id);
    }
    if !outcome.permission_requests.is_empty() {
        eprintln!(
            "Claude could not run {} tool(s). Pre-approve them with --allowedTools or set skip_permissions.",
            outcome.permission_requests.len()
        );
    }
    Ok(outcome)
}

/// Run one print-mode turn.
pub async fn print(config: &Config, prompt: &str) -> Result<String> {
    run_print(&config.claude_command(), &config.print_options(), prompt).await
}

/// Relay `text` through the configured tmux pane.
pub async fn pane_send(config: &Config, text: &str) -> Result<String> {
    relay(config).ask(text).await
}

pub async fn pane_status(config: &Config) -> Result<PaneStatus> {
    relay(config).status().await
}

pub async fn pane_interrupt(config: &Config) -> Result<()> {
    relay(config).interrupt().await
}

fn relay(config: &Config) -> PaneRelay<TmuxClient> {
    PaneRelay::new(config.tmux_client(), config.poll_options())
}

/// Recent Claude sessions for the configured working directory.
pub fn sessions(config: &Config, limit: usize) -> Result<(PathBuf, Vec<ClaudeSession>)> {
    let cwd = match &config.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    let sessions = ClaudeSessionReader::new().list_sessions(&cwd, limit)?;
    Ok((cwd, sessions))
}

/// Cancel `token` on the first Ctrl+C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: "backchannel::startup", "Interrupted, stopping turn");
                token.cancel();
            }
            Err(e) => warn!(target: "backchannel::startup", "Cannot listen for Ctrl+C: {}", e),
        }
    });
}

/// One-line description of a blocked tool use.
pub fn describe_permission_request(request: &PermissionRequest) -> String {
    let detail = request
        .input_str("command")
        .or_else(|| request.input_str("file_path"))
        .or_else(|| request.input_str("url"))
        .or_else(|| request.input_str("pattern"))
        .map(str::to_string)
        .unwrap_or_else(|| serde_json::to_string(&request.tool_input).unwrap_or_default());

    let name = if request.tool_name.is_empty() {
        "unknown tool"
    } else {
        request.tool_name.as_str()
    };
    format!(
        "Permission requested: {} {} [{}]",
        name, detail, request.tool_use_id
    )
}

pub fn format_pane_status(status: &PaneStatus) -> String {
    if !status.exists {
        return format!(
            "tmux session '{}' not found (create it with: tmux new -d -s {})",
            status.session_name, status.session_name
        );
    }
    match status.attached {
        Some(true) => format!("tmux session '{}' exists (attached)", status.session_name),
        Some(false) => format!("tmux session '{}' exists (detached)", status.session_name),
        None => format!("tmux session '{}' exists", status.session_name),
    }
}

pub fn format_sessions(cwd: &Path, sessions: &[ClaudeSession]) -> String {
    if sessions.is_empty() {
        return format!("No Claude sessions found for {}", cwd.display());
    }
    sessions
        .iter()
        .map(|s| {
            format!(
                "{}  {}  {}",
                s.session_id,
                s.timestamp.format("%Y-%m-%d %H:%M"),
                s.first_prompt
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn request(tool: &str, input: serde_json::Value) -> PermissionRequest {
        PermissionRequest {
            tool_name: tool.into(),
            tool_use_id: "toolu_01".into(),
            tool_input: input.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_describe_permission_request() {
        assert_eq!(
            describe_permission_request(&request("Bash", json!({"command": "rm -rf build"}))),
            "Permission requested: Bash rm -rf build [toolu_01]"
        );
        assert_eq!(
            describe_permission_request(&request("Write", json!({"file_path": "/tmp/x", "content": "y"}))),
            "Permission requested: Write /tmp/x [toolu_01]"
        );
        assert_eq!(
            describe_permission_request(&request("", json!({"n": 1}))),
            r#"Permission requested: unknown tool {"n":1} [toolu_01]"#
        );
    }

    #[test]
    fn test_format_pane_status() {
        assert_eq!(
            format_pane_status(&PaneStatus::missing("claude")),
            "tmux session 'claude' not found (create it with: tmux new -d -s claude)"
        );
        let status = PaneStatus {
            session_name: "claude".into(),
            exists: true,
            attached: Some(false),
        };
        assert_eq!(format_pane_status(&status), "tmux session 'claude' exists (detached)");
    }

    #[test]
    fn test_format_sessions() {
        let cwd = Path::new("/work/repo");
        assert_eq!(format_sessions(cwd, &[]), "No Claude sessions found for /work/repo");

        let session = ClaudeSession {
            session_id: "5f2c9a4e-1b7d-4c3a-9e8f-0a1b2c3d4e5f".into(),
            timestamp: "2026-03-01T09:30:00Z".parse().unwrap(),
            first_prompt: "fix the build".into(),
        };
        assert_eq!(
            format_sessions(cwd, &[session]),
            "5f2c9a4e-1b7d-4c3a-9e8f-0a1b2c3d4e5f  2026-03-01 09:30  fix the build"
        );
    }

    fn fake_claude_config(body: &str) -> (Config, TempDir) {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-claude.sh");
        std::fs::write(&script, body).unwrap();
        let config = Config {
            claude_path: PathBuf::from("/bin/sh"),
            claude_args: vec![script.display().to_string()],
            turn_timeout_secs: 10,
            grace_period_secs: 1,
            ..Config::default()
        };
        (config, dir)
    }

    #[tokio::test]
    async fn test_ask_collects_requests() {
        let (config, _dir) = fake_claude_config(concat!(
            "echo '{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"abc\"}'\n",
            "echo '{\"type\":\"result\",\"result\":\"blocked\",\"permission_denials\":[{\"tool_name\":\"Bash\",\"tool_use_id\":\"t1\",\"tool_input\":{\"command\":\"ls\"}}]}'\n",
        ));

        let outcome = ask(&config, "hi", CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.result, "blocked");
        assert_eq!(outcome.session_id.as_deref(), Some("abc"));
        assert_eq!(outcome.permission_requests.len(), 1);
        assert_eq!(outcome.permission_requests[0].input_str("command"), Some("ls"));
    }

    #[tokio::test]
    async fn test_print_uses_config() {
        let (config, _dir) = fake_claude_config("echo \"mode:$3\"\n");

        // -p <prompt> --continue
        assert_eq!(print(&config, "hi").await.unwrap(), "mode:--continue");
    }
}
