//! tmux pane access for the quiescence strategy.

use crate::ansi::strip_ansi;
use crate::{BackchannelError, Result};
use backchannel_types::PaneStatus;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, trace};

/// Operations the relay needs from the surface hosting the agent.
pub trait PaneControl {
    /// Whether the target session exists.
    fn has_session(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Type `text` literally, then press Enter.
    fn send_text(&self, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Current visible contents plus bounded scrollback, ANSI-stripped.
    fn capture(&self) -> impl Future<Output = Result<String>> + Send;

    /// Send Ctrl+C.
    fn send_interrupt(&self) -> impl Future<Output = Result<()>> + Send;

    fn status(&self) -> impl Future<Output = Result<PaneStatus>> + Send;
}

/// [`PaneControl`] backed by the tmux CLI.
#[derive(Debug, Clone)]
pub struct TmuxClient {
    tmux_path: PathBuf,
    session_name: String,
    pane: u32,
    history_lines: u32,
}

impl TmuxClient {
    pub fn new(session_name: impl Into<String>, pane: u32, history_lines: u32) -> Self {
        Self {
            tmux_path: PathBuf::from("tmux"),
            session_name: session_name.into(),
            pane,
            history_lines,
        }
    }

    /// Use a specific tmux binary.
    pub fn with_tmux_path(mut self, tmux_path: impl Into<PathBuf>) -> Self {
        self.tmux_path = tmux_path.into();
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// `session:pane` target string.
    pub fn target(&self) -> String {
        format!("{}:{}", self.session_name, self.pane)
    }

    async fn run(&self, operation: &'static str, args: &[&str]) -> Result<TmuxOutput> {
        trace!(target: "backchannel::tmux", "tmux {}", args.join(" "));
        let output = tokio::process::Command::new(&self.tmux_path)
            .args(args)
            .output()
            .await
            .map_err(|e| self.launch_error(operation, e))?;

        Ok(TmuxOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run a command that must succeed.
    async fn run_checked(&self, operation: &'static str, args: &[&str]) -> Result<String> {
        let output = self.run(operation, args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            let reason = if output.stderr.is_empty() {
                "unknown error".to_string()
            } else {
                output.stderr
            };
            error!(target: "backchannel::tmux", "tmux {} failed: {}", operation, reason);
            Err(BackchannelError::Capability { operation, reason })
        }
    }

    fn launch_error(&self, operation: &'static str, err: io::Error) -> BackchannelError {
        if err.kind() == io::ErrorKind::NotFound {
            error!(target: "backchannel::tmux", "tmux command not found");
            BackchannelError::DependencyMissing {
                program: self.tmux_path.display().to_string(),
            }
        } else {
            BackchannelError::Capability {
                operation,
                reason: format!("failed to execute tmux: {}", err),
            }
        }
    }
}

struct TmuxOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl PaneControl for TmuxClient {
    async fn has_session(&self) -> Result<bool> {
        let output = self
            .run("has-session", &["has-session", "-t", &self.session_name])
            .await?;
        if !output.success {
            debug!(
                target: "backchannel::tmux",
                "tmux session '{}' does not exist (create it with: tmux new -d -s {})",
                self.session_name, self.session_name
            );
        }
        Ok(output.success)
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let target = self.target();
        debug!(target: "backchannel::tmux", "Sending input to '{}': {:?}", target, text);
        self.run_checked("send-keys", &["send-keys", "-t", &target, "-l", text])
            .await?;
        self.run_checked("send-keys", &["send-keys", "-t", &target, "Enter"])
            .await?;
        Ok(())
    }

    async fn capture(&self) -> Result<String> {
        let target = self.target();
        let start = format!("-{}", self.history_lines);
        let raw = self
            .run_checked("capture-pane", &["capture-pane", "-t", &target, "-p", "-S", &start])
            .await?;
        let raw = raw.trim_end();
        let output = strip_ansi(raw);
        trace!(
            target: "backchannel::tmux",
            "Captured {} chars ({} after ANSI strip)",
            raw.len(),
            output.len()
        );
        Ok(output)
    }

    async fn send_interrupt(&self) -> Result<()> {
        let target = self.target();
        debug!(target: "backchannel::tmux", "Sending interrupt to '{}'", target);
        self.run_checked("send-keys", &["send-keys", "-t", &target, "C-c"])
            .await?;
        Ok(())
    }

    async fn status(&self) -> Result<PaneStatus> {
        let output = self
            .run(
                "list-sessions",
                &["list-sessions", "-F", "#{session_name}:#{session_attached}"],
            )
            .await?;
        if !output.success {
            // tmux exits non-zero when no server is running
            debug!(target: "backchannel::tmux", "No tmux sessions: {}", output.stderr);
            return Ok(PaneStatus::missing(&self.session_name));
        }
        Ok(parse_session_list(&self.session_name, &output.stdout))
    }
}

/// Find `session_name` in `list-sessions -F '#{session_name}:#{session_attached}'` output.
fn parse_session_list(session_name: &str, listing: &str) -> PaneStatus {
    listing
        .lines()
        .filter_map(|line| line.rsplit_once(':'))
        .find(|(name, _)| *name == session_name)
        .map(|(name, attached)| PaneStatus {
            session_name: name.to_string(),
            exists: true,
            attached: Some(attached.trim() != "0"),
        })
        .unwrap_or_else(|| PaneStatus::missing(session_name))
}
