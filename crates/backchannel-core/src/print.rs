//! Plain print-mode turns (`claude -p`).

use crate::command::spawn_error;
use crate::{BackchannelError, ClaudeCommand, Result};
use backchannel_types::SessionMode;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, error, info};

/// Options for one print-mode turn.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub working_dir: Option<PathBuf>,
    pub session_mode: SessionMode,
    pub model: Option<String>,
    pub skip_permissions: bool,
    pub timeout: Duration,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            session_mode: SessionMode::default(),
            model: None,
            skip_permissions: false,
            timeout: Duration::from_secs(300),
        }
    }
}

pub(crate) fn print_args(prompt: &str, options: &PrintOptions) -> Vec<String> {
    let mut args: Vec<String> = vec!["-p".into(), prompt.into()];
    if options.skip_permissions {
        args.push("--dangerously-skip-permissions".into());
    }
    if let Some(model) = &options.model {
        args.push("--model".into());
        args.push(model.clone());
    }
    args.extend(options.session_mode.cli_args());
    args
}

/// Run one turn and return Claude's reply.
///
/// Exit code 0 means success and the reply is stdout with trailing
/// whitespace trimmed. Any other exit reports stderr. On timeout the process
/// is killed.
pub async fn run_print(
    command: &ClaudeCommand,
    options: &PrintOptions,
    prompt: &str,
) -> Result<String> {
    let program = command.display_name();
    let mut cmd = command.command(options.working_dir.as_deref());
    cmd.args(print_args(prompt, options))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!(
        target: "backchannel::process",
        "Running Claude in print mode (session mode: {})",
        options.session_mode
    );
    debug!(target: "backchannel::process", "Prompt: {}", prompt);

    let child = cmd.spawn().map_err(|e| spawn_error(&program, e))?;

    // Dropping the output future on timeout kills the child.
    let output = match tokio::time::timeout(options.timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            error!(
                target: "backchannel::process",
                "Claude command timed out after {:?}",
                options.timeout
            );
            return Err(BackchannelError::Timeout {
                operation: "Claude command",
                after: options.timeout,
            });
        }
    };

    if output.status.success() {
        let reply = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        debug!(target: "backchannel::process", "Claude print mode succeeded, output: {} chars", reply.len());
        Ok(reply)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            "command failed".to_string()
        } else {
            stderr
        };
        error!(target: "backchannel::process", "Claude print mode failed ({}): {}", output.status, message);
        Err(BackchannelError::CommandFailed(message))
    }
}
