//! One Claude turn in stream-json mode.
//!
//! The process is owned by a [`ClaudeStreamSession`] for exactly one turn.
//! Events are pulled with [`ClaudeStreamSession::next_event`] until the
//! terminal `result` event; every exit path (completion, timeout,
//! cancellation, early end of output) tears the process down and waits for
//! it before returning.

use crate::command::spawn_error;
use crate::{BackchannelError, ClaudeCommand, OutputParser, Result};
use backchannel_types::{PermissionRequest, SessionMode, StreamEvent};
use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Options for one stream-json turn.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub working_dir: Option<PathBuf>,
    pub session_mode: SessionMode,
    pub model: Option<String>,
    /// Pass `--dangerously-skip-permissions`. Without it, blocked tool uses
    /// come back as permission requests on the result event.
    pub skip_permissions: bool,
    /// Bound on the whole turn.
    pub timeout: Duration,
    /// Time a terminated process gets to exit before it is killed.
    pub grace_period: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            session_mode: SessionMode::default(),
            model: None,
            skip_permissions: false,
            timeout: Duration::from_secs(300),
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    pub result: String,
    pub is_error: bool,
    pub session_id: Option<String>,
    pub permission_requests: Vec<PermissionRequest>,
    /// Raw `user` messages whose tool results were refused.
    pub permission_denials: Vec<Value>,
}

impl TurnOutcome {
    /// Fold one event of the turn into the outcome.
    pub fn record(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::ToolPermissionRequest { request, .. } => {
                self.permission_requests.push(request)
            }
            StreamEvent::ToolPermissionDenied { payload } => self.permission_denials.push(payload),
            StreamEvent::Result {
                result, is_error, ..
            } => {
                self.result = result;
                self.is_error = is_error;
            }
            _ => {}
        }
    }
}

/// What woke the reader.
enum Wake {
    Cancelled,
    TimedOut,
    Line(Option<io::Result<Vec<u8>>>),
}

/// A running Claude process for one turn.
pub struct ClaudeStreamSession {
    child: Option<Child>,
    /// Raw stdout lines; decoded lossily so stray bytes cannot end the turn.
    lines: SplitStream<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
    parser: OutputParser,
    pending: VecDeque<StreamEvent>,
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    grace_period: Duration,
    done: bool,
}

/// Arguments for a stream-json turn, after the command's base args.
pub(crate) fn stream_args(prompt: &str, options: &StreamOptions) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-p".into(),
        prompt.into(),
        "--input-format".into(),
        "stream-json".into(),
        "--output-format".into(),
        "stream-json".into(),
        // --verbose is required when using -p with --output-format=stream-json
        "--verbose".into(),
    ];
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

impl ClaudeStreamSession {
    /// Launch Claude for one turn. Must be called within a tokio runtime.
    ///
    /// The prompt travels as an argument; stdin is closed. A missing
    /// executable is reported as [`BackchannelError::DependencyMissing`].
    pub fn start(
        command: &ClaudeCommand,
        options: &StreamOptions,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let program = command.display_name();
        let mut cmd = command.command(options.working_dir.as_deref());
        cmd.args(stream_args(prompt, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            target: "backchannel::process",
            "Spawning Claude ({}, session mode: {})",
            program, options.session_mode
        );
        debug!(target: "backchannel::process", "Prompt: {}", prompt);

        let mut child = cmd.spawn().map_err(|e| {
            warn!(target: "backchannel::process", "Failed to spawn Claude process: {}", e);
            spawn_error(&program, e)
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            BackchannelError::ProcessSpawnFailed("Claude stdout was not captured".into())
        })?;
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).split(b'\n');
                let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
                while let Ok(Some(bytes)) = lines.next_segment().await {
                    let line = String::from_utf8_lossy(&bytes).into_owned();
                    warn!(target: "backchannel::process", "Claude stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Vec::from(tail).join("\n")
            })
        });

        debug!(target: "backchannel::process", "Claude process started (pid {:?})", child.id());

        Ok(Self {
            child: Some(child),
            lines: SplitStream::new(BufReader::new(stdout).split(b'\n')),
            stderr_task,
            parser: OutputParser::new(),
            pending: VecDeque::new(),
            cancel,
            deadline: Instant::now() + options.timeout,
            timeout: options.timeout,
            grace_period: options.grace_period,
            done: false,
        })
    }

    /// Session id announced by Claude's init event, once seen.
    pub fn session_id(&self) -> Option<&str> {
        self.parser.session_id()
    }

    /// OS process id while the process is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Next event of the turn, or `None` after the terminal `result` event.
    ///
    /// Blocks on Claude's output while honoring the turn deadline and the
    /// cancellation token. Output ending without a `result` event is an
    /// [`BackchannelError::IncompleteStream`] error. The `result` event is
    /// handed out as soon as it is parsed; the process is reaped by the
    /// following call (or by [`close`](Self::close)).
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.done = true;
                    self.pending.clear();
                }
                return Ok(Some(event));
            }
            if self.done {
                self.teardown(true).await;
                return Ok(None);
            }

            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Cancelled,
                _ = tokio::time::sleep_until(self.deadline) => Wake::TimedOut,
                line = self.lines.next() => Wake::Line(line),
            };

            match wake {
                Wake::Line(Some(Ok(bytes))) => {
                    let line = String::from_utf8_lossy(&bytes);
                    trace!(target: "backchannel::process", "Claude stdout: {}", line);
                    let events = self.parser.parse_line(&line);
                    self.pending.extend(events);
                }
                Wake::Line(Some(Err(e))) => {
                    self.fail().await;
                    return Err(e.into());
                }
                Wake::Line(None) => {
                    let exit_code = self.teardown(true).await;
                    let stderr = self.take_stderr().await;
                    self.done = true;
                    warn!(
                        target: "backchannel::process",
                        "Claude output ended without a result (exit code {:?})",
                        exit_code
                    );
                    return Err(BackchannelError::IncompleteStream { exit_code, stderr });
                }
                Wake::TimedOut => {
                    warn!(
                        target: "backchannel::process",
                        "Claude turn timed out after {:?}, terminating",
                        self.timeout
                    );
                    self.fail().await;
                    return Err(BackchannelError::Timeout {
                        operation: "Claude turn",
                        after: self.timeout,
                    });
                }
                Wake::Cancelled => {
                    info!(target: "backchannel::process", "Claude turn cancelled, terminating");
                    self.fail().await;
                    return Err(BackchannelError::Cancelled);
                }
            }
        }
    }

    /// Drive the turn to completion, gathering what it produced.
    pub async fn collect_turn(mut self) -> Result<TurnOutcome> {
        let mut outcome = TurnOutcome::default();
        while let Some(event) = self.next_event().await? {
            outcome.record(event);
        }
        outcome.session_id = self.session_id().map(str::to_string);
        self.close().await;
        Ok(outcome)
    }

    /// Adapt the session into a stream of events that ends after the
    /// terminal event or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut session = state?;
            match session.next_event().await {
                Ok(Some(event)) => Some((Ok(event), Some(session))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Whether permission requests can be answered on this transport.
    pub fn supports_permission_responses(&self) -> bool {
        false
    }

    /// Answer a permission request.
    ///
    /// Print mode has no channel for this: Claude does not read approvals on
    /// stdin. The call is logged and always fails so callers cannot mistake
    /// it for a delivered answer. Pre-approve tools with `--allowedTools` or
    /// use `skip_permissions` instead.
    pub fn respond_to_permission(&self, tool_use_id: &str, allow: bool) -> Result<()> {
        warn!(
            target: "backchannel::process",
            "Cannot {} permission {} interactively in print mode",
            if allow { "allow" } else { "deny" },
            tool_use_id
        );
        Err(BackchannelError::PermissionResponseUnsupported {
            tool_use_id: tool_use_id.to_string(),
        })
    }

    /// Stop the process if still running and wait for it. After a complete
    /// turn the process first gets the grace period to exit on its own.
    pub async fn close(mut self) -> Option<i32> {
        self.done = true;
        let exit_code = self.teardown(self.parser.is_finished()).await;
        self.take_stderr().await;
        exit_code
    }

    async fn fail(&mut self) {
        self.done = true;
        self.pending.clear();
        self.teardown(false).await;
        self.take_stderr().await;
    }

    /// Reap the child. With `let_exit`, a running process first gets the
    /// grace period to exit on its own; then it is sent SIGTERM, and killed
    /// if still alive after another grace period.
    async fn teardown(&mut self, let_exit: bool) -> Option<i32> {
        let mut child = self.child.take()?;

        if let Ok(Some(status)) = child.try_wait() {
            debug!(target: "backchannel::process", "Claude process exited with {}", status);
            return status.code();
        }

        if let_exit {
            if let Ok(Ok(status)) = tokio::time::timeout(self.grace_period, child.wait()).await {
                debug!(target: "backchannel::process", "Claude process exited with {}", status);
                return status.code();
            }
        }

        terminate(&mut child);
        match tokio::time::timeout(self.grace_period, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(target: "backchannel::process", "Claude process terminated ({})", status);
                status.code()
            }
            Ok(Err(e)) => {
                warn!(target: "backchannel::process", "Failed to wait for Claude process: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    target: "backchannel::process",
                    "Claude process ignored SIGTERM for {:?}, killing",
                    self.grace_period
                );
                if let Err(e) = child.kill().await {
                    warn!(target: "backchannel::process", "Failed to kill Claude process: {}", e);
                }
                child.wait().await.ok().and_then(|status| status.code())
            }
        }
    }

    async fn take_stderr(&mut self) -> String {
        let Some(task) = self.stderr_task.take() else {
            return String::new();
        };
        match tokio::time::timeout(self.grace_period, task).await {
            Ok(Ok(tail)) => tail,
            _ => String::new(),
        }
    }
}

impl Drop for ClaudeStreamSession {
    fn drop(&mut self) {
        // kill_on_drop takes care of a child that was never closed
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

/// Ask the process to exit.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        debug!(target: "backchannel::process", "Sending SIGTERM to Claude process {}", pid);
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
        return;
    }

    if let Err(e) = child.start_kill() {
        warn!(target: "backchannel::process", "Failed to signal Claude process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_records_turn_events() {
        let mut outcome = TurnOutcome::default();
        outcome.record(StreamEvent::AssistantText {
            text: "working".into(),
            payload: Value::Null,
        });
        outcome.record(StreamEvent::ToolPermissionDenied {
            payload: serde_json::json!({"type": "user"}),
        });
        outcome.record(StreamEvent::ToolPermissionRequest {
            request: PermissionRequest {
                tool_name: "Bash".into(),
                tool_use_id: "toolu_01".into(),
                ..PermissionRequest::default()
            },
            payload: Value::Null,
        });
        outcome.record(StreamEvent::Result {
            result: "blocked".into(),
            is_error: true,
            payload: Value::Null,
        });

        assert_eq!(outcome.result, "blocked");
        assert!(outcome.is_error);
        assert_eq!(outcome.permission_requests[0].tool_name, "Bash");
        assert_eq!(outcome.permission_denials.len(), 1);
        assert_eq!(outcome.session_id, None);
    }

    #[test]
    fn test_stream_args_modes() {
        let mut options = StreamOptions::default();
        let args = stream_args("hi", &options);
        assert_eq!(
            args,
            vec![
                "-p",
                "hi",
                "--input-format",
                "stream-json",
                "--output-format",
                "stream-json",
                "--verbose",
                "--continue"
            ]
        );

        options.session_mode = SessionMode::Fresh;
        assert!(!stream_args("hi", &options).contains(&"--continue".to_string()));

        options.session_mode = SessionMode::Resume("abc".into());
        options.model = Some("sonnet".into());
        options.skip_permissions = true;
        let args = stream_args("hi", &options);
        assert!(args.ends_with(&[
            "--dangerously-skip-permissions".to_string(),
            "--model".to_string(),
            "sonnet".to_string(),
            "--resume".to_string(),
            "abc".to_string(),
        ]));
    }
}
