//! Backchannel configuration.

use anyhow::Result;
use backchannel_core::{ClaudeCommand, PollOptions, PrintOptions, StreamOptions, TmuxClient};
use backchannel_types::SessionMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, relative to the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/backchannel.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_claude_path")]
    pub claude_path: PathBuf,
    /// Arguments placed before every Claude invocation's own arguments.
    #[serde(default)]
    pub claude_args: Vec<String>,
    /// Directory Claude runs in; the current directory when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub session_mode: SessionMode,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub skip_permissions: bool,
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default)]
    pub tmux: TmuxConfig,
}

/// Settings for relaying through a tmux pane.
#[derive(Debug, Clone, Deserialize)]
pub struct TmuxConfig {
    #[serde(default = "default_tmux_path")]
    pub tmux_path: PathBuf,
    #[serde(default = "default_session_name")]
    pub session_name: String,
    #[serde(default)]
    pub pane: u32,
    #[serde(default = "default_history_lines")]
    pub history_lines: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stable_duration_ms")]
    pub stable_duration_ms: u64,
    /// Give up on a reply after this long; wait forever when unset.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

fn default_claude_path() -> PathBuf {
    PathBuf::from("claude")
}

fn default_turn_timeout_secs() -> u64 {
    300
}

fn default_grace_period_secs() -> u64 {
    5
}

fn default_tmux_path() -> PathBuf {
    PathBuf::from("tmux")
}

fn default_session_name() -> String {
    "claude".to_string()
}

fn default_history_lines() -> u32 {
    200
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_stable_duration_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            claude_path: default_claude_path(),
            claude_args: Vec::new(),
            working_dir: None,
            session_mode: SessionMode::default(),
            model: None,
            skip_permissions: false,
            turn_timeout_secs: default_turn_timeout_secs(),
            grace_period_secs: default_grace_period_secs(),
            tmux: TmuxConfig::default(),
        }
    }
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            tmux_path: default_tmux_path(),
            session_name: default_session_name(),
            pane: 0,
            history_lines: default_history_lines(),
            poll_interval_ms: default_poll_interval_ms(),
            stable_duration_ms: default_stable_duration_ms(),
            max_wait_secs: None,
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from the default location or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Ok(Config::default())
    }

    pub fn claude_command(&self) -> ClaudeCommand {
        ClaudeCommand::new(&self.claude_path).with_base_args(self.claude_args.iter().cloned())
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            working_dir: self.working_dir.clone(),
            session_mode: self.session_mode.clone(),
            model: self.model.clone(),
            skip_permissions: self.skip_permissions,
            timeout: Duration::from_secs(self.turn_timeout_secs),
            grace_period: Duration::from_secs(self.grace_period_secs),
        }
    }

    pub fn print_options(&self) -> PrintOptions {
        PrintOptions {
            working_dir: self.working_dir.clone(),
            session_mode: self.session_mode.clone(),
            model: self.model.clone(),
            skip_permissions: self.skip_permissions,
            timeout: Duration::from_secs(self.turn_timeout_secs),
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            poll_interval: Duration::from_millis(self.tmux.poll_interval_ms),
            stable_duration: Duration::from_millis(self.tmux.stable_duration_ms),
            max_wait: self.tmux.max_wait_secs.map(Duration::from_secs),
        }
    }

    pub fn tmux_client(&self) -> TmuxClient {
        TmuxClient::new(&self.tmux.session_name, self.tmux.pane, self.tmux.history_lines)
            .with_tmux_path(&self.tmux.tmux_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.claude_path, PathBuf::from("claude"));
        assert_eq!(config.session_mode, SessionMode::Continue);

        let stream = config.stream_options();
        assert_eq!(stream.timeout, Duration::from_secs(300));
        assert_eq!(stream.grace_period, Duration::from_secs(5));

        let poll = config.poll_options();
        assert_eq!(poll.poll_interval, Duration::from_millis(500));
        assert_eq!(poll.stable_duration, Duration::from_secs(2));
        assert_eq!(poll.max_wait, None);

        assert_eq!(config.tmux_client().target(), "claude:0");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
claude_path = "/usr/local/bin/claude"
session_mode = "resume:5f2c9a4e-1b7d-4c3a-9e8f-0a1b2c3d4e5f"
model = "sonnet"
turn_timeout_secs = 60

[tmux]
session_name = "work"
pane = 1
max_wait_secs = 120
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.claude_path, PathBuf::from("/usr/local/bin/claude"));
        assert_eq!(
            config.session_mode.resume_id(),
            Some("5f2c9a4e-1b7d-4c3a-9e8f-0a1b2c3d4e5f")
        );
        assert_eq!(config.print_options().model.as_deref(), Some("sonnet"));
        assert_eq!(config.print_options().timeout, Duration::from_secs(60));
        assert_eq!(config.grace_period_secs, 5);
        assert_eq!(config.tmux_client().target(), "work:1");
        assert_eq!(config.tmux.history_lines, 200);
        assert_eq!(config.poll_options().max_wait, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_invalid_session_mode_rejected() {
        let err = toml::from_str::<Config>(r#"session_mode = "resume:""#).unwrap_err();
        assert!(err.to_string().contains("requires a session ID"));
    }

    #[test]
    fn test_claude_args_become_base_args() {
        let config: Config = toml::from_str(
            r#"
claude_path = "/bin/sh"
claude_args = ["wrapper.sh"]
"#,
        )
        .unwrap();
        let command = config.claude_command();
        assert_eq!(command.program, PathBuf::from("/bin/sh"));
        assert_eq!(command.base_args, vec!["wrapper.sh".to_string()]);
    }
}
