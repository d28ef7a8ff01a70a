//! Locating and launching the Claude CLI.

use crate::BackchannelError;
use std::io;
use std::path::{Path, PathBuf};

/// How to invoke the Claude CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCommand {
    /// Executable, resolved through `PATH` when not absolute.
    pub program: PathBuf,
    /// Arguments placed before the per-turn arguments (e.g. a wrapper script).
    pub base_args: Vec<String>,
}

impl ClaudeCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
        }
    }

    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// A tokio command for this program with `base_args` applied.
    pub(crate) fn command(&self, cwd: Option<&Path>) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.base_args);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    pub(crate) fn display_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for ClaudeCommand {
    fn default() -> Self {
        Self::new("claude")
    }
}

/// Map a spawn failure, keeping "executable not found" distinct.
pub(crate) fn spawn_error(program: &str, err: io::Error) -> BackchannelError {
    if err.kind() == io::ErrorKind::NotFound {
        BackchannelError::DependencyMissing {
            program: program.to_string(),
        }
    } else {
        BackchannelError::ProcessSpawnFailed(format!("Failed to spawn {}: {}", program, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_mapping() {
        let missing = spawn_error("claude", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(missing, BackchannelError::DependencyMissing { ref program } if program == "claude"));

        let denied = spawn_error("claude", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, BackchannelError::ProcessSpawnFailed(_)));
    }

    #[test]
    fn test_base_args() {
        let cmd = ClaudeCommand::new("/bin/sh").with_base_args(["fake-claude.sh"]);
        assert_eq!(cmd.base_args, vec!["fake-claude.sh".to_string()]);
        assert_eq!(ClaudeCommand::default().display_name(), "claude");
    }
}
