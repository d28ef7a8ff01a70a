//! Common test utilities for integration tests.
//!
//! Fake Claude executables are shell scripts run through `/bin/sh`, so the
//! script file never needs to be executable.

#![allow(dead_code)]

use backchannel_core::ClaudeCommand;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Path of a stream-json transcript in the fixtures directory.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("stream")
        .join(format!("{}.jsonl", name))
}

/// A fake Claude whose behavior is the given shell script body.
///
/// Returns the temp dir holding the script; keep it alive for the test.
pub fn fake_claude(body: &str) -> (ClaudeCommand, TempDir) {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("fake-claude.sh");
    std::fs::write(&script, body).unwrap();
    let command = ClaudeCommand::new("/bin/sh").with_base_args([script.display().to_string()]);
    (command, dir)
}

/// A fake Claude that records its arguments to `args.txt` next to the
/// script, one per line, then replays a fixture transcript.
pub fn replaying_claude(fixture: &str) -> (ClaudeCommand, TempDir) {
    let transcript = fixture_path(fixture);
    let body = format!(
        "dir=$(dirname \"$0\")\nfor arg in \"$@\"; do printf '%s\\n' \"$arg\"; done > \"$dir/args.txt\"\ncat '{}'\n",
        transcript.display()
    );
    fake_claude(&body)
}

/// Arguments recorded by [`replaying_claude`].
pub fn recorded_args(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("args.txt"))
        .unwrap_or_else(|e| panic!("Failed to read recorded args: {}", e))
        .lines()
        .map(str::to_string)
        .collect()
}
