//! Response-completion detection for relaying turns to Claude Code.
//!
//! Two independent strategies:
//! - quiescence: poll a tmux pane until its content stops changing, then diff
//!   ([`poller`], [`output_diff`], [`ansi`], [`tmux`], [`relay`])
//! - event stream: run Claude in stream-json mode and stop at the `result`
//!   event ([`parser`], [`stream`])

pub mod ansi;
mod claude_sessions;
mod command;
mod error;
pub mod output_diff;
mod parser;
pub mod poller;
mod print;
mod relay;
mod stream;
pub mod tmux;

pub use ansi::strip_ansi;
pub use claude_sessions::{ClaudeSession, ClaudeSessionReader};
pub use command::ClaudeCommand;
pub use error::BackchannelError;
pub use output_diff::new_output;
pub use parser::OutputParser;
pub use poller::{PollOptions, PollState, await_stable_output};
pub use print::{PrintOptions, run_print};
pub use relay::PaneRelay;
pub use stream::{ClaudeStreamSession, StreamOptions, TurnOutcome};
pub use tmux::{PaneControl, TmuxClient};

/// Result type for Backchannel operations.
pub type Result<T> = std::result::Result<T, BackchannelError>;
