//! Shared types for the Backchannel relay.

mod event;
mod pane;
mod session;

pub use event::*;
pub use pane::*;
pub use session::*;
