//! Turn relay over a persistent pane.

use crate::poller::{PollOptions, await_stable_output};
use crate::tmux::PaneControl;
use crate::{BackchannelError, Result};
use backchannel_types::PaneStatus;
use tracing::{debug, info};

/// Sends text into a pane and waits for the agent's reply to settle.
///
/// Turns against one pane must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct PaneRelay<P> {
    pane: P,
    options: PollOptions,
}

impl<P: PaneControl> PaneRelay<P> {
    pub fn new(pane: P, options: PollOptions) -> Self {
        Self { pane, options }
    }

    pub fn pane(&self) -> &P {
        &self.pane
    }

    /// Send `text` and return the output it produced.
    pub async fn ask(&self, text: &str) -> Result<String> {
        if !self.pane.has_session().await? {
            return Err(BackchannelError::Capability {
                operation: "has-session",
                reason: "target session does not exist".to_string(),
            });
        }

        let before = self.pane.capture().await?;
        self.pane.send_text(text).await?;
        info!(target: "backchannel::poller", "Sent {} chars to pane, waiting for output", text.len());

        let output = await_stable_output(&before, &self.options, || self.pane.capture()).await?;
        debug!(target: "backchannel::poller", "Pane produced {} chars", output.len());
        Ok(output)
    }

    pub async fn interrupt(&self) -> Result<()> {
        self.pane.send_interrupt().await
    }

    pub async fn status(&self) -> Result<PaneStatus> {
        self.pane.status().await
    }
}
