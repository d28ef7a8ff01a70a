//! Quiescence detection over a sampled surface.
//!
//! There is no completion signal from an interactive agent running in a
//! pane, so a response counts as finished once consecutive samples stop
//! changing for `stable_duration`.

use crate::output_diff::new_output;
use crate::{BackchannelError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Timing for one [`await_stable_output`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    /// Sleep between samples.
    pub poll_interval: Duration,
    /// How long the content must stay unchanged.
    pub stable_duration: Duration,
    /// Upper bound on the whole wait. `None` polls until the content settles,
    /// which never happens for a surface that keeps changing (a spinner).
    pub max_wait: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            stable_duration: Duration::from_secs(2),
            max_wait: None,
        }
    }
}

impl PollOptions {
    /// Number of consecutive unchanged comparisons that make the content stable.
    pub fn polls_needed(&self) -> u32 {
        if self.poll_interval.is_zero() {
            return 1;
        }
        let ratio = self.stable_duration.as_secs_f64() / self.poll_interval.as_secs_f64();
        (ratio.round() as u32).max(1)
    }
}

/// Per-call polling state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub last_snapshot: Option<String>,
    /// Consecutive samples equal to `last_snapshot`.
    pub stable_count: u32,
    /// Samples taken so far.
    pub cycle_count: u64,
}

impl PollState {
    /// Record a sample, returning the updated stability count.
    pub fn observe(&mut self, snapshot: String) -> u32 {
        self.cycle_count += 1;
        if self.last_snapshot.as_deref() == Some(snapshot.as_str()) {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
            self.last_snapshot = Some(snapshot);
        }
        self.stable_count
    }
}

/// Poll `sample` until its output is stable, then return what is new since
/// `before`.
///
/// The first sample only establishes the baseline, so a source that never
/// changes finishes after `polls_needed() + 1` samples. Sampling errors end
/// the wait and are returned as-is. Dropping the future stops polling.
pub async fn await_stable_output<F, Fut>(
    before: &str,
    options: &PollOptions,
    mut sample: F,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let polls_needed = options.polls_needed();
    let started = Instant::now();
    let mut state = PollState::default();

    debug!(
        target: "backchannel::poller",
        "Waiting for stable output ({} polls of {:?})",
        polls_needed, options.poll_interval
    );

    loop {
        if let Some(max_wait) = options.max_wait {
            if started.elapsed() >= max_wait {
                debug!(
                    target: "backchannel::poller",
                    "Output still changing after {} samples, giving up",
                    state.cycle_count
                );
                return Err(BackchannelError::Timeout {
                    operation: "Waiting for stable pane output",
                    after: max_wait,
                });
            }
        }

        tokio::time::sleep(options.poll_interval).await;

        let snapshot = sample().await?;
        let stable = state.observe(snapshot);
        trace!(
            target: "backchannel::poller",
            "Sample {}: stable {}/{}",
            state.cycle_count, stable, polls_needed
        );

        if stable >= polls_needed {
            let after = state.last_snapshot.unwrap_or_default();
            debug!(
                target: "backchannel::poller",
                "Output stable after {} samples",
                state.cycle_count
            );
            return Ok(new_output(before, &after));
        }
    }
}
