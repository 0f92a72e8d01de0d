//! # Cancellable Steps
//!
//! Runs a fixed number of timed steps while honouring a cooperative
//! cancellation token. Cancellation is a normal outcome, not an error.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Terminal state of a [`StepRunner::run`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step finished
    Completed,
    /// Cancellation was observed before or during step `at_step` (0-based)
    Cancelled {
        /// Step that did not finish
        at_step: usize,
    },
}

impl RunOutcome {
    /// Whether the run was cut short
    #[must_use]
    pub const fn is_cancelled(self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Fixed-count sequence of delayed steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRunner {
    step_delay: Duration,
    step_count: usize,
}

impl Default for StepRunner {
    /// Ten one-second steps
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 10)
    }
}

impl StepRunner {
    /// Create a runner with `step_count` steps of `step_delay` each
    #[must_use]
    pub const fn new(step_delay: Duration, step_count: usize) -> Self {
        Self {
            step_delay,
            step_count,
        }
    }

    /// Number of steps per run
    #[must_use]
    pub const fn step_count(&self) -> usize {
        self.step_count
    }

    /// Delay of a single step
    #[must_use]
    pub const fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Run all steps, stopping early once `cancel` fires
    ///
    /// The token is checked before each step, and each step's delay races
    /// against it; no delay starts once the token is cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> RunOutcome {
        for step in 0..self.step_count {
            if cancel.is_cancelled() {
                info!(step = step + 1, total = self.step_count, "Run cancelled before step");
                return RunOutcome::Cancelled { at_step: step };
            }

            debug!(step = step + 1, total = self.step_count, "Processing step");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(step = step + 1, total = self.step_count, "Run cancelled during step");
                    return RunOutcome::Cancelled { at_step: step };
                }
                () = tokio::time::sleep(self.step_delay) => {}
            }
        }

        info!(total = self.step_count, "Run completed");
        RunOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    const STEP: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_all_delays() {
        let runner = StepRunner::new(STEP, 10);
        let token = CancellationToken::new();
        let start = Instant::now();

        assert_eq!(runner.run(&token).await, RunOutcome::Completed);
        assert!(start.elapsed() >= STEP * 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_step_does_not_wait() {
        let runner = StepRunner::default();
        let token = CancellationToken::new();
        token.cancel();
        let start = Instant::now();

        assert_eq!(runner.run(&token).await, RunOutcome::Cancelled { at_step: 0 });
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_step_five() {
        let runner = StepRunner::new(STEP, 10);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STEP * 5 + STEP / 2).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = runner.run(&token).await;
        assert_eq!(outcome, RunOutcome::Cancelled { at_step: 5 });
        assert!(outcome.is_cancelled());
        let elapsed = start.elapsed();
        assert!(elapsed >= STEP * 5 && elapsed < STEP * 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_steps_completes_immediately() {
        let runner = StepRunner::new(STEP, 0);
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(runner.run(&token).await, RunOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_cancelled() {
        let runner = StepRunner::new(STEP, 10);
        let token = CancellationToken::new();
        let mut run = tokio_test::task::spawn(runner.run(&token));

        tokio_test::assert_pending!(run.poll());
        token.cancel();
        assert!(run.is_woken());
        tokio_test::assert_ready_eq!(run.poll(), RunOutcome::Cancelled { at_step: 0 });
    }

    #[test]
    fn test_accessors() {
        let runner = StepRunner::default();
        assert_eq!(runner.step_count(), 10);
        assert_eq!(runner.step_delay(), STEP);
    }
}
