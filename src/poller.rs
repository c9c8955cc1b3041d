//! Timed-retry polling
//!
//! Cooperative sample-then-sleep loop bounded by a time window. Built on
//! `tokio::time`, so tests can drive it with the paused virtual clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Cadence and bound of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub window: Duration,
}

impl PollSchedule {
    pub fn new(interval: Duration, window: Duration) -> Self {
        Self { interval, window }
    }

    /// Window covering an expected runtime plus a grace margin
    pub fn for_estimate(estimate: Duration, interval: Duration, grace: Duration) -> Self {
        Self::new(interval, estimate.saturating_add(grace))
    }
}

/// Position of a sample within the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    /// 1-based sample number
    pub attempt: usize,
    /// Time since polling started
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Terminal {
        sample: T,
        samples: usize,
        elapsed: Duration,
    },
    TimedOut {
        samples: usize,
        elapsed: Duration,
    },
}

/// Sample until `is_terminal` accepts a value or the window elapses.
///
/// The first sample is taken immediately. No sample is taken once the
/// window has elapsed, and nothing is sampled after a terminal value.
/// A sampling error ends the loop and is returned as-is.
pub async fn poll_until_terminal<T, E, S, Fut, P>(
    schedule: PollSchedule,
    mut sample: S,
    is_terminal: P,
) -> Result<PollOutcome<T>, E>
where
    S: FnMut(PollTick) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let mut samples = 0;

    while start.elapsed() < schedule.window {
        samples += 1;
        let tick = PollTick {
            attempt: samples,
            elapsed: start.elapsed(),
        };
        let value = sample(tick).await?;

        if is_terminal(&value) {
            return Ok(PollOutcome::Terminal {
                sample: value,
                samples,
                elapsed: start.elapsed(),
            });
        }

        sleep(schedule.interval).await;
    }

    Ok(PollOutcome::TimedOut {
        samples,
        elapsed: start.elapsed(),
    })
}
