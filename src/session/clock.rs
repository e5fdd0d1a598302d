// src/session/clock.rs

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

/// Maps the server-issued end time onto the monotonic clock, minus `skew`.
///
/// Sampling the wall clock once and counting down monotonically means a
/// paused tab or a wall-clock jump cannot stretch the attempt.
pub fn local_deadline(
    session_end: DateTime<Utc>,
    skew: Duration,
    now: DateTime<Utc>,
    mono_now: Instant,
) -> Instant {
    let skew = TimeDelta::from_std(skew).unwrap_or(TimeDelta::zero());
    match (session_end - skew - now).to_std() {
        Ok(left) => mono_now + left,
        // already past
        Err(_) => mono_now,
    }
}

/// `max(0, floor((deadline - now) / 1s))`.
fn remaining_until(deadline: Instant, now: Instant) -> u64 {
    deadline.saturating_duration_since(now).as_secs()
}

/// Countdown towards a fixed deadline.
///
/// Publishes remaining whole seconds once per tick and resolves the expiry
/// receiver returned by [`SessionClock::start`] exactly once, when the count
/// reaches zero. The clock never re-arms: after expiry or [`stop`](Self::stop)
/// the ticking task is gone.
#[derive(Debug)]
pub struct SessionClock {
    remaining: watch::Receiver<u64>,
    task: Option<JoinHandle<()>>,
}

impl SessionClock {
    pub fn start(deadline: Instant, tick: Duration) -> (Self, oneshot::Receiver<()>) {
        let (remaining_tx, remaining_rx) =
            watch::channel(remaining_until(deadline, Instant::now()));
        let (expired_tx, expired_rx) = oneshot::channel();

        let task = tokio::spawn(run(deadline, tick, remaining_tx, expired_tx));

        let clock = Self {
            remaining: remaining_rx,
            task: Some(task),
        };
        (clock, expired_rx)
    }

    pub fn remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops ticking. Idempotent. The expiry receiver then resolves with an
    /// error instead of firing.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    deadline: Instant,
    tick: Duration,
    remaining_tx: watch::Sender<u64>,
    expired_tx: oneshot::Sender<()>,
) {
    let mut interval = time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = u64::MAX;

    loop {
        interval.tick().await;
        let secs = remaining_until(deadline, Instant::now()).min(last);
        last = secs;
        remaining_tx.send_replace(secs);

        if secs == 0 {
            tracing::debug!("Session clock expired");
            let _ = expired_tx.send(());
            return;
        }
    }
}
