//! The dispatcher: renders once per flush, delivers per channel with
//! bounded retry.
//!
//! Dispatch runs on its own task fed by a queue, so a slow or failing
//! channel never holds up alert evaluation. A channel that keeps
//! failing is given up on for this flush and counted; the group's next
//! interval produces a fresh attempt.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};
use vigil_alerts::Alert;
use vigil_routing::FlushJob;

use crate::channel::NotificationChannel;
use crate::message::{Message, MessageStatus};
use crate::receiver::Receiver;

/// Bounded exponential backoff parameters for failed sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per channel, first try included.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base: Duration,
    /// Upper bound on any single delay.
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base: Duration::from_millis(250),
            cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), before jitter.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_f64.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.base.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.cap)
    }

    /// Adds up to 25% of random jitter on top of `delay`, still bounded
    /// by the cap.
    #[must_use]
    pub fn jittered(&self, delay: Duration) -> Duration {
        use rand::Rng;

        let spread = rand::thread_rng().gen_range(0.0..=0.25);
        let millis = (delay.as_millis() as f64 * (1.0 + spread)) as u64;
        Duration::from_millis(millis).min(self.cap)
    }
}

/// Counters for delivery outcomes.
///
/// Held behind an `Arc` and threaded through config reloads so the
/// totals survive dispatcher rebuilds.
#[derive(Debug, Default)]
pub struct DispatcherStats {
    sent: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
}

impl DispatcherStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel deliveries that succeeded.
    #[must_use]
    pub fn notifications_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Channel deliveries that exhausted their retries.
    #[must_use]
    pub fn notifications_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Retry attempts beyond each first try.
    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            notifications_sent: self.notifications_sent(),
            notifications_failed: self.notifications_failed(),
            retries: self.retries(),
        }
    }

    fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of the dispatcher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Channel deliveries that succeeded.
    pub notifications_sent: u64,
    /// Channel deliveries that exhausted their retries.
    pub notifications_failed: u64,
    /// Retry attempts beyond each first try.
    pub retries: u64,
}

/// What a single dispatch call achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every channel accepted the message.
    Delivered {
        /// Number of channels that accepted.
        channels: usize,
    },
    /// At least one channel exhausted its retries.
    Failed {
        /// Channels that accepted the message.
        delivered: usize,
        /// Channels that gave up.
        failed: usize,
    },
    /// Resolved-only flush to a receiver that opted out of resolution
    /// notifications.
    Skipped,
}

/// Renders a flush once and delivers it to every channel of a receiver.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    retry: RetryPolicy,
    stats: Arc<DispatcherStats>,
}

impl Dispatcher {
    /// Creates a dispatcher with the given retry policy and counters.
    #[must_use]
    pub fn new(retry: RetryPolicy, stats: Arc<DispatcherStats>) -> Self {
        Self { retry, stats }
    }

    /// The shared counters.
    #[must_use]
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    /// Delivers one group flush to one receiver.
    ///
    /// `alerts` are the job's members as resolved against the alert
    /// store at send time. The message is rendered once and sent to
    /// each channel in order; a failing channel is retried with capped
    /// exponential backoff plus jitter. Exhaustion is counted and
    /// logged, never propagated.
    pub async fn dispatch(
        &self,
        job: &FlushJob,
        alerts: &[Alert],
        receiver: &Receiver,
    ) -> DispatchOutcome {
        let message = Message::render(job.group_key.as_str(), &job.group_labels, alerts);

        if message.status == MessageStatus::Resolved && !receiver.send_resolved() {
            debug!(
                receiver = receiver.name(),
                group = %job.group_key,
                "receiver opts out of resolution notifications, skipping"
            );
            return DispatchOutcome::Skipped;
        }

        let mut delivered = 0_usize;
        let mut failed = 0_usize;
        for channel in receiver.channels() {
            if self.send_with_retry(channel.as_ref(), &message).await {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        if failed == 0 {
            DispatchOutcome::Delivered {
                channels: delivered,
            }
        } else {
            DispatchOutcome::Failed { delivered, failed }
        }
    }

    /// Returns true once the channel accepts the message.
    async fn send_with_retry(&self, channel: &dyn NotificationChannel, message: &Message) -> bool {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            match channel.send(message) {
                Ok(()) => {
                    self.stats.record_sent();
                    debug!(
                        channel = channel.name(),
                        attempt,
                        title = %message.title,
                        "notification delivered"
                    );
                    return true;
                }
                Err(err) if attempt < self.retry.max_attempts => {
                    self.stats.record_retry();
                    let delay = self.retry.jittered(self.retry.delay_for_attempt(attempt));
                    warn!(
                        channel = channel.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "notification send failed, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    self.stats.record_failed();
                    warn!(
                        channel = channel.name(),
                        attempts = attempt,
                        error = %err,
                        "notification send failed, giving up until the next flush"
                    );
                    return false;
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Arc::new(DispatcherStats::new()))
    }
}
