//! Notification channels and their configurations.
//!
//! [`ChannelConfig`] is the serialized form found in receiver config;
//! [`ChannelConfig::build`] validates it and produces the runtime
//! channel. The built-in channels are reference implementations that
//! log the delivery; real transports implement the same
//! [`NotificationChannel`] trait and slot in at the receiver level.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{NotifyError, Result};
use crate::message::Message;

/// The delivery seam for rendered notifications.
///
/// Channel-specific transport and auth stay behind this trait; the
/// dispatcher only ever calls `send` and retries on failure.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Short channel identifier used in logs and stats.
    fn name(&self) -> &str;

    /// Delivers one rendered message.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Delivery` if the channel rejects the send.
    fn send(&self, message: &Message) -> Result<()>;
}

/// Email delivery parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Sender address.
    pub from: String,
    /// SMTP relay host.
    pub smtp_host: String,
}

/// Chat webhook parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Incoming-webhook URL to post to.
    pub webhook_url: String,
    /// Channel the message is posted into.
    pub channel: String,
}

/// Paging service parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerConfig {
    /// Integration routing key.
    pub routing_key: String,
    /// Events API endpoint.
    pub url: String,
}

/// One channel entry of a receiver, tagged by transport type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// SMTP email delivery.
    Email(EmailConfig),
    /// Chat webhook delivery.
    Chat(ChatConfig),
    /// Paging service delivery.
    Pager(PagerConfig),
}

impl ChannelConfig {
    /// The transport tag, matching the serialized `type` field.
    #[must_use]
    pub const fn channel_type(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Chat(_) => "chat",
            Self::Pager(_) => "pager",
        }
    }

    /// Validates the configuration and builds the runtime channel.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidChannel` when a required field is
    /// missing or empty.
    pub fn build(&self) -> Result<Arc<dyn NotificationChannel>> {
        match self {
            Self::Email(config) => {
                if config.to.is_empty() || config.to.iter().any(String::is_empty) {
                    return Err(NotifyError::InvalidChannel {
                        reason: "email channel needs at least one non-empty recipient".to_string(),
                    });
                }
                if config.smtp_host.is_empty() {
                    return Err(NotifyError::InvalidChannel {
                        reason: "email channel needs an smtp_host".to_string(),
                    });
                }
                Ok(Arc::new(EmailChannel::new(config.clone())))
            }
            Self::Chat(config) => {
                if config.webhook_url.is_empty() {
                    return Err(NotifyError::InvalidChannel {
                        reason: "chat channel needs a webhook_url".to_string(),
                    });
                }
                Ok(Arc::new(ChatChannel::new(config.clone())))
            }
            Self::Pager(config) => {
                if config.routing_key.is_empty() {
                    return Err(NotifyError::InvalidChannel {
                        reason: "pager channel needs a routing_key".to_string(),
                    });
                }
                Ok(Arc::new(PagerChannel::new(config.clone())))
            }
        }
    }
}

/// Reference email channel: logs the delivery instead of speaking SMTP.
#[derive(Debug, Clone)]
pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    /// Creates the channel from validated configuration.
    #[must_use]
    pub const fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn send(&self, message: &Message) -> Result<()> {
        info!(
            channel = "email",
            to = ?self.config.to,
            from = %self.config.from,
            smtp_host = %self.config.smtp_host,
            status = %message.status,
            alerts = message.alerts.len(),
            title = %message.title,
            "would send email notification"
        );
        Ok(())
    }
}

/// Reference chat channel: logs the webhook post.
#[derive(Debug, Clone)]
pub struct ChatChannel {
    config: ChatConfig,
}

impl ChatChannel {
    /// Creates the channel from validated configuration.
    #[must_use]
    pub const fn new(config: ChatConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for ChatChannel {
    fn name(&self) -> &str {
        "chat"
    }

    fn send(&self, message: &Message) -> Result<()> {
        info!(
            channel = "chat",
            webhook_url = %self.config.webhook_url,
            room = %self.config.channel,
            status = %message.status,
            alerts = message.alerts.len(),
            title = %message.title,
            "would post chat notification"
        );
        debug!(body = %message.body, "chat notification body");
        Ok(())
    }
}

/// Reference pager channel: logs the page.
///
/// The routing key is deliberately kept out of the log line.
#[derive(Debug, Clone)]
pub struct PagerChannel {
    config: PagerConfig,
}

impl PagerChannel {
    /// Creates the channel from validated configuration.
    #[must_use]
    pub const fn new(config: PagerConfig) -> Self {
        Self { config }
    }
}

impl NotificationChannel for PagerChannel {
    fn name(&self) -> &str {
        "pager"
    }

    fn send(&self, message: &Message) -> Result<()> {
        info!(
            channel = "pager",
            url = %self.config.url,
            status = %message.status,
            alerts = message.alerts.len(),
            title = %message.title,
            "would trigger page"
        );
        Ok(())
    }
}

/// Capturing channel for tests and local runs.
///
/// Records every delivered message and can be programmed to fail, which
/// is how dispatcher retry behavior is exercised. Clones share the same
/// captured state.
#[derive(Debug, Clone)]
pub struct InMemoryChannel {
    name: String,
    inner: Arc<Mutex<InMemoryState>>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    sent: Vec<Message>,
    attempts: u64,
    failures_remaining: u32,
    always_fail: bool,
    fail_reason: String,
}

impl InMemoryChannel {
    /// Creates a capturing channel with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(InMemoryState::default())),
        }
    }

    /// Makes every send fail until [`recover`](Self::recover) is called.
    pub fn fail_with(&self, reason: impl Into<String>) {
        let mut state = self.inner.lock();
        state.always_fail = true;
        state.fail_reason = reason.into();
    }

    /// Makes the next `n` sends fail, after which deliveries succeed.
    pub fn fail_times(&self, n: u32) {
        self.inner.lock().failures_remaining = n;
    }

    /// Clears any programmed failure.
    pub fn recover(&self) {
        let mut state = self.inner.lock();
        state.always_fail = false;
        state.failures_remaining = 0;
    }

    /// Messages delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Message> {
        self.inner.lock().sent.clone()
    }

    /// Number of send calls, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.inner.lock().attempts
    }
}

impl NotificationChannel for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: &Message) -> Result<()> {
        let mut state = self.inner.lock();
        state.attempts += 1;

        if state.always_fail {
            return Err(NotifyError::Delivery {
                channel: self.name.clone(),
                reason: state.fail_reason.clone(),
            });
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(NotifyError::Delivery {
                channel: self.name.clone(),
                reason: "programmed failure".to_string(),
            });
        }

        state.sent.push(message.clone());
        Ok(())
    }
}
