//! Receivers: named bundles of notification channels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelConfig, NotificationChannel};
use crate::error::{NotifyError, Result};

/// A receiver as configured: a name plus an ordered channel list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// The name routes refer to.
    pub name: String,
    /// Whether resolution notifications are delivered. Off by default;
    /// receivers opt in.
    #[serde(default)]
    pub send_resolved: bool,
    /// Channels tried in order on each flush.
    pub channels: Vec<ChannelConfig>,
}

impl ReceiverConfig {
    /// Validates the definition and builds every channel.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidReceiver` for an unnamed receiver
    /// and `NotifyError::InvalidChannel` for the first channel that
    /// fails validation.
    pub fn build(&self) -> Result<Receiver> {
        if self.name.is_empty() {
            return Err(NotifyError::InvalidReceiver {
                reason: "receiver name cannot be empty".to_string(),
            });
        }

        let channels = self
            .channels
            .iter()
            .map(ChannelConfig::build)
            .collect::<Result<Vec<_>>>()?;

        Ok(Receiver {
            name: self.name.clone(),
            send_resolved: self.send_resolved,
            channels,
        })
    }
}

/// A built receiver, ready for dispatch.
#[derive(Debug, Clone)]
pub struct Receiver {
    name: String,
    send_resolved: bool,
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Receiver {
    /// Assembles a receiver from already-built channels.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        send_resolved: bool,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> Self {
        Self {
            name: name.into(),
            send_resolved,
            channels,
        }
    }

    /// The name routes refer to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether resolution-only notifications are delivered.
    #[must_use]
    pub const fn send_resolved(&self) -> bool {
        self.send_resolved
    }

    /// The channels tried in order.
    #[must_use]
    pub fn channels(&self) -> &[Arc<dyn NotificationChannel>] {
        &self.channels
    }
}
