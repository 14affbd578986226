//! Receivers, notification channels, and the retrying dispatcher.
//!
//! [`Message::render`] turns a batch of routed alerts into one
//! notification; [`Dispatcher::dispatch`] delivers it to each channel
//! of a [`Receiver`], retrying failures with capped exponential backoff
//! and jitter. The built-in channels behind [`NotificationChannel`] are
//! reference implementations that log the delivery; real transports
//! plug in at the same trait.
//!
//! ```
//! use std::sync::Arc;
//!
//! use vigil_notify::{InMemoryChannel, Receiver};
//!
//! let capture = InMemoryChannel::new("capture");
//! let receiver = Receiver::new("oncall", true, vec![Arc::new(capture.clone())]);
//!
//! assert_eq!(receiver.name(), "oncall");
//! assert!(receiver.send_resolved());
//! assert_eq!(receiver.channels().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod receiver;

pub use channel::{
    ChannelConfig, ChatChannel, ChatConfig, EmailChannel, EmailConfig, InMemoryChannel,
    NotificationChannel, PagerChannel, PagerConfig,
};
pub use dispatch::{DispatchOutcome, Dispatcher, DispatcherStats, RetryPolicy, StatsSnapshot};
pub use error::{NotifyError, Result};
pub use message::{Message, MessageStatus};
pub use receiver::{Receiver, ReceiverConfig};
