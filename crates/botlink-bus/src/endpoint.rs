use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// One message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The channel it was published on.
    pub channel: String,
    /// The payload, in the bus's content representation.
    pub payload: Bytes,
}

/// A connected pub/sub bus endpoint.
///
/// Subscriptions are owned by the transport; the endpoint only sees
/// messages on channels it subscribed to. `recv_timeout` bounds every
/// wait so callers can observe shutdown between messages.
pub trait Bus: Send + Sync {
    /// Subscribe to one channel.
    fn subscribe(&self, channel: &str) -> Result<()>;

    /// Subscribe to every channel (spy tooling).
    fn subscribe_all(&self) -> Result<()>;

    /// Publish a payload on a channel.
    fn publish(&self, channel: &str, payload: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for the next subscribed message.
    ///
    /// Returns `Ok(None)` when the timeout elapses with nothing to
    /// deliver.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<BusMessage>>;
}

/// Channel filter shared by the endpoint implementations.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSet {
    all: bool,
    channels: HashSet<String>,
}

impl SubscriptionSet {
    pub(crate) fn insert(&mut self, channel: &str) {
        self.channels.insert(channel.to_string());
    }

    pub(crate) fn insert_all(&mut self) {
        self.all = true;
    }

    pub(crate) fn matches(&self, channel: &str) -> bool {
        self.all || self.channels.contains(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_set_filters() {
        let mut subs = SubscriptionSet::default();
        assert!(!subs.matches("MBOT_ODOMETRY"));

        subs.insert("MBOT_ODOMETRY");
        assert!(subs.matches("MBOT_ODOMETRY"));
        assert!(!subs.matches("MBOT_IMU"));

        subs.insert_all();
        assert!(subs.matches("MBOT_IMU"));
    }
}
