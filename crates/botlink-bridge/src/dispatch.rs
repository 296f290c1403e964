use std::sync::Arc;

use botlink_msg::{Direction, MessageKind, Topic, TopicRegistry};

/// Per-frame routing failures. Non-fatal: the offending frame or message
/// is dropped and reported, processing continues.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A frame arrived with a topic id the registry does not know.
    #[error("unknown topic id {0}")]
    UnknownTopic(u16),

    /// A bus message arrived on a channel the registry does not know.
    #[error("unknown channel {0:?}")]
    UnknownChannel(String),
}

/// Runtime topic id ↔ channel name routing.
///
/// Built once from the registry at startup; read-only afterwards, so both
/// bridge flows share it without locking.
pub struct DispatchTable {
    registry: Arc<TopicRegistry>,
}

impl DispatchTable {
    pub fn new(registry: Arc<TopicRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve an inbound frame's topic id to its registry entry.
    pub fn route_inbound(&self, topic_id: u16) -> Result<&Topic, DispatchError> {
        self.registry
            .lookup_by_id(topic_id)
            .ok_or(DispatchError::UnknownTopic(topic_id))
    }

    /// Resolve an outbound bus message's channel to its registry entry.
    pub fn route_outbound(&self, channel: &str) -> Result<&Topic, DispatchError> {
        self.registry
            .lookup_by_name(channel)
            .ok_or_else(|| DispatchError::UnknownChannel(channel.to_string()))
    }

    /// The channels the bridge subscribes to: device-bound topics, minus
    /// timesync (timer-driven, not subscription-driven).
    pub fn subscriptions(&self) -> impl Iterator<Item = &Topic> {
        self.registry
            .iter()
            .filter(|t| t.direction == Direction::ToDevice && t.kind != MessageKind::Timesync)
    }

    /// The timer-driven timesync topic, if the registry carries one.
    pub fn timesync(&self) -> Option<Topic> {
        self.registry
            .iter()
            .find(|t| t.kind == MessageKind::Timesync && t.direction == Direction::ToDevice)
            .copied()
    }

    /// The registry this table was built from.
    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use botlink_msg::{channel, topic_id};

    use super::*;

    fn table() -> DispatchTable {
        DispatchTable::new(Arc::new(TopicRegistry::mbot().unwrap()))
    }

    #[test]
    fn inbound_routes_to_channel() {
        let table = table();
        let topic = table.route_inbound(topic_id::ODOMETRY).unwrap();
        assert_eq!(topic.channel, channel::ODOMETRY);
        assert_eq!(topic.kind, MessageKind::Pose2D);
    }

    #[test]
    fn outbound_routes_to_id() {
        let table = table();
        let topic = table.route_outbound(channel::VEL_CMD).unwrap();
        assert_eq!(topic.id, topic_id::VEL_CMD);
    }

    #[test]
    fn unknown_topic_is_reported() {
        let err = table().route_inbound(0xDE).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTopic(0xDE)));
    }

    #[test]
    fn unknown_channel_is_reported() {
        let err = table().route_outbound("MBOT_NOPE").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownChannel(name) if name == "MBOT_NOPE"));
    }

    #[test]
    fn subscriptions_are_device_bound_minus_timesync() {
        let table = table();
        let channels: Vec<&str> = table.subscriptions().map(|t| t.channel).collect();
        assert_eq!(
            channels,
            vec![
                channel::ODOMETRY_RESET,
                channel::VEL_CMD,
                channel::ENCODERS_RESET,
                channel::MOTOR_PWM_CMD,
                channel::MOTOR_VEL_CMD,
            ]
        );
    }

    #[test]
    fn timesync_topic_is_found() {
        let topic = table().timesync().unwrap();
        assert_eq!(topic.id, topic_id::TIMESYNC);
        assert_eq!(topic.channel, channel::TIMESYNC);
    }
}
