use std::collections::HashMap;

use serde::Serialize;

use crate::error::ConfigError;
use crate::types::MessageKind;

/// Numeric wire ids, as assigned by the device firmware.
pub mod topic_id {
    pub const TIMESYNC: u16 = 201;
    pub const ODOMETRY: u16 = 210;
    pub const ODOMETRY_RESET: u16 = 211;
    pub const VEL_CMD: u16 = 214;
    pub const IMU: u16 = 220;
    pub const ENCODERS: u16 = 221;
    pub const ENCODERS_RESET: u16 = 222;
    pub const ANALOG_IN: u16 = 223;
    pub const MOTOR_PWM_CMD: u16 = 230;
    pub const MOTOR_VEL_CMD: u16 = 231;
    pub const MOTOR_VEL: u16 = 232;
    pub const MOTOR_PWM: u16 = 233;
    pub const VEL: u16 = 234;
    pub const APRILTAG_ARRAY: u16 = 235;
}

/// Pub/sub channel names, one per topic.
pub mod channel {
    pub const TIMESYNC: &str = "MBOT_TIMESYNC";
    pub const ODOMETRY: &str = "MBOT_ODOMETRY";
    pub const ODOMETRY_RESET: &str = "MBOT_ODOMETRY_RESET";
    pub const VEL_CMD: &str = "MBOT_VEL_CMD";
    pub const IMU: &str = "MBOT_IMU";
    pub const ENCODERS: &str = "MBOT_ENCODERS";
    pub const ENCODERS_RESET: &str = "MBOT_ENCODERS_RESET";
    pub const ANALOG_IN: &str = "MBOT_ANALOG_IN";
    pub const MOTOR_PWM_CMD: &str = "MBOT_MOTOR_PWM_CMD";
    pub const MOTOR_VEL_CMD: &str = "MBOT_MOTOR_VEL_CMD";
    pub const MOTOR_VEL: &str = "MBOT_MOTOR_VEL";
    pub const MOTOR_PWM: &str = "MBOT_MOTOR_PWM";
    pub const VEL: &str = "MBOT_VEL";
    pub const APRILTAG_ARRAY: &str = "MBOT_APRILTAG_ARRAY";
}

/// Which way messages on a topic normally flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Device telemetry, republished on the bus.
    ToBus,
    /// Bus commands, framed and written to the device.
    ToDevice,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ToBus => "to-bus",
            Direction::ToDevice => "to-device",
        }
    }
}

/// One registry entry: a named, numerically-identified message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    /// Numeric wire-protocol id.
    pub id: u16,
    /// Pub/sub channel name.
    pub channel: &'static str,
    /// Payload schema.
    pub kind: MessageKind,
    /// Normal flow direction.
    pub direction: Direction,
}

const fn topic(id: u16, channel: &'static str, kind: MessageKind, direction: Direction) -> Topic {
    Topic {
        id,
        channel,
        kind,
        direction,
    }
}

/// The compiled-in production table, mirroring the device firmware's
/// registry. Timesync is timer-driven on the host side; every other
/// `ToDevice` topic is subscription-driven.
const MBOT_TOPICS: &[Topic] = &[
    topic(
        topic_id::TIMESYNC,
        channel::TIMESYNC,
        MessageKind::Timesync,
        Direction::ToDevice,
    ),
    topic(
        topic_id::ODOMETRY,
        channel::ODOMETRY,
        MessageKind::Pose2D,
        Direction::ToBus,
    ),
    topic(
        topic_id::ODOMETRY_RESET,
        channel::ODOMETRY_RESET,
        MessageKind::Pose2D,
        Direction::ToDevice,
    ),
    topic(
        topic_id::VEL_CMD,
        channel::VEL_CMD,
        MessageKind::Twist2D,
        Direction::ToDevice,
    ),
    topic(topic_id::IMU, channel::IMU, MessageKind::Imu, Direction::ToBus),
    topic(
        topic_id::ENCODERS,
        channel::ENCODERS,
        MessageKind::Encoders,
        Direction::ToBus,
    ),
    topic(
        topic_id::ENCODERS_RESET,
        channel::ENCODERS_RESET,
        MessageKind::Encoders,
        Direction::ToDevice,
    ),
    topic(
        topic_id::ANALOG_IN,
        channel::ANALOG_IN,
        MessageKind::AnalogIn,
        Direction::ToBus,
    ),
    topic(
        topic_id::MOTOR_PWM_CMD,
        channel::MOTOR_PWM_CMD,
        MessageKind::MotorPwm,
        Direction::ToDevice,
    ),
    topic(
        topic_id::MOTOR_VEL_CMD,
        channel::MOTOR_VEL_CMD,
        MessageKind::MotorVel,
        Direction::ToDevice,
    ),
    topic(
        topic_id::MOTOR_VEL,
        channel::MOTOR_VEL,
        MessageKind::MotorVel,
        Direction::ToBus,
    ),
    topic(
        topic_id::MOTOR_PWM,
        channel::MOTOR_PWM,
        MessageKind::MotorPwm,
        Direction::ToBus,
    ),
    topic(topic_id::VEL, channel::VEL, MessageKind::Twist2D, Direction::ToBus),
    topic(
        topic_id::APRILTAG_ARRAY,
        channel::APRILTAG_ARRAY,
        MessageKind::ApriltagArray,
        Direction::ToBus,
    ),
];

/// Immutable id ↔ channel registry.
///
/// Both lookup maps are total and consistent by construction: duplicate
/// ids or channel names fail at build time, never per-message. Shared by
/// reference after startup; no mutation is exposed.
#[derive(Debug)]
pub struct TopicRegistry {
    topics: Vec<Topic>,
    by_id: HashMap<u16, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl TopicRegistry {
    /// Build and validate a registry from a topic table.
    pub fn new(topics: impl Into<Vec<Topic>>) -> Result<Self, ConfigError> {
        let topics = topics.into();
        let mut by_id = HashMap::with_capacity(topics.len());
        let mut by_name = HashMap::with_capacity(topics.len());

        for (index, entry) in topics.iter().enumerate() {
            if let Some(&existing) = by_id.get(&entry.id) {
                let existing: &Topic = &topics[existing];
                return Err(ConfigError::DuplicateTopicId {
                    id: entry.id,
                    channel: entry.channel,
                    existing: existing.channel,
                });
            }
            if let Some(&existing) = by_name.get(entry.channel) {
                let existing: &Topic = &topics[existing];
                return Err(ConfigError::DuplicateChannel {
                    channel: entry.channel,
                    id: entry.id,
                    existing: existing.id,
                });
            }
            by_id.insert(entry.id, index);
            by_name.insert(entry.channel, index);
        }

        Ok(Self {
            topics,
            by_id,
            by_name,
        })
    }

    /// The compiled-in MBot table.
    pub fn mbot() -> Result<Self, ConfigError> {
        Self::new(MBOT_TOPICS)
    }

    /// Resolve a numeric wire id.
    pub fn lookup_by_id(&self, id: u16) -> Option<&Topic> {
        self.by_id.get(&id).map(|&index| &self.topics[index])
    }

    /// Resolve a channel name.
    pub fn lookup_by_name(&self, channel: &str) -> Option<&Topic> {
        self.by_name.get(channel).map(|&index| &self.topics[index])
    }

    /// Iterate entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
