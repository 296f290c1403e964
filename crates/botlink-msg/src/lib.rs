//! Typed messages and the topic registry.
//!
//! Every topic on the robot link carries one fixed-layout little-endian
//! binary record. This crate owns those record types, their payload
//! codecs (`decode(encode(m)) == m` for every valid message), and the
//! immutable [`TopicRegistry`] pairing numeric wire ids with pub/sub
//! channel names.

pub mod error;
pub mod registry;
pub mod types;
pub mod wire;

pub use error::{CodecError, ConfigError};
pub use registry::{channel, topic_id, Direction, Topic, TopicRegistry};
pub use types::{
    AnalogIn, Apriltag, ApriltagArray, Encoders, Imu, Message, MessageKind, MotorPwm, MotorVel,
    Pose2D, Pose3D, Timesync, Twist2D, WireSize,
};
