use serde::{Deserialize, Serialize};

/// Host/device shared time base. Timer-driven host→device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timesync {
    /// Microseconds since the Unix epoch on the host clock.
    pub utime: i64,
}

/// Planar pose estimate (odometry) or pose command (odometry reset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub utime: i64,
    pub x: f32,
    pub y: f32,
    pub theta: f32,
}

/// Planar body velocity, measured or commanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist2D {
    pub utime: i64,
    pub vx: f32,
    pub vy: f32,
    pub wz: f32,
}

/// Per-motor PWM duty cycles, measured or commanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorPwm {
    pub utime: i64,
    pub pwm: [f32; 3],
}

/// Per-motor wheel velocities (rad/s), measured or commanded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorVel {
    pub utime: i64,
    pub velocity: [f32; 3],
}

/// Full IMU sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub utime: i64,
    pub gyro: [f32; 3],
    pub accel: [f32; 3],
    pub mag: [f32; 3],
    pub angles_rpy: [f32; 3],
    pub angles_quat: [f32; 4],
    pub temp: f32,
}

/// Wheel encoder counts; also the encoder-reset command record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Encoders {
    pub utime: i64,
    pub ticks: [i64; 3],
    pub delta_ticks: [i32; 3],
    /// Microseconds covered by `delta_ticks`.
    pub delta_time: i32,
}

/// Analog input readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalogIn {
    pub utime: i64,
    pub volts: [f32; 4],
}

/// 3D pose of a detected tag in the camera frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub angles_rpy: [f32; 3],
    pub angles_quat: [f32; 4],
}

/// One apriltag detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Apriltag {
    pub tag_id: i32,
    pub pose: Pose3D,
}

/// All tags detected in one camera frame.
///
/// The registry's one variable-length topic: the wire record carries an
/// explicit detection count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApriltagArray {
    pub utime: i64,
    pub detections: Vec<Apriltag>,
}

/// Names one payload schema.
///
/// Several topics share a schema (a reset command carries the same record
/// as the telemetry it resets), so topics reference kinds rather than
/// owning layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Timesync,
    Pose2D,
    Twist2D,
    MotorPwm,
    MotorVel,
    Imu,
    Encoders,
    AnalogIn,
    ApriltagArray,
}

/// Expected payload byte length for a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSize {
    /// Exact payload length.
    Fixed(usize),
    /// Count-prefixed array; length must match `header + count * element`.
    Variable,
}

impl MessageKind {
    /// Schema name as it appears in diagnostics and spy output.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Timesync => "timesync",
            MessageKind::Pose2D => "pose2d",
            MessageKind::Twist2D => "twist2d",
            MessageKind::MotorPwm => "motor_pwm",
            MessageKind::MotorVel => "motor_vel",
            MessageKind::Imu => "imu",
            MessageKind::Encoders => "encoders",
            MessageKind::AnalogIn => "analog_in",
            MessageKind::ApriltagArray => "apriltag_array",
        }
    }

    /// Expected payload size on the wire.
    pub fn wire_size(self) -> WireSize {
        match self {
            MessageKind::Timesync => WireSize::Fixed(crate::wire::TIMESYNC_SIZE),
            MessageKind::Pose2D => WireSize::Fixed(crate::wire::POSE2D_SIZE),
            MessageKind::Twist2D => WireSize::Fixed(crate::wire::TWIST2D_SIZE),
            MessageKind::MotorPwm => WireSize::Fixed(crate::wire::MOTOR_PWM_SIZE),
            MessageKind::MotorVel => WireSize::Fixed(crate::wire::MOTOR_VEL_SIZE),
            MessageKind::Imu => WireSize::Fixed(crate::wire::IMU_SIZE),
            MessageKind::Encoders => WireSize::Fixed(crate::wire::ENCODERS_SIZE),
            MessageKind::AnalogIn => WireSize::Fixed(crate::wire::ANALOG_IN_SIZE),
            MessageKind::ApriltagArray => WireSize::Variable,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded, typed message for exactly one topic schema.
///
/// Constructed by `decode` (inbound) or by the application (outbound),
/// consumed once by the next stage, then discarded.
///
/// Serializes untagged (the bare record); deserialization goes through
/// the concrete record types, where the schema is already known.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Timesync(Timesync),
    Pose2D(Pose2D),
    Twist2D(Twist2D),
    MotorPwm(MotorPwm),
    MotorVel(MotorVel),
    Imu(Imu),
    Encoders(Encoders),
    AnalogIn(AnalogIn),
    ApriltagArray(ApriltagArray),
}

impl Message {
    /// The schema this message belongs to.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Timesync(_) => MessageKind::Timesync,
            Message::Pose2D(_) => MessageKind::Pose2D,
            Message::Twist2D(_) => MessageKind::Twist2D,
            Message::MotorPwm(_) => MessageKind::MotorPwm,
            Message::MotorVel(_) => MessageKind::MotorVel,
            Message::Imu(_) => MessageKind::Imu,
            Message::Encoders(_) => MessageKind::Encoders,
            Message::AnalogIn(_) => MessageKind::AnalogIn,
            Message::ApriltagArray(_) => MessageKind::ApriltagArray,
        }
    }

    /// The message timestamp (every schema leads with one).
    pub fn utime(&self) -> i64 {
        match self {
            Message::Timesync(m) => m.utime,
            Message::Pose2D(m) => m.utime,
            Message::Twist2D(m) => m.utime,
            Message::MotorPwm(m) => m.utime,
            Message::MotorVel(m) => m.utime,
            Message::Imu(m) => m.utime,
            Message::Encoders(m) => m.utime,
            Message::AnalogIn(m) => m.utime,
            Message::ApriltagArray(m) => m.utime,
        }
    }
}
