//! Fixed-layout payload codecs.
//!
//! Little-endian throughout, matching the device's native order. Records
//! are copied field by field across the byte boundary; the only
//! variable-length layout is the count-prefixed apriltag array.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::types::{
    AnalogIn, Apriltag, ApriltagArray, Encoders, Imu, Message, MessageKind, MotorPwm, MotorVel,
    Pose2D, Pose3D, Timesync, Twist2D, WireSize,
};

pub const TIMESYNC_SIZE: usize = 8;
pub const POSE2D_SIZE: usize = 20;
pub const TWIST2D_SIZE: usize = 20;
pub const MOTOR_PWM_SIZE: usize = 20;
pub const MOTOR_VEL_SIZE: usize = 20;
pub const IMU_SIZE: usize = 76;
pub const ENCODERS_SIZE: usize = 48;
pub const ANALOG_IN_SIZE: usize = 24;

/// Apriltag array record header: utime (8) + count (4).
pub const APRILTAG_ARRAY_HEADER: usize = 12;
/// One detection: tag_id (4) + pose (40).
pub const APRILTAG_SIZE: usize = 44;
/// Upper bound on detections per frame; a larger count is hostile input.
pub const MAX_DETECTIONS: usize = 32;

impl Message {
    /// Decode a payload for the given schema.
    ///
    /// Fails with `SchemaMismatch` when the byte length does not match the
    /// schema's expected length, or disagrees with the embedded count on
    /// the array topic.
    pub fn decode(kind: MessageKind, bytes: &[u8]) -> Result<Self, CodecError> {
        if let WireSize::Fixed(expected) = kind.wire_size() {
            if bytes.len() != expected {
                return Err(CodecError::SchemaMismatch {
                    kind,
                    expected,
                    actual: bytes.len(),
                });
            }
        }

        let mut buf = bytes;
        let message = match kind {
            MessageKind::Timesync => Message::Timesync(Timesync {
                utime: buf.get_i64_le(),
            }),
            MessageKind::Pose2D => Message::Pose2D(Pose2D {
                utime: buf.get_i64_le(),
                x: buf.get_f32_le(),
                y: buf.get_f32_le(),
                theta: buf.get_f32_le(),
            }),
            MessageKind::Twist2D => Message::Twist2D(Twist2D {
                utime: buf.get_i64_le(),
                vx: buf.get_f32_le(),
                vy: buf.get_f32_le(),
                wz: buf.get_f32_le(),
            }),
            MessageKind::MotorPwm => Message::MotorPwm(MotorPwm {
                utime: buf.get_i64_le(),
                pwm: get_f32_array(&mut buf),
            }),
            MessageKind::MotorVel => Message::MotorVel(MotorVel {
                utime: buf.get_i64_le(),
                velocity: get_f32_array(&mut buf),
            }),
            MessageKind::Imu => Message::Imu(Imu {
                utime: buf.get_i64_le(),
                gyro: get_f32_array(&mut buf),
                accel: get_f32_array(&mut buf),
                mag: get_f32_array(&mut buf),
                angles_rpy: get_f32_array(&mut buf),
                angles_quat: get_f32_array(&mut buf),
                temp: buf.get_f32_le(),
            }),
            MessageKind::Encoders => Message::Encoders(Encoders {
                utime: buf.get_i64_le(),
                ticks: [buf.get_i64_le(), buf.get_i64_le(), buf.get_i64_le()],
                delta_ticks: [buf.get_i32_le(), buf.get_i32_le(), buf.get_i32_le()],
                delta_time: buf.get_i32_le(),
            }),
            MessageKind::AnalogIn => Message::AnalogIn(AnalogIn {
                utime: buf.get_i64_le(),
                volts: get_f32_array(&mut buf),
            }),
            MessageKind::ApriltagArray => return decode_apriltag_array(bytes),
        };

        Ok(message)
    }

    /// Encode this message's payload into `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        match self {
            Message::Timesync(m) => {
                dst.reserve(TIMESYNC_SIZE);
                dst.put_i64_le(m.utime);
            }
            Message::Pose2D(m) => {
                dst.reserve(POSE2D_SIZE);
                dst.put_i64_le(m.utime);
                dst.put_f32_le(m.x);
                dst.put_f32_le(m.y);
                dst.put_f32_le(m.theta);
            }
            Message::Twist2D(m) => {
                dst.reserve(TWIST2D_SIZE);
                dst.put_i64_le(m.utime);
                dst.put_f32_le(m.vx);
                dst.put_f32_le(m.vy);
                dst.put_f32_le(m.wz);
            }
            Message::MotorPwm(m) => {
                dst.reserve(MOTOR_PWM_SIZE);
                dst.put_i64_le(m.utime);
                put_f32_array(dst, &m.pwm);
            }
            Message::MotorVel(m) => {
                dst.reserve(MOTOR_VEL_SIZE);
                dst.put_i64_le(m.utime);
                put_f32_array(dst, &m.velocity);
            }
            Message::Imu(m) => {
                dst.reserve(IMU_SIZE);
                dst.put_i64_le(m.utime);
                put_f32_array(dst, &m.gyro);
                put_f32_array(dst, &m.accel);
                put_f32_array(dst, &m.mag);
                put_f32_array(dst, &m.angles_rpy);
                put_f32_array(dst, &m.angles_quat);
                dst.put_f32_le(m.temp);
            }
            Message::Encoders(m) => {
                dst.reserve(ENCODERS_SIZE);
                dst.put_i64_le(m.utime);
                for tick in m.ticks {
                    dst.put_i64_le(tick);
                }
                for delta in m.delta_ticks {
                    dst.put_i32_le(delta);
                }
                dst.put_i32_le(m.delta_time);
            }
            Message::AnalogIn(m) => {
                dst.reserve(ANALOG_IN_SIZE);
                dst.put_i64_le(m.utime);
                put_f32_array(dst, &m.volts);
            }
            Message::ApriltagArray(m) => {
                dst.reserve(APRILTAG_ARRAY_HEADER + m.detections.len() * APRILTAG_SIZE);
                dst.put_i64_le(m.utime);
                dst.put_i32_le(m.detections.len() as i32);
                for detection in &m.detections {
                    dst.put_i32_le(detection.tag_id);
                    dst.put_f32_le(detection.pose.x);
                    dst.put_f32_le(detection.pose.y);
                    dst.put_f32_le(detection.pose.z);
                    put_f32_array(dst, &detection.pose.angles_rpy);
                    put_f32_array(dst, &detection.pose.angles_quat);
                }
            }
        }
    }

    /// Encode this message's payload as a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        self.encode_to(&mut dst);
        dst.freeze()
    }
}

fn decode_apriltag_array(bytes: &[u8]) -> Result<Message, CodecError> {
    let kind = MessageKind::ApriltagArray;
    if bytes.len() < APRILTAG_ARRAY_HEADER {
        return Err(CodecError::SchemaMismatch {
            kind,
            expected: APRILTAG_ARRAY_HEADER,
            actual: bytes.len(),
        });
    }

    let mut buf = bytes;
    let utime = buf.get_i64_le();
    let count = buf.get_i32_le();

    if count < 0 || count as usize > MAX_DETECTIONS {
        return Err(CodecError::CountOutOfRange {
            kind,
            count,
            max: MAX_DETECTIONS,
        });
    }

    let expected = APRILTAG_ARRAY_HEADER + count as usize * APRILTAG_SIZE;
    if bytes.len() != expected {
        return Err(CodecError::SchemaMismatch {
            kind,
            expected,
            actual: bytes.len(),
        });
    }

    let mut detections = Vec::with_capacity(count as usize);
    for _ in 0..count {
        detections.push(Apriltag {
            tag_id: buf.get_i32_le(),
            pose: Pose3D {
                x: buf.get_f32_le(),
                y: buf.get_f32_le(),
                z: buf.get_f32_le(),
                angles_rpy: get_f32_array(&mut buf),
                angles_quat: get_f32_array(&mut buf),
            },
        });
    }

    Ok(Message::ApriltagArray(ApriltagArray { utime, detections }))
}

fn get_f32_array<const N: usize>(buf: &mut &[u8]) -> [f32; N] {
    std::array::from_fn(|_| buf.get_f32_le())
}

fn put_f32_array(dst: &mut BytesMut, values: &[f32]) {
    for &value in values {
        dst.put_f32_le(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: Message) {
        let encoded = message.encode();
        let decoded = Message::decode(message.kind(), &encoded).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn timesync_roundtrip() {
        roundtrip(Message::Timesync(Timesync {
            utime: 1_723_651_200_000_017,
        }));
    }

    #[test]
    fn pose2d_roundtrip_and_size() {
        let message = Message::Pose2D(Pose2D {
            utime: 42,
            x: 1.25,
            y: -0.5,
            theta: 3.1,
        });
        assert_eq!(message.encode().len(), POSE2D_SIZE);
        roundtrip(message);
    }

    #[test]
    fn twist2d_roundtrip() {
        roundtrip(Message::Twist2D(Twist2D {
            utime: 7,
            vx: 0.3,
            vy: 0.0,
            wz: -1.2,
        }));
    }

    #[test]
    fn motor_records_roundtrip() {
        roundtrip(Message::MotorPwm(MotorPwm {
            utime: 9,
            pwm: [0.5, -0.5, 0.0],
        }));
        roundtrip(Message::MotorVel(MotorVel {
            utime: 10,
            velocity: [6.1, -6.1, 0.0],
        }));
    }

    #[test]
    fn imu_roundtrip_and_size() {
        let message = Message::Imu(Imu {
            utime: 11,
            gyro: [0.01, -0.02, 0.03],
            accel: [0.0, 0.0, 9.81],
            mag: [22.0, -4.0, 41.0],
            angles_rpy: [0.1, 0.2, 0.3],
            angles_quat: [1.0, 0.0, 0.0, 0.0],
            temp: 36.5,
        });
        assert_eq!(message.encode().len(), IMU_SIZE);
        roundtrip(message);
    }

    #[test]
    fn encoders_roundtrip_and_size() {
        let message = Message::Encoders(Encoders {
            utime: 12,
            ticks: [1_000_000, -1_000_000, 0],
            delta_ticks: [15, -15, 2],
            delta_time: 20_000,
        });
        assert_eq!(message.encode().len(), ENCODERS_SIZE);
        roundtrip(message);
    }

    #[test]
    fn analog_in_roundtrip() {
        roundtrip(Message::AnalogIn(AnalogIn {
            utime: 13,
            volts: [3.3, 5.0, 0.0, 1.8],
        }));
    }

    #[test]
    fn apriltag_array_roundtrip() {
        let detection = Apriltag {
            tag_id: 7,
            pose: Pose3D {
                x: 0.1,
                y: 0.2,
                z: 1.5,
                angles_rpy: [0.0, 0.1, 0.2],
                angles_quat: [1.0, 0.0, 0.0, 0.0],
            },
        };
        let message = Message::ApriltagArray(ApriltagArray {
            utime: 14,
            detections: vec![detection, detection],
        });
        assert_eq!(
            message.encode().len(),
            APRILTAG_ARRAY_HEADER + 2 * APRILTAG_SIZE
        );
        roundtrip(message);
    }

    #[test]
    fn empty_apriltag_array_roundtrips() {
        roundtrip(Message::ApriltagArray(ApriltagArray {
            utime: 15,
            detections: Vec::new(),
        }));
    }

    #[test]
    fn fixed_schema_rejects_wrong_length() {
        let err = Message::decode(MessageKind::Pose2D, &[0u8; 19]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::SchemaMismatch {
                kind: MessageKind::Pose2D,
                expected: POSE2D_SIZE,
                actual: 19,
            }
        ));
    }

    #[test]
    fn truncated_apriltag_header_rejected() {
        let err = Message::decode(MessageKind::ApriltagArray, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, CodecError::SchemaMismatch { actual: 8, .. }));
    }

    #[test]
    fn apriltag_count_inconsistent_with_length_rejected() {
        let mut dst = BytesMut::new();
        dst.put_i64_le(16);
        dst.put_i32_le(2); // claims two detections, carries none
        let err = Message::decode(MessageKind::ApriltagArray, &dst).unwrap_err();
        assert!(matches!(
            err,
            CodecError::SchemaMismatch {
                expected,
                actual: APRILTAG_ARRAY_HEADER,
                ..
            } if expected == APRILTAG_ARRAY_HEADER + 2 * APRILTAG_SIZE
        ));
    }

    #[test]
    fn hostile_apriltag_count_rejected() {
        let mut dst = BytesMut::new();
        dst.put_i64_le(17);
        dst.put_i32_le(10_000);
        let err = Message::decode(MessageKind::ApriltagArray, &dst).unwrap_err();
        assert!(matches!(
            err,
            CodecError::CountOutOfRange { count: 10_000, .. }
        ));

        let mut dst = BytesMut::new();
        dst.put_i64_le(18);
        dst.put_i32_le(-1);
        let err = Message::decode(MessageKind::ApriltagArray, &dst).unwrap_err();
        assert!(matches!(err, CodecError::CountOutOfRange { count: -1, .. }));
    }

    #[test]
    fn kind_and_utime_accessors() {
        let message = Message::Twist2D(Twist2D {
            utime: 99,
            vx: 0.0,
            vy: 0.0,
            wz: 0.0,
        });
        assert_eq!(message.kind(), MessageKind::Twist2D);
        assert_eq!(message.utime(), 99);
    }

    #[test]
    fn declared_sizes_match_encoders() {
        let cases = [
            (Message::Timesync(Timesync::default()), TIMESYNC_SIZE),
            (Message::Pose2D(Pose2D::default()), POSE2D_SIZE),
            (Message::Twist2D(Twist2D::default()), TWIST2D_SIZE),
            (Message::MotorPwm(MotorPwm::default()), MOTOR_PWM_SIZE),
            (Message::MotorVel(MotorVel::default()), MOTOR_VEL_SIZE),
            (Message::Imu(Imu::default()), IMU_SIZE),
            (Message::Encoders(Encoders::default()), ENCODERS_SIZE),
            (Message::AnalogIn(AnalogIn::default()), ANALOG_IN_SIZE),
        ];
        for (message, size) in cases {
            assert_eq!(message.encode().len(), size, "{}", message.kind());
            assert_eq!(message.kind().wire_size(), WireSize::Fixed(size));
        }
    }
}
