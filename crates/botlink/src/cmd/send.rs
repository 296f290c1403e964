use botlink_bus::{Bus, UdpmBus};
use botlink_msg::{
    AnalogIn, ApriltagArray, Encoders, Imu, Message, MessageKind, MotorPwm, MotorVel, Pose2D,
    Timesync, TopicRegistry, Twist2D,
};

use crate::cmd::SendArgs;
use crate::exit::{
    bus_error, config_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE,
};
use crate::output::OutputFormat;

pub fn run(args: SendArgs, _format: OutputFormat) -> CliResult<i32> {
    let registry = TopicRegistry::mbot().map_err(|err| config_error("registry", err))?;
    let topic = registry
        .lookup_by_name(&args.channel)
        .ok_or_else(|| CliError::new(USAGE, format!("unknown channel: {}", args.channel)))?;

    let body = match (&args.json, &args.file) {
        (Some(json), None) => json.clone(),
        (None, Some(path)) => {
            std::fs::read_to_string(path).map_err(|err| io_error("read payload file", err))?
        }
        _ => return Err(CliError::new(USAGE, "provide exactly one of --json/--file")),
    };

    let message = message_from_json(topic.kind, &body).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("body does not match the {} schema: {err}", topic.kind),
        )
    })?;

    let bus = UdpmBus::open(&args.bus).map_err(|err| bus_error("bus open failed", err))?;
    bus.publish(topic.channel, &message.encode())
        .map_err(|err| bus_error("publish failed", err))?;

    Ok(SUCCESS)
}

fn message_from_json(kind: MessageKind, body: &str) -> serde_json::Result<Message> {
    Ok(match kind {
        MessageKind::Timesync => Message::Timesync(serde_json::from_str::<Timesync>(body)?),
        MessageKind::Pose2D => Message::Pose2D(serde_json::from_str::<Pose2D>(body)?),
        MessageKind::Twist2D => Message::Twist2D(serde_json::from_str::<Twist2D>(body)?),
        MessageKind::MotorPwm => Message::MotorPwm(serde_json::from_str::<MotorPwm>(body)?),
        MessageKind::MotorVel => Message::MotorVel(serde_json::from_str::<MotorVel>(body)?),
        MessageKind::Imu => Message::Imu(serde_json::from_str::<Imu>(body)?),
        MessageKind::Encoders => Message::Encoders(serde_json::from_str::<Encoders>(body)?),
        MessageKind::AnalogIn => Message::AnalogIn(serde_json::from_str::<AnalogIn>(body)?),
        MessageKind::ApriltagArray => {
            Message::ApriltagArray(serde_json::from_str::<ApriltagArray>(body)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_decodes_into_the_channel_schema() {
        let message = message_from_json(
            MessageKind::Twist2D,
            r#"{"utime":0,"vx":0.2,"vy":0.0,"wz":-0.4}"#,
        )
        .unwrap();
        assert!(matches!(message, Message::Twist2D(_)));
        assert_eq!(message.encode().len(), 20);
    }

    #[test]
    fn mismatched_body_is_rejected() {
        let result = message_from_json(MessageKind::Twist2D, r#"{"utime":0,"x":1.0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn apriltag_body_roundtrips() {
        let body = r#"{
            "utime": 5,
            "detections": [
                {"tag_id": 3, "pose": {"x": 0.1, "y": 0.2, "z": 0.9,
                 "angles_rpy": [0.0, 0.0, 0.0],
                 "angles_quat": [1.0, 0.0, 0.0, 0.0]}}
            ]
        }"#;
        let message = message_from_json(MessageKind::ApriltagArray, body).unwrap();
        assert_eq!(message.encode().len(), 12 + 44);
    }
}
