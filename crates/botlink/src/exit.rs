use std::fmt;
use std::io;

use botlink_bridge::BridgeError;
use botlink_bus::BusError;
use botlink_frame::FrameError;
use botlink_link::LinkError;
use botlink_msg::ConfigError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
/// sysexits EX_CONFIG: fatal registry/configuration errors at startup.
pub const CONFIG: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(CONFIG, format!("{context}: {err}"))
}

pub fn link_error(context: &str, err: LinkError) -> CliError {
    match err {
        LinkError::Open { source, .. }
        | LinkError::Connect { source, .. }
        | LinkError::Termios { source, .. }
        | LinkError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    match err {
        BusError::InvalidUrl { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        BusError::Bind { source, .. } | BusError::Io(source) => io_error(context, source),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Config(err) => config_error(context, err),
        BridgeError::Link(err) => link_error(context, err),
        BridgeError::Bus(err) => bus_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
    }
}
