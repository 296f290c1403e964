/// Errors that can end a bridge run.
///
/// Everything here is either a startup failure or the loss of a whole
/// session; per-frame and per-message errors never surface as values,
/// only as counters and log events.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Registry configuration error — fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] botlink_msg::ConfigError),

    /// Serial link error.
    #[error("link error: {0}")]
    Link(#[from] botlink_link::LinkError),

    /// Pub/sub bus error.
    #[error("bus error: {0}")]
    Bus(#[from] botlink_bus::BusError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] botlink_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
