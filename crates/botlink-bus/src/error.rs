/// Errors that can occur on a bus endpoint.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus URL could not be parsed.
    #[error("invalid bus url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },

    /// Failed to bind or join the multicast group.
    #[error("failed to open bus endpoint on port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// The payload does not fit in one datagram.
    #[error("bus payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The channel name is too long for the wire format.
    #[error("channel name too long ({len} bytes, max {max})")]
    ChannelTooLong { len: usize, max: usize },

    /// An I/O error occurred on the endpoint.
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;
