use std::path::PathBuf;

/// Errors that can occur on the serial link endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Failed to open a character device endpoint.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a socket endpoint.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path exists but is neither a character device nor a socket.
    #[error("unsupported link endpoint {path} (found {kind})")]
    UnsupportedEndpoint { path: PathBuf, kind: &'static str },

    /// The requested baud rate has no termios constant on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// Terminal configuration (raw mode, speed, timeouts) failed.
    #[error("termios configuration failed on {path}: {source}")]
    Termios {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the link stream.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
