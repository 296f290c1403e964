//! Serial link endpoint abstraction.
//!
//! The bridge talks to the robot over a single exclusively-owned byte
//! stream. In production that is a tty character device; for development
//! and tests the same code runs against a Unix socket path. Either way the
//! caller gets a [`LinkStream`] — `Read + Write` with bounded read
//! timeouts — and never touches the underlying endpoint type.

pub mod error;
pub mod serial;

pub use error::{LinkError, Result};
pub use serial::{LinkStream, SerialLink, DEFAULT_BAUD};
