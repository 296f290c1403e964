//! Serial wire framing for the robot link.
//!
//! Every frame on the wire is:
//! - A 2-byte sync marker for stream resynchronization
//! - A 2-byte little-endian topic id
//! - A 2-byte little-endian payload length
//! - The payload
//! - A 2-byte little-endian Fletcher-16 checksum over topic+length+payload
//!
//! The decoder is a sliding window over a continuous byte stream: garbage
//! between frames is discarded, corrupt frames are reported and skipped,
//! and a partial frame simply waits for more bytes. No partial frame is
//! ever surfaced to callers.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use checksum::fletcher16;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, FRAME_OVERHEAD,
    HEADER_SIZE, SYNC, TRAILER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
