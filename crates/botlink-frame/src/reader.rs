use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and resynchronization internally — callers only
/// ever see complete, checksum-verified frames, or a framing error to
/// count. `poll_frame` performs at most one underlying read per call so
/// the loop above it can observe shutdown between reads (and so a
/// half-duplex guard wraps exactly one syscall).
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Try to produce the next frame, reading at most once.
    ///
    /// Returns `Ok(None)` when no complete frame is available yet — either
    /// the buffer is short or the read timed out. Framing errors
    /// (`ChecksumMismatch`, `LengthOutOfRange`) surface once per corrupt
    /// frame while the stream resynchronizes; they are not fatal. EOF maps
    /// to `ConnectionClosed`.
    pub fn poll_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
            return Ok(Some(frame));
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.inner.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(None),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(None)
            }
            Err(err) => return Err(FrameError::Io(err)),
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.buf.extend_from_slice(&chunk[..read]);
        decode_frame(&mut self.buf, self.config.max_payload_size)
    }

    /// Read the next complete frame (blocking).
    ///
    /// Framing errors are skipped silently; use `poll_frame` where they
    /// need to be counted.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match self.poll_frame() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => continue,
                Err(err) if err.is_framing() => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Number of buffered bytes not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
