use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::checksum::fletcher16;
use crate::error::{FrameError, Result};

/// Sync marker opening every frame.
///
/// Chosen so neither byte collides with the little-endian lead byte of a
/// registered topic id, which bounds resynchronization cost after a
/// corrupt frame.
pub const SYNC: [u8; 2] = [0xA5, 0x5A];

/// Frame header after the marker: topic (2) + length (2) = 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// Checksum trailer: Fletcher-16, little-endian.
pub const TRAILER_SIZE: usize = 2;

/// Total per-frame overhead: marker + header + trailer.
pub const FRAME_OVERHEAD: usize = SYNC.len() + HEADER_SIZE + TRAILER_SIZE;

/// Default maximum payload size.
///
/// The largest registered schema is the bounded apriltag array at 1420
/// bytes; 2048 admits it with margin while keeping buffering and
/// resynchronization cost small on a low-bandwidth link.
pub const DEFAULT_MAX_PAYLOAD: usize = 2048;

/// One complete, checksum-verified unit of the serial wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Numeric topic id from the registry.
    pub topic: u16,
    /// Raw payload bytes, not yet schema-decoded.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(topic: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (overhead + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬───────────┬───────────┬──────────────────┬────────────┐
/// │ Sync (2B)  │ Topic     │ Length    │ Payload          │ Checksum   │
/// │ 0xA5 0x5A  │ (2B LE)   │ (2B LE)   │ (Length bytes)   │ (2B LE)    │
/// └────────────┴───────────┴───────────┴──────────────────┴────────────┘
/// ```
/// The checksum covers topic, length, and payload.
pub fn encode_frame(topic: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u16::MAX as usize,
        });
    }

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_slice(&SYNC);
    let body_start = dst.len();
    dst.put_u16_le(topic);
    dst.put_u16_le(payload.len() as u16);
    dst.put_slice(payload);
    let sum = fletcher16(&dst[body_start..]);
    dst.put_u16_le(sum);
    Ok(())
}

/// Decode the next frame from a sliding stream buffer.
///
/// Returns `Ok(None)` when the buffer holds no complete frame yet; bytes
/// preceding the next marker are discarded. On a framing error
/// (`LengthOutOfRange`, `ChecksumMismatch`) the marker is consumed so the
/// next call rescans from inside the bad frame — the error is returned for
/// accounting but the stream stays usable. A corrupt frame is therefore
/// never yielded, and resynchronization is bounded by the corrupt frame's
/// length plus the marker size.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    match find_sync(src) {
        Some(0) => {}
        Some(pos) => {
            trace!(discarded = pos, "skipped bytes before sync marker");
            src.advance(pos);
        }
        None => {
            // Keep a possible marker prefix at the tail for the next read.
            let keep = usize::from(src.last() == Some(&SYNC[0]));
            let drop = src.len() - keep;
            if drop > 0 {
                trace!(discarded = drop, "no sync marker in buffer");
                src.advance(drop);
            }
            return Ok(None);
        }
    }

    if src.len() < SYNC.len() + HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let topic = u16::from_le_bytes([src[2], src[3]]);
    let payload_len = usize::from(u16::from_le_bytes([src[4], src[5]]));

    if payload_len > max_payload {
        src.advance(SYNC.len());
        return Err(FrameError::LengthOutOfRange {
            topic,
            len: payload_len,
            max: max_payload,
        });
    }

    let body_end = SYNC.len() + HEADER_SIZE + payload_len;
    if src.len() < body_end + TRAILER_SIZE {
        return Ok(None); // Need more data
    }

    let expected = u16::from_le_bytes([src[body_end], src[body_end + 1]]);
    let actual = fletcher16(&src[SYNC.len()..body_end]);
    if expected != actual {
        src.advance(SYNC.len());
        return Err(FrameError::ChecksumMismatch {
            topic,
            expected,
            actual,
        });
    }

    src.advance(SYNC.len() + HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    src.advance(TRAILER_SIZE);

    Ok(Some(Frame { topic, payload }))
}

fn find_sync(src: &[u8]) -> Option<usize> {
    src.windows(SYNC.len()).position(|window| window == SYNC)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 2048.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
