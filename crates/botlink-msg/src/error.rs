use crate::types::MessageKind;

/// Errors from payload encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload byte length disagrees with the schema.
    ///
    /// For fixed schemas `expected` is the schema size; for the array
    /// topic it is the size implied by the embedded count.
    #[error("schema mismatch for {kind}: expected {expected} bytes, got {actual}")]
    SchemaMismatch {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },

    /// The array topic's embedded count is outside the legal range.
    #[error("count out of range for {kind}: {count} (max {max})")]
    CountOutOfRange {
        kind: MessageKind,
        count: i32,
        max: usize,
    },
}

/// Fatal registry configuration errors, detected at construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Two registry entries share a numeric topic id.
    #[error("duplicate topic id {id}: {channel} collides with {existing}")]
    DuplicateTopicId {
        id: u16,
        channel: &'static str,
        existing: &'static str,
    },

    /// Two registry entries share a channel name.
    #[error("duplicate channel {channel}: id {id} collides with id {existing}")]
    DuplicateChannel {
        channel: &'static str,
        id: u16,
        existing: u16,
    },
}
