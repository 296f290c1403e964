//! The bridge: framed serial link on one side, named pub/sub channels on
//! the other.
//!
//! Inbound, frames are decoded by numeric topic id into typed payloads
//! and republished on the mapped channel; outbound, subscribed channel
//! messages are validated and framed back onto the link. The two flows
//! run concurrently and share only the read-only dispatch table. Per-
//! frame errors are counted and dropped; only startup configuration
//! errors are fatal.

pub mod bridge;
pub mod dispatch;
pub mod error;
pub mod stats;

pub use bridge::{Bridge, BridgeConfig};
pub use dispatch::{DispatchError, DispatchTable};
pub use error::BridgeError;
pub use stats::{BridgeStats, StatsSnapshot};
