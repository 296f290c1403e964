//! Pub/sub bus endpoints.
//!
//! The bridge is one publisher/subscriber among others on a named-channel
//! bus. [`UdpmBus`] speaks the LCM udpm short-message format over UDP
//! multicast — the transport the rest of the robot stack already uses —
//! and [`LoopbackBus`] is an in-process hub with the same surface for
//! tests and demos. Code above this crate only sees the [`Bus`] trait.

pub mod endpoint;
pub mod error;
pub mod loopback;
pub mod udpm;

pub use endpoint::{Bus, BusMessage};
pub use error::{BusError, Result};
pub use loopback::{LoopbackBus, LoopbackHub};
pub use udpm::{UdpmBus, DEFAULT_UDPM_URL};
