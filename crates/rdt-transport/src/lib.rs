//! # rdt-transport
//!
//! Reliable byte delivery over a link that may lose, corrupt, delay, or
//! reorder packets.
//!
//! A [`sender::Sender`] slices application messages into fixed-size packets,
//! numbers them in a small modulo sequence space and keeps at most a window's
//! worth in flight. A [`receiver::Receiver`] validates what arrives, acks every
//! valid packet and hands payloads upward exactly once, in order.
//!
//! Both peers are pure state machines: the caller feeds one event at a time
//! (upper-layer send, lower-layer arrival, timer expiry) and drains the
//! resulting events. Nothing here owns a socket, a thread, or a clock.
//!
//! ## Crate structure
//!
//! - [`config`]: Protocol constants and validated [`config::ProtocolConfig`]
//! - [`wire`]: Fixed-capacity packet layout and validation
//! - [`checksum`]: 16-bit ones-complement payload checksum
//! - [`window`]: Modulo sequence arithmetic and the `[begin, end]` window
//! - [`stats`]: Per-peer counters
//! - [`sender`]: Sender state machine
//! - [`receiver`]: Receiver state machine

pub mod checksum;
pub mod config;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod window;
pub mod wire;

pub use config::{ConfigError, ProtocolConfig};
pub use receiver::{Receiver, ReceiverEvent};
pub use sender::{Sender, SenderEvent};
pub use wire::{Packet, Rejection};
