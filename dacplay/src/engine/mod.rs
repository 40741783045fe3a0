//! The real-time streaming engine: ping-pong buffers, the sample clock and
//! the transport state machine that owns them.

pub mod buffer;
pub mod catalog;
pub mod clock;
pub mod controller;
pub mod session;
