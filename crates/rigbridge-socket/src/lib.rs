//! rigbridge-socket: adapter for transceivers controlled over a
//! persistent duplex text socket.
//!
//! The device holds one TCP connection open for its whole session.
//! Inbound lines are space-separated `key=value` state reports; outbound
//! commands are short text directives. There is no framing beyond the
//! line delimiter and no request/response pairing -- the radio simply
//! reports every state change, solicited or not, as it happens.

pub mod adapter;
pub mod codec;

pub use adapter::SocketAdapter;
