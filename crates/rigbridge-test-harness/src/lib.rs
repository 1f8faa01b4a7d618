//! rigbridge-test-harness: mock network peers for protocol tests.
//!
//! Deterministic stand-ins for real devices so adapter and listener tests
//! run without hardware or network infrastructure:
//!
//! - [`MockLineServer`] -- a TCP peer speaking newline-delimited text,
//!   driven explicitly from the test body
//! - [`send_datagrams`] -- fire UDP datagrams at a local port

pub mod mock_tcp;
pub mod mock_udp;

pub use mock_tcp::{LinePeer, MockLineServer};
pub use mock_udp::{send_datagrams, send_datagrams_from};
