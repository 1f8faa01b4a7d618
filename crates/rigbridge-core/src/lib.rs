//! rigbridge-core: Core traits, types, and error definitions for rigbridge.
//!
//! This crate defines the device-family-agnostic abstractions that the
//! discovery, adapter, and control crates build on. Logging frontends and
//! other consumers depend on these types without pulling in any specific
//! protocol driver.
//!
//! # Key types
//!
//! - [`ProtocolAdapter`] -- the unified capability trait all device
//!   families implement
//! - [`RadioDescriptor`] / [`RadioState`] -- the canonical device model
//! - [`BridgeEvent`] -- the event surface fanned out to subscribers
//! - [`Error`] / [`Result`] -- error handling

pub mod adapter;
pub mod band;
pub mod compensate;
pub mod digital;
pub mod error;
pub mod events;
pub mod types;

// Re-export key types at crate root for ergonomic `use rigbridge_core::*`.
pub use adapter::{AdapterCommand, ProtocolAdapter};
pub use band::Band;
pub use compensate::{ModeClass, compensate};
pub use digital::DigitalModeMessage;
pub use error::{Error, Result};
pub use events::BridgeEvent;
pub use types::*;
