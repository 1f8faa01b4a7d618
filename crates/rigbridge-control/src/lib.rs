//! rigbridge-control: the control plane proper.
//!
//! - [`EventHub`] -- fan-out of state deltas to any number of subscribers,
//!   with full-state rehydration on attach
//! - [`Supervisor`] -- per-device connection state machine driving an
//!   adapter through connect/retry/monitor
//! - [`CwKeyer`] -- per-device serialization of CW keying requests
//! - [`StationConfig`] -- the settings file read at startup

pub mod config;
pub mod hub;
pub mod keyer;
pub mod supervisor;

pub use config::{DeviceConfig, DigimodeConfig, DiscoveryConfig, StationConfig};
pub use hub::{EventHub, SubscriberHandle};
pub use keyer::{CwKeyer, CwOutcome};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
