//! rigbridge-discovery: device registry and passive UDP discovery.
//!
//! Devices announce themselves with periodic UDP broadcasts. One
//! [`DiscoveryListener`] runs per supported announcement protocol; each
//! parses broadcasts into [`DiscoveryRecord`]s and upserts them into the
//! shared [`DeviceRegistry`]. A sweep task evicts records that fall silent
//! for longer than the expiry multiple of their advertised interval.
//!
//! Malformed datagrams are dropped and counted, never fatal to a listener.

pub mod listener;
pub mod record;
pub mod registry;

pub use listener::{DiscoveryListener, ListenerConfig};
pub use record::{DiscoveryAnnouncement, DiscoveryRecord};
pub use registry::DeviceRegistry;
