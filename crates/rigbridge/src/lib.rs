//! # rigbridge -- radio control plane for logging stations
//!
//! `rigbridge` discovers, connects to, and continuously mirrors the state
//! of amateur-radio transceivers and station accessories, while bridging
//! the binary UDP protocol spoken by digital-mode decoders (WSJT-X and
//! compatible forks). Logging frontends attach to one event hub and get a
//! consistent, ordered view of every device without touching a vendor
//! protocol.
//!
//! ## Architecture
//!
//! The workspace is organized as focused crates:
//!
//! | Crate                 | Purpose                                         |
//! |-----------------------|-------------------------------------------------|
//! | `rigbridge-core`      | Traits ([`ProtocolAdapter`]), types, errors     |
//! | `rigbridge-discovery` | Device registry + passive UDP discovery         |
//! | `rigbridge-socket`    | Socket transceiver adapter                      |
//! | `rigbridge-native`    | Natively-linked rig library adapter             |
//! | `rigbridge-accessory` | Line-protocol accessory adapter                 |
//! | `rigbridge-control`   | Supervisor, event hub, CW keyer, config         |
//! | `rigbridge-wsjtx`     | Digital-mode UDP bridge                         |
//! | **`rigbridge`**       | This facade crate -- re-exports everything      |
//!
//! ## Control flow
//!
//! Discovery listeners populate the [`DeviceRegistry`]; a connect request
//! hands a descriptor to a [`Supervisor`], which drives the family's
//! adapter through connect/retry/monitor. Wire-observed deltas update the
//! canonical [`RadioState`] and fan out through the [`EventHub`], which
//! also answers rehydration on attach. The digital-mode bridge runs
//! independently and feeds decoded facts into the same hub.
//!
//! ## Event subscription
//!
//! ```no_run
//! use std::sync::Arc;
//! use rigbridge::{BridgeEvent, EventHub};
//!
//! # async fn example() {
//! let hub = Arc::new(EventHub::new());
//! let mut sub = hub.attach(); // starts with a full-state snapshot
//! loop {
//!     match sub.recv().await {
//!         BridgeEvent::StateChanged { id, state } => {
//!             println!("{id}: {} Hz {}", state.frequency_hz, state.mode);
//!         }
//!         event => println!("{event:?}"),
//!     }
//! }
//! # }
//! ```

pub use rigbridge_core::*;

pub use rigbridge_control::{
    CwKeyer, CwOutcome, DeviceConfig, DigimodeConfig, DiscoveryConfig, EventHub, StationConfig,
    SubscriberHandle, Supervisor, SupervisorConfig, SupervisorHandle,
};
pub use rigbridge_discovery::{
    DeviceRegistry, DiscoveryAnnouncement, DiscoveryListener, DiscoveryRecord, ListenerConfig,
};
pub use rigbridge_wsjtx::{BridgeConfig, DigitalModeBridge};

/// Socket transceiver adapter (persistent duplex text protocol).
#[cfg(feature = "socket")]
pub mod socket {
    pub use rigbridge_socket::SocketAdapter;
}

/// Natively-linked rig adapter (synchronous library behind a poll worker).
#[cfg(feature = "native")]
pub mod native {
    pub use rigbridge_native::{NativeRigAdapter, RigBackend, RigSnapshot};
}

/// Line-protocol accessory adapter (`C<seq>`/`R<seq>` framing).
#[cfg(feature = "accessory")]
pub mod accessory {
    pub use rigbridge_accessory::{AccessoryAdapter, Ack};
}
