//! Events fanned out through the hub to subscribers.
//!
//! Every change the plane observes becomes a [`BridgeEvent`]: devices
//! appearing and disappearing, connection lifecycle transitions, operating
//! state deltas, and digital-mode facts from the UDP bridge. Ordering is
//! guaranteed per device, never across devices.

use crate::digital::DigitalModeMessage;
use crate::types::{ConnectionState, DeviceId, RadioDescriptor, RadioState};

/// An event published through the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A device appeared in the registry (discovery or manual add).
    DeviceDiscovered {
        descriptor: RadioDescriptor,
    },

    /// A device was removed, explicitly or by discovery-silence expiry.
    DeviceRemoved {
        id: DeviceId,
    },

    /// A supervisor moved a device to a new connection state.
    ConnectionStateChanged {
        id: DeviceId,
        state: ConnectionState,
        /// Last error message when `state` is `Error`.
        error: Option<String>,
    },

    /// A device's canonical operating state changed.
    StateChanged {
        id: DeviceId,
        state: RadioState,
    },

    /// A fact decoded by the digital-mode UDP bridge.
    Digital(DigitalModeMessage),
}

impl BridgeEvent {
    /// The device this event concerns, if it is device-scoped.
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            BridgeEvent::DeviceDiscovered { descriptor } => Some(&descriptor.id),
            BridgeEvent::DeviceRemoved { id } => Some(id),
            BridgeEvent::ConnectionStateChanged { id, .. } => Some(id),
            BridgeEvent::StateChanged { id, .. } => Some(id),
            BridgeEvent::Digital(_) => None,
        }
    }
}
