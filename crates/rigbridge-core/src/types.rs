//! Core types used throughout rigbridge.
//!
//! These provide a vendor-agnostic model of the devices the control plane
//! tracks: who they are ([`RadioDescriptor`]), how the connection to them
//! is doing ([`ConnectionState`]), and what they were last observed doing
//! ([`RadioState`]).

use std::fmt;
use std::str::FromStr;

use crate::band::Band;

/// Stable, opaque device identifier.
///
/// Derived from the discovery protocol tag plus the device serial, or from
/// family plus `host:port` for manually-added devices. Stable across
/// reconnects so the registry and hub can key on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from a pre-formed stable string.
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    /// Derive the id for a discovered device from its protocol tag and serial.
    pub fn from_serial(tag: &str, serial: &str) -> Self {
        DeviceId(format!("{tag}:{serial}"))
    }

    /// Derive the id for a manually-added device from its family and address.
    pub fn from_address(family: DeviceFamily, address: &str) -> Self {
        DeviceId(format!("{family}:{address}"))
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The protocol family a device speaks, which selects its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Transceiver controlled over a persistent duplex text socket.
    SocketTransceiver,
    /// Rig controlled through a natively-linked synchronous library,
    /// polled on an interval.
    NativeLibraryRig,
    /// Accessory box speaking the `C<seq>|`/`R<seq>|` line protocol.
    LineProtocolAccessory,
}

impl DeviceFamily {
    /// Decode from the ordinal some configuration stores persist instead
    /// of the name.
    pub fn from_ordinal(ordinal: u64) -> Option<DeviceFamily> {
        match ordinal {
            0 => Some(DeviceFamily::SocketTransceiver),
            1 => Some(DeviceFamily::NativeLibraryRig),
            2 => Some(DeviceFamily::LineProtocolAccessory),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceFamily::SocketTransceiver => "socket",
            DeviceFamily::NativeLibraryRig => "native",
            DeviceFamily::LineProtocolAccessory => "accessory",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`DeviceFamily`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFamilyError(String);

impl fmt::Display for ParseFamilyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown device family: '{}'. Expected: socket, native, accessory",
            self.0
        )
    }
}

impl std::error::Error for ParseFamilyError {}

impl FromStr for DeviceFamily {
    type Err = ParseFamilyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "socket" | "sockettransceiver" => Ok(DeviceFamily::SocketTransceiver),
            "native" | "nativelibraryrig" => Ok(DeviceFamily::NativeLibraryRig),
            "accessory" | "lineprotocolaccessory" => Ok(DeviceFamily::LineProtocolAccessory),
            _ => Err(ParseFamilyError(s.to_string())),
        }
    }
}

/// How a device entered the registry.
///
/// Manually-added devices are exempt from discovery-silence expiry; only
/// passively-discovered ones age out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOrigin {
    /// Learned from a passive discovery broadcast.
    Discovered,
    /// Added explicitly by the operator (saved connection or direct connect).
    Manual,
}

/// A query/control capability a device advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Frequency,
    Mode,
    Ptt,
    Power,
    CwKeyer,
    Slices,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Frequency => "freq",
            Capability::Mode => "mode",
            Capability::Ptt => "ptt",
            Capability::Power => "power",
            Capability::CwKeyer => "cw",
            Capability::Slices => "slices",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Capability {
    type Err = ParseFamilyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "freq" | "frequency" => Ok(Capability::Frequency),
            "mode" => Ok(Capability::Mode),
            "ptt" => Ok(Capability::Ptt),
            "power" => Ok(Capability::Power),
            "cw" | "keyer" => Ok(Capability::CwKeyer),
            "slices" => Ok(Capability::Slices),
            _ => Err(ParseFamilyError(s.to_string())),
        }
    }
}

/// Immutable identity of a known device.
///
/// Created by a discovery listener or a manual connect; never mutated once
/// built. The registry replaces the whole descriptor when a broadcast
/// changes a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioDescriptor {
    /// Stable id, unique across the registry.
    pub id: DeviceId,
    /// Protocol family, selects the adapter implementation.
    pub family: DeviceFamily,
    /// Human-readable model name as advertised (e.g. "FLEX-6600").
    pub model: String,
    /// Network address in `host:port` form.
    pub address: String,
    /// Capabilities the device advertises.
    pub capabilities: Vec<Capability>,
    /// Whether the device was discovered or added manually.
    pub origin: DeviceOrigin,
}

impl RadioDescriptor {
    /// Whether the device advertises a capability.
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

/// Connection lifecycle state for one device.
///
/// Owned exclusively by that device's supervisor. `Monitoring` is the only
/// state in which the adapter mutates [`RadioState`]; leaving it marks the
/// state stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Discovering,
    Connecting,
    Connected,
    Monitoring,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Discovering => "discovering",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Monitoring => "monitoring",
            ConnectionState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Canonical last-known operating state of a device.
///
/// Mutated only by the supervisor that owns the device's adapter, from
/// values actually observed on the wire. The only derived fields are
/// `band` (from frequency) and frequency values passed through the
/// mode-change compensator, which is a documented correction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadioState {
    /// Last observed frequency in hertz.
    pub frequency_hz: u64,
    /// Last observed vendor mode string (e.g. "USB", "CW", "DIGU").
    pub mode: String,
    /// Whether the device reported itself transmitting.
    pub transmitting: bool,
    /// Amateur band derived from `frequency_hz`, if within an allocation.
    pub band: Option<Band>,
    /// Active sub-channel (slice) index, for devices that have them.
    pub slice: Option<u8>,
    /// Set when the owning connection left `Monitoring`; a stale state
    /// must not be rendered as live.
    pub stale: bool,
}

impl RadioState {
    /// Merge a delta observed on the wire, returning `true` if any field
    /// changed. Re-derives `band` and clears `stale` on any fresh data.
    pub fn apply(&mut self, delta: &StateDelta) -> bool {
        let mut changed = false;

        if let Some(freq) = delta.frequency_hz {
            if self.frequency_hz != freq {
                self.frequency_hz = freq;
                self.band = Band::from_hz(freq);
                changed = true;
            }
        }
        if let Some(ref mode) = delta.mode {
            if self.mode != *mode {
                self.mode = mode.clone();
                changed = true;
            }
        }
        if let Some(tx) = delta.transmitting {
            if self.transmitting != tx {
                self.transmitting = tx;
                changed = true;
            }
        }
        if let Some(slice) = delta.slice {
            if self.slice != Some(slice) {
                self.slice = Some(slice);
                changed = true;
            }
        }

        if changed && self.stale {
            self.stale = false;
        }
        changed
    }
}

/// A partial state update pushed by an adapter.
///
/// Fields are `None` when the underlying frame did not mention them;
/// adapters never invent values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub frequency_hz: Option<u64>,
    pub mode: Option<String>,
    pub transmitting: Option<bool>,
    pub slice: Option<u8>,
}

impl StateDelta {
    /// Whether the delta carries no information at all.
    pub fn is_empty(&self) -> bool {
        self.frequency_hz.is_none()
            && self.mode.is_none()
            && self.transmitting.is_none()
            && self.slice.is_none()
    }
}
