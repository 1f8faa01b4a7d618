//! Station configuration.
//!
//! The plane does not own a settings store; it reads one TOML file at
//! startup (and again on reconnect) supplied by the surrounding
//! application. The file carries saved manual connections, per-device
//! credentials and poll intervals, discovery listener ports, and the
//! digital-mode bridge endpoints.
//!
//! Older installations persisted the device family as an ordinal rather
//! than a name, so the decoder accepts either representation and
//! normalizes at the boundary -- raw stored values are never trusted
//! downstream.

use std::path::Path;

use serde::Deserialize;

use rigbridge_core::{
    Capability, DeviceFamily, DeviceId, DeviceOrigin, Error, RadioDescriptor, Result,
};

/// Root of the station configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    /// Discovery listeners to run.
    #[serde(default)]
    pub discovery: Vec<DiscoveryConfig>,

    /// Saved manual device connections.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// Digital-mode UDP bridge, absent to disable it.
    #[serde(default)]
    pub digimode: Option<DigimodeConfig>,
}

/// One discovery listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// UDP port to listen on.
    pub port: u16,
    /// Announcement protocol tag accepted on that port.
    pub tag: String,
    /// Device family announced by that protocol.
    #[serde(deserialize_with = "de_family")]
    pub family: DeviceFamily,
}

/// One saved manual connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Stable id; derived from family and address when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// Device family, stored as a name or a legacy ordinal.
    #[serde(deserialize_with = "de_family")]
    pub family: DeviceFamily,
    /// Endpoint in `host:port` form (or a device path for native rigs).
    pub address: String,
    /// Model label for the UI.
    #[serde(default)]
    pub model: Option<String>,
    /// Credential presented on connect, where the device wants one.
    #[serde(default)]
    pub credential: Option<String>,
    /// Poll interval for native-library rigs, in milliseconds.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    /// Capability names; defaults to frequency/mode/ptt.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl DeviceConfig {
    /// Build the manual-origin descriptor for this saved connection.
    pub fn descriptor(&self) -> RadioDescriptor {
        let id = match &self.id {
            Some(id) => DeviceId::new(id.clone()),
            None => DeviceId::from_address(self.family, &self.address),
        };
        let capabilities: Vec<Capability> = if self.capabilities.is_empty() {
            vec![Capability::Frequency, Capability::Mode, Capability::Ptt]
        } else {
            self.capabilities
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect()
        };
        RadioDescriptor {
            id,
            family: self.family,
            model: self.model.clone().unwrap_or_default(),
            address: self.address.clone(),
            capabilities,
            origin: DeviceOrigin::Manual,
        }
    }
}

/// Digital-mode bridge endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DigimodeConfig {
    /// UDP port to listen on.
    pub port: u16,
    /// Multicast group to join, absent for plain unicast.
    #[serde(default)]
    pub multicast_group: Option<String>,
    /// Downstream targets every received frame is relayed to, verbatim.
    #[serde(default)]
    pub relay: Vec<String>,
}

impl StationConfig {
    /// Parse a configuration from TOML text.
    pub fn parse(text: &str) -> Result<StationConfig> {
        toml::from_str(text).map_err(|e| Error::Protocol(format!("config: {e}")))
    }

    /// Read and parse the configuration file.
    pub fn load(path: &Path) -> Result<StationConfig> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

/// Accept a device family stored as either its name or a legacy ordinal.
fn de_family<'de, D>(deserializer: D) -> std::result::Result<DeviceFamily, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Ordinal(u64),
        Name(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        Repr::Ordinal(n) => DeviceFamily::from_ordinal(n)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown device family ordinal {n}"))),
    }
}
