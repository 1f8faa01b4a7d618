//! Discovery broadcast parsing.
//!
//! Announcements are a single ASCII line of space-separated `key=value`
//! tokens, led by a bare protocol tag:
//!
//! ```text
//! sdr6k model=FLEX-6600 serial=0515-1104-6600-9430 ip=192.168.1.100 port=4992 version=3.5.1 caps=freq,mode,ptt,cw,slices interval=1
//! ```
//!
//! The tag names the announcement protocol and, via the listener's
//! configuration, the device family. `serial` is mandatory (it anchors the
//! stable id); `ip` falls back to the datagram's source address.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use rigbridge_core::{
    Capability, DeviceFamily, DeviceId, DeviceOrigin, Error, RadioDescriptor, Result,
};

/// Default advertised broadcast interval when the announcement omits one.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Records are evicted after this many advertised intervals of silence.
pub const EXPIRY_MULTIPLE: u32 = 3;

/// The parsed fields of one announcement datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryAnnouncement {
    /// Protocol tag leading the line.
    pub tag: String,
    /// Device serial number, the stable id anchor.
    pub serial: String,
    /// Advertised model name.
    pub model: String,
    /// Command endpoint in `host:port` form.
    pub address: String,
    /// Capabilities parsed from the `caps=` summary.
    pub capabilities: Vec<Capability>,
    /// Firmware version string, empty if not advertised.
    pub firmware_version: String,
    /// Device uptime in seconds, if advertised.
    pub uptime_secs: Option<u64>,
    /// Advertised broadcast interval.
    pub interval: Duration,
}

impl DiscoveryAnnouncement {
    /// Parse an announcement line. `src_ip` supplies the address when the
    /// payload does not carry an `ip=` field.
    pub fn parse(line: &str, src_ip: IpAddr) -> Result<DiscoveryAnnouncement> {
        let line = line.trim();
        let mut tokens = line.split_whitespace();

        let tag = tokens
            .next()
            .filter(|t| !t.contains('='))
            .ok_or_else(|| Error::MalformedFrame("announcement missing protocol tag".into()))?
            .to_string();

        let mut serial = None;
        let mut model = String::new();
        let mut ip = None;
        let mut port = None;
        let mut caps = Vec::new();
        let mut firmware_version = String::new();
        let mut uptime_secs = None;
        let mut interval = DEFAULT_BROADCAST_INTERVAL;

        for token in tokens {
            let Some(eq) = token.find('=') else {
                // Stray bare token after the tag; tolerate and move on.
                continue;
            };
            let (key, value) = (&token[..eq], &token[eq + 1..]);
            match key {
                "serial" => serial = Some(value.to_string()),
                "model" => model = value.to_string(),
                "ip" => ip = value.parse::<IpAddr>().ok(),
                "port" => port = value.parse::<u16>().ok(),
                "version" => firmware_version = value.to_string(),
                "uptime" => uptime_secs = value.parse().ok(),
                "interval" => {
                    if let Ok(secs) = value.parse::<u64>() {
                        if secs > 0 {
                            interval = Duration::from_secs(secs);
                        }
                    }
                }
                "caps" => {
                    caps = value
                        .split(',')
                        .filter_map(|c| c.parse::<Capability>().ok())
                        .collect();
                }
                _ => {}
            }
        }

        let serial = serial
            .ok_or_else(|| Error::MalformedFrame(format!("announcement '{tag}' missing serial")))?;
        let port = port
            .ok_or_else(|| Error::MalformedFrame(format!("announcement '{tag}' missing port")))?;
        let address = format!("{}:{}", ip.unwrap_or(src_ip), port);

        Ok(DiscoveryAnnouncement {
            tag,
            serial,
            model,
            address,
            capabilities: caps,
            firmware_version,
            uptime_secs,
            interval,
        })
    }

    /// Build the immutable descriptor for this announcement.
    pub fn descriptor(&self, family: DeviceFamily) -> RadioDescriptor {
        RadioDescriptor {
            id: DeviceId::from_serial(&self.tag, &self.serial),
            family,
            model: self.model.clone(),
            address: self.address.clone(),
            capabilities: self.capabilities.clone(),
            origin: DeviceOrigin::Discovered,
        }
    }
}

/// A live registry entry: descriptor plus broadcast-refresh bookkeeping.
#[derive(Debug, Clone)]
pub struct DiscoveryRecord {
    /// Immutable device identity.
    pub descriptor: RadioDescriptor,
    /// When the last broadcast (or manual add) was seen.
    pub last_seen: Instant,
    /// Firmware version from the broadcast payload.
    pub firmware_version: String,
    /// Device uptime from the broadcast payload, if advertised.
    pub uptime_secs: Option<u64>,
    /// Advertised broadcast interval; the expiry threshold derives from it.
    pub interval: Duration,
}

impl DiscoveryRecord {
    /// Build a record from a parsed announcement, stamped now.
    pub fn from_announcement(ann: &DiscoveryAnnouncement, family: DeviceFamily) -> Self {
        DiscoveryRecord {
            descriptor: ann.descriptor(family),
            last_seen: Instant::now(),
            firmware_version: ann.firmware_version.clone(),
            uptime_secs: ann.uptime_secs,
            interval: ann.interval,
        }
    }

    /// Build a record for a manually-added device; never expires.
    pub fn manual(descriptor: RadioDescriptor) -> Self {
        DiscoveryRecord {
            descriptor,
            last_seen: Instant::now(),
            firmware_version: String::new(),
            uptime_secs: None,
            interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }

    /// Whether this record has gone silent past its expiry threshold.
    ///
    /// Manual records are exempt: they are removed only explicitly.
    pub fn is_expired(&self, now: Instant) -> bool {
        if self.descriptor.origin == DeviceOrigin::Manual {
            return false;
        }
        now.saturating_duration_since(self.last_seen) > self.interval * EXPIRY_MULTIPLE
    }
}
