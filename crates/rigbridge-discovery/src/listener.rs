//! Passive UDP discovery listeners.
//!
//! One [`DiscoveryListener`] per announcement protocol. Each binds a UDP
//! socket, parses incoming broadcast lines, and upserts the shared
//! [`DeviceRegistry`]; a companion sweep task evicts silent records.
//! Events flow out through an `mpsc` sink the hub drains.
//!
//! A malformed datagram is counted and dropped; the listener never dies
//! because of one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rigbridge_core::{BridgeEvent, DeviceFamily, Error, Result};

use crate::record::{DiscoveryAnnouncement, DiscoveryRecord};
use crate::registry::DeviceRegistry;

/// How often the sweep task checks for silent records.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for one discovery listener.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// UDP port to listen on.
    pub port: u16,
    /// Protocol tag this listener accepts (datagrams with other tags are
    /// ignored, not counted as malformed -- several protocols may share a
    /// port on some networks).
    pub tag: String,
    /// Device family for descriptors built from these announcements.
    pub family: DeviceFamily,
}

/// A running discovery listener: receive loop plus expiry sweep.
pub struct DiscoveryListener {
    recv_handle: JoinHandle<()>,
    sweep_handle: JoinHandle<()>,
    local_port: u16,
}

impl DiscoveryListener {
    /// Bind the socket and start the receive and sweep tasks.
    pub async fn spawn(
        config: ListenerConfig,
        registry: Arc<DeviceRegistry>,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Result<DiscoveryListener> {
        let bind_addr = format!("0.0.0.0:{}", config.port);
        let socket = UdpSocket::bind(&bind_addr).await.map_err(|e| {
            Error::Transport(format!("failed to bind discovery socket on {bind_addr}: {e}"))
        })?;
        let local_port = socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(config.port);

        tracing::debug!(port = local_port, tag = %config.tag, "discovery listener started");

        let recv_handle = {
            let registry = Arc::clone(&registry);
            let events = events.clone();
            let config = config.clone();
            tokio::spawn(async move {
                recv_loop(socket, config, registry, events).await;
            })
        };

        let sweep_handle = tokio::spawn(async move {
            sweep_loop(registry, events).await;
        });

        Ok(DiscoveryListener {
            recv_handle,
            sweep_handle,
            local_port,
        })
    }

    /// The port actually bound (useful when configured with port 0).
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Stop both tasks.
    pub fn shutdown(&self) {
        self.recv_handle.abort();
        self.sweep_handle.abort();
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn recv_loop(
    socket: UdpSocket,
    config: ListenerConfig,
    registry: Arc<DeviceRegistry>,
    events: mpsc::Sender<BridgeEvent>,
) {
    let mut buf = [0u8; 2048];

    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::trace!(error = %e, "discovery recv error");
                continue;
            }
        };

        let Ok(line) = std::str::from_utf8(&buf[..n]) else {
            registry.record_malformed();
            tracing::trace!(src = %src, len = n, "dropping non-UTF8 discovery datagram");
            continue;
        };

        // Other protocols sharing the port are not ours to judge.
        if line.split_whitespace().next() != Some(config.tag.as_str()) {
            continue;
        }

        match DiscoveryAnnouncement::parse(line, src.ip()) {
            Ok(ann) => {
                let record = DiscoveryRecord::from_announcement(&ann, config.family);
                let descriptor = record.descriptor.clone();
                if registry.upsert(record) {
                    tracing::debug!(
                        id = %descriptor.id,
                        model = %descriptor.model,
                        address = %descriptor.address,
                        "device discovered"
                    );
                    let _ = events.send(BridgeEvent::DeviceDiscovered { descriptor }).await;
                }
            }
            Err(e) => {
                registry.record_malformed();
                tracing::trace!(src = %src, error = %e, "dropping malformed announcement");
            }
        }
    }
}

async fn sweep_loop(registry: Arc<DeviceRegistry>, events: mpsc::Sender<BridgeEvent>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        for id in registry.expire_stale(Instant::now()) {
            tracing::debug!(id = %id, "device aged out of discovery");
            let _ = events.send(BridgeEvent::DeviceRemoved { id }).await;
        }
    }
}
