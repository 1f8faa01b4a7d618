//! The digital-mode UDP listener and pass-through relay.
//!
//! Binds the configured port (optionally joining a multicast group),
//! decodes each datagram with [`crate::frames`], and publishes accepted
//! messages as [`BridgeEvent::Digital`]. Malformed frames are counted,
//! logged at debug, and dropped -- never fatal to the listener.
//!
//! Independently of decoding, every received datagram is relayed verbatim
//! to the configured downstream targets, so a second logger or display
//! keeps working even when this plane cannot parse a newer frame.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rigbridge_core::{BridgeEvent, Error, Result};

use crate::frames;

/// Listener and relay configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// UDP port to listen on (0 picks an ephemeral port).
    pub port: u16,
    /// Multicast group to join, absent for plain unicast.
    pub multicast_group: Option<Ipv4Addr>,
    /// Downstream targets for the verbatim relay.
    pub relay: Vec<SocketAddr>,
}

/// A running digital-mode bridge.
pub struct DigitalModeBridge {
    handle: JoinHandle<()>,
    local_port: u16,
    accepted: Arc<AtomicU64>,
    malformed: Arc<AtomicU64>,
}

impl DigitalModeBridge {
    /// Bind the socket and start the receive loop.
    pub async fn spawn(
        config: BridgeConfig,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Result<DigitalModeBridge> {
        let bind_addr = format!("0.0.0.0:{}", config.port);
        let socket = UdpSocket::bind(&bind_addr).await.map_err(|e| {
            Error::Transport(format!("failed to bind digimode socket on {bind_addr}: {e}"))
        })?;
        if let Some(group) = config.multicast_group {
            socket
                .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
                .map_err(|e| {
                    Error::Transport(format!("failed to join multicast group {group}: {e}"))
                })?;
        }
        let local_port = socket.local_addr().map(|a| a.port()).unwrap_or(config.port);

        tracing::debug!(
            port = local_port,
            multicast = ?config.multicast_group,
            relay_targets = config.relay.len(),
            "digital-mode bridge started"
        );

        let accepted = Arc::new(AtomicU64::new(0));
        let malformed = Arc::new(AtomicU64::new(0));

        let handle = {
            let accepted = Arc::clone(&accepted);
            let malformed = Arc::clone(&malformed);
            tokio::spawn(async move {
                recv_loop(socket, config.relay, events, accepted, malformed).await;
            })
        };

        Ok(DigitalModeBridge {
            handle,
            local_port,
            accepted,
            malformed,
        })
    }

    /// The port actually bound.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Frames decoded and forwarded since startup.
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Frames dropped as malformed since startup.
    pub fn malformed_count(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Stop the listener.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for DigitalModeBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn recv_loop(
    socket: UdpSocket,
    relay: Vec<SocketAddr>,
    events: mpsc::Sender<BridgeEvent>,
    accepted: Arc<AtomicU64>,
    malformed: Arc<AtomicU64>,
) {
    let mut buf = [0u8; 4096];

    loop {
        let (n, src) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                tracing::trace!(error = %e, "digimode recv error");
                continue;
            }
        };
        let datagram = &buf[..n];

        // Pass-through first: the relay does not depend on local decoding.
        for target in &relay {
            if let Err(e) = socket.send_to(datagram, target).await {
                tracing::trace!(target = %target, error = %e, "relay send failed");
            }
        }

        match frames::decode_frame(datagram) {
            Ok(message) => {
                accepted.fetch_add(1, Ordering::Relaxed);
                if events.send(BridgeEvent::Digital(message)).await.is_err() {
                    // Hub gone; no reason to keep listening.
                    break;
                }
            }
            Err(e) => {
                malformed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(src = %src, len = n, error = %e, "dropping malformed digimode frame");
            }
        }
    }
}
