//! The socket transceiver adapter.
//!
//! Holds one persistent TCP connection. A background task owns the read
//! half and turns report lines into [`StateDelta`]s; the write half stays
//! with the adapter for commands. Deltas are delivered in wire order --
//! the channel applies backpressure rather than dropping, so a burst of
//! reports is never reordered or thinned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rigbridge_core::{
    AdapterCommand, Error, ProtocolAdapter, RadioDescriptor, Result, StateDelta,
};

use crate::codec;

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a single command write.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on the teardown handshake before resources are force-released.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Delta channel depth; full means the consumer lags and we backpressure.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Adapter for socket-controlled transceivers.
pub struct SocketAdapter {
    descriptor: RadioDescriptor,
    writer: Option<WriteHalf<TcpStream>>,
    read_handle: Option<JoinHandle<()>>,
    updates_rx: Option<mpsc::Receiver<StateDelta>>,
    connected: Arc<AtomicBool>,
}

impl SocketAdapter {
    /// Create an adapter for the device; no I/O happens until
    /// [`connect`](ProtocolAdapter::connect).
    pub fn new(descriptor: RadioDescriptor) -> Self {
        SocketAdapter {
            descriptor,
            writer: None,
            read_handle: None,
            updates_rx: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the transport is currently up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolAdapter for SocketAdapter {
    fn descriptor(&self) -> &RadioDescriptor {
        &self.descriptor
    }

    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let addr = self.descriptor.address.clone();
        tracing::debug!(id = %self.descriptor.id, addr = %addr, "connecting socket transceiver");

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectFailed(format!("connect to {addr} timed out")))?
            .map_err(|e| Error::ConnectFailed(format!("connect to {addr} failed: {e}")))?;

        // Low-latency command turnaround.
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = tokio::io::split(stream);
        let (delta_tx, delta_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        self.connected.store(true, Ordering::SeqCst);
        let connected = Arc::clone(&self.connected);
        let id = self.descriptor.id.clone();

        self.read_handle = Some(tokio::spawn(async move {
            read_loop(read_half, delta_tx, connected, id).await;
        }));
        self.writer = Some(write_half);
        self.updates_rx = Some(delta_rx);

        tracing::debug!(id = %self.descriptor.id, "socket transceiver connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.take() {
            // The remote may never acknowledge the FIN; bound the wait.
            if tokio::time::timeout(TEARDOWN_TIMEOUT, writer.shutdown())
                .await
                .is_err()
            {
                tracing::debug!(id = %self.descriptor.id, "teardown timed out, force-releasing");
            }
        }
        if let Some(handle) = self.read_handle.take() {
            handle.abort();
        }

        tracing::debug!(id = %self.descriptor.id, "socket transceiver disconnected");
        Ok(())
    }

    async fn send_command(&mut self, cmd: AdapterCommand) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;

        let line = format!("{}\n", codec::encode_command(&cmd));
        tracing::trace!(id = %self.descriptor.id, command = line.trim(), "sending directive");

        let write = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        tokio::time::timeout(COMMAND_TIMEOUT, write)
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Transport(format!("command write failed: {e}")))?;
        Ok(())
    }

    fn take_updates(&mut self) -> Option<mpsc::Receiver<StateDelta>> {
        self.updates_rx.take()
    }
}

/// Background task: turn report lines into deltas until the link drops.
///
/// Exiting drops the delta sender, which is how the consumer observes
/// connection loss.
async fn read_loop(
    read_half: ReadHalf<TcpStream>,
    delta_tx: mpsc::Sender<StateDelta>,
    connected: Arc<AtomicBool>,
    id: rigbridge_core::DeviceId,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::debug!(id = %id, "socket closed by radio");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    continue;
                }
                match codec::parse_report(trimmed) {
                    Ok(delta) if delta.is_empty() => {
                        tracing::trace!(id = %id, line = trimmed, "report carried no known keys");
                    }
                    Ok(delta) => {
                        if delta_tx.send(delta).await.is_err() {
                            // Consumer gone; nothing left to report to.
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::trace!(id = %id, line = trimmed, error = %e, "unparseable report");
                    }
                }
            }
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "socket read error");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
}
