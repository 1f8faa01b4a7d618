//! The accessory box adapter.
//!
//! One TCP connection; a background read task routes response rows to
//! their waiting commands by sequence number and turns unsolicited status
//! rows into [`StateDelta`]s. The pending table supports any number of
//! outstanding commands, so a slow multi-row response never blocks an
//! unrelated one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use rigbridge_core::{
    AdapterCommand, Error, ProtocolAdapter, RadioDescriptor, Result, StateDelta,
};

use crate::protocol::{self, ResponseRow, STATUS_AUTH_REQUIRED};

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for each row of a response (re-armed per row).
const ROW_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on teardown before resources are force-released.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(1);

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// A completed command: final status plus any payload rows that preceded
/// the terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Status code of the final row (0 on success).
    pub status: u32,
    /// Payload rows in arrival order, terminator excluded.
    pub rows: Vec<String>,
}

/// Shared client state between the adapter and its read task.
struct ClientInner {
    writer: Mutex<Option<WriteHalf<TcpStream>>>,
    /// Outstanding commands: sequence -> row sink.
    pending: Mutex<HashMap<u32, mpsc::UnboundedSender<ResponseRow>>>,
    next_seq: AtomicU32,
    connected: AtomicBool,
}

/// Adapter for line-protocol accessory boxes.
pub struct AccessoryAdapter {
    descriptor: RadioDescriptor,
    credential: Option<String>,
    inner: Option<Arc<ClientInner>>,
    read_handle: Option<JoinHandle<()>>,
    updates_rx: Option<mpsc::Receiver<StateDelta>>,
}

impl AccessoryAdapter {
    pub fn new(descriptor: RadioDescriptor) -> Self {
        Self::with_credential(descriptor, None)
    }

    /// Adapter for a box that demands an `auth` exchange after connect.
    pub fn with_credential(descriptor: RadioDescriptor, credential: Option<String>) -> Self {
        AccessoryAdapter {
            descriptor,
            credential,
            inner: None,
            read_handle: None,
            updates_rx: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .as_ref()
            .map(|i| i.connected.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Send a verb and collect its full (possibly multi-row) response.
    ///
    /// Takes `&self`: any number of commands may be in flight; rows are
    /// routed by sequence, so responses streaming for other commands do
    /// not delay this one.
    pub async fn execute(&self, command: &str) -> Result<Ack> {
        let inner = self.inner.as_ref().ok_or(Error::NotConnected)?;
        if !inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        let seq = inner.next_seq.fetch_add(1, Ordering::SeqCst);
        let (row_tx, mut row_rx) = mpsc::unbounded_channel();
        inner.pending.lock().await.insert(seq, row_tx);

        let line = format!("{}\n", protocol::encode_request(seq, command));
        tracing::trace!(id = %self.descriptor.id, seq = seq, command = command, "sending request");

        let write_result = {
            let mut writer = inner.writer.lock().await;
            let w = writer.as_mut().ok_or(Error::NotConnected)?;
            let write = async {
                w.write_all(line.as_bytes()).await?;
                w.flush().await
            };
            tokio::time::timeout(ROW_TIMEOUT, write)
                .await
                .map_err(|_| Error::Timeout)
                .and_then(|r| r.map_err(|e| Error::Transport(format!("request write failed: {e}"))))
        };
        if let Err(e) = write_result {
            inner.pending.lock().await.remove(&seq);
            return Err(e);
        }

        // Collect rows until the terminator. Each row re-arms the deadline
        // so long multi-row results are fine as long as they keep flowing.
        let mut rows = Vec::new();
        let outcome = loop {
            match tokio::time::timeout(ROW_TIMEOUT, row_rx.recv()).await {
                Ok(Some(row)) => {
                    if row.status != 0 {
                        break Err(status_error(row.status, &row.payload));
                    }
                    if row.is_terminator() {
                        break Ok(Ack {
                            status: row.status,
                            rows,
                        });
                    }
                    rows.push(row.payload);
                }
                Ok(None) => break Err(Error::ConnectionLost),
                Err(_) => break Err(Error::Timeout),
            }
        };

        inner.pending.lock().await.remove(&seq);
        outcome
    }
}

fn status_error(status: u32, payload: &str) -> Error {
    if status == STATUS_AUTH_REQUIRED {
        Error::AuthRequired(payload.to_string())
    } else {
        Error::Protocol(format!("accessory status 0x{status:X}: {payload}"))
    }
}

#[async_trait]
impl ProtocolAdapter for AccessoryAdapter {
    fn descriptor(&self) -> &RadioDescriptor {
        &self.descriptor
    }

    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let addr = self.descriptor.address.clone();
        tracing::debug!(id = %self.descriptor.id, addr = %addr, "connecting accessory");

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectFailed(format!("connect to {addr} timed out")))?
            .map_err(|e| Error::ConnectFailed(format!("connect to {addr} failed: {e}")))?;
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = tokio::io::split(stream);
        let (delta_tx, delta_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        let inner = Arc::new(ClientInner {
            writer: Mutex::new(Some(write_half)),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU32::new(1),
            connected: AtomicBool::new(true),
        });

        let read_inner = Arc::clone(&inner);
        let id = self.descriptor.id.clone();
        self.read_handle = Some(tokio::spawn(async move {
            read_loop(read_half, read_inner, delta_tx, id).await;
        }));

        self.inner = Some(inner);
        self.updates_rx = Some(delta_rx);

        // Present the credential before anything else; a rejection tears
        // the transport down so the caller sees a clean AuthRequired.
        if let Some(credential) = self.credential.clone() {
            if let Err(e) = self.execute(&format!("auth {credential}")).await {
                if let Some(inner) = self.inner.take() {
                    inner.connected.store(false, Ordering::SeqCst);
                    let mut writer = inner.writer.lock().await;
                    if let Some(mut w) = writer.take() {
                        let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, w.shutdown()).await;
                    }
                }
                if let Some(handle) = self.read_handle.take() {
                    handle.abort();
                }
                self.updates_rx = None;
                return Err(e);
            }
        }

        tracing::debug!(id = %self.descriptor.id, "accessory connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(inner) = self.inner.take() {
            inner.connected.store(false, Ordering::SeqCst);

            {
                let mut writer = inner.writer.lock().await;
                if let Some(mut w) = writer.take() {
                    if tokio::time::timeout(TEARDOWN_TIMEOUT, w.shutdown())
                        .await
                        .is_err()
                    {
                        tracing::debug!(id = %self.descriptor.id, "teardown timed out, force-releasing");
                    }
                }
            }
            // Wake every waiter with ConnectionLost.
            inner.pending.lock().await.clear();
        }
        if let Some(handle) = self.read_handle.take() {
            handle.abort();
        }

        tracing::debug!(id = %self.descriptor.id, "accessory disconnected");
        Ok(())
    }

    async fn send_command(&mut self, cmd: AdapterCommand) -> Result<()> {
        let verb = protocol::command_verb(&cmd);
        self.execute(&verb).await.map(|_| ())
    }

    fn take_updates(&mut self) -> Option<mpsc::Receiver<StateDelta>> {
        self.updates_rx.take()
    }
}

/// Background task: route rows to waiters, deltas to the consumer.
async fn read_loop(
    read_half: ReadHalf<TcpStream>,
    inner: Arc<ClientInner>,
    delta_tx: mpsc::Sender<StateDelta>,
    id: rigbridge_core::DeviceId,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::debug!(id = %id, "accessory closed the connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    continue;
                }
                let row = match protocol::parse_row(trimmed) {
                    Ok(row) => row,
                    Err(e) => {
                        tracing::trace!(id = %id, line = trimmed, error = %e, "unparseable row");
                        continue;
                    }
                };

                // A row for an outstanding command goes to its waiter.
                // Everything else -- seq 0, a seq we never issued, or a
                // duplicate row for an already-completed command -- is
                // treated as asynchronous status.
                let routed = {
                    let pending = inner.pending.lock().await;
                    match pending.get(&row.seq) {
                        Some(tx) => tx.send(row.clone()).is_ok(),
                        None => false,
                    }
                };
                if !routed {
                    let delta = protocol::parse_status_payload(&row.payload);
                    if delta.is_empty() {
                        tracing::trace!(id = %id, seq = row.seq, payload = %row.payload,
                            "uncorrelated row with no status content");
                    } else if delta_tx.send(delta).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(id = %id, error = %e, "accessory read error");
                break;
            }
        }
    }

    inner.connected.store(false, Ordering::SeqCst);
    // Drop every pending sender so waiting commands see ConnectionLost.
    inner.pending.lock().await.clear();
}
