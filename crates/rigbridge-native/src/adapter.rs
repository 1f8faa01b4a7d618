//! The natively-linked rig adapter.
//!
//! Wraps a [`RigBackend`] behind the worker thread and a polling ticker.
//! The ticker requests a snapshot each interval, diffs it against the
//! previous one, and pushes only the changed fields. A failed poll closes
//! the update stream -- the adapter itself never retries.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use rigbridge_core::{
    AdapterCommand, Error, ProtocolAdapter, RadioDescriptor, Result, StateDelta,
};

use crate::backend::{RigBackend, RigSnapshot};
use crate::worker::{Worker, WorkerRequest};

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Deadline for any single library call, open included.
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Adapter for rigs behind a synchronous native control library.
///
/// The worker thread outlives individual connections: a disconnect closes
/// the library handle but keeps the thread, so the supervisor's reconnect
/// path reopens the same handle.
pub struct NativeRigAdapter {
    descriptor: RadioDescriptor,
    poll_interval: Duration,
    library: Option<Box<dyn RigBackend>>,
    worker: Option<Worker>,
    open: bool,
    poll_handle: Option<JoinHandle<()>>,
    updates_rx: Option<mpsc::Receiver<StateDelta>>,
}

impl NativeRigAdapter {
    /// Create an adapter around an unopened library handle.
    pub fn new(descriptor: RadioDescriptor, library: Box<dyn RigBackend>) -> Self {
        Self::with_poll_interval(descriptor, library, DEFAULT_POLL_INTERVAL)
    }

    /// Create an adapter with a configured poll interval.
    pub fn with_poll_interval(
        descriptor: RadioDescriptor,
        library: Box<dyn RigBackend>,
        poll_interval: Duration,
    ) -> Self {
        NativeRigAdapter {
            descriptor,
            poll_interval,
            library: Some(library),
            worker: None,
            open: false,
            poll_handle: None,
            updates_rx: None,
        }
    }

    /// Round-trip one request to the worker thread with a deadline.
    async fn call(&self, request: WorkerRequest, rx: oneshot::Receiver<Result<()>>) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(Error::NotConnected)?;
        worker
            .tx
            .send(request)
            .map_err(|_| Error::ConnectionLost)?;
        tokio::time::timeout(CALL_TIMEOUT, rx)
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|_| Error::ConnectionLost)?
    }
}

#[async_trait]
impl ProtocolAdapter for NativeRigAdapter {
    fn descriptor(&self) -> &RadioDescriptor {
        &self.descriptor
    }

    async fn connect(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }

        // Spawn the worker thread on first use; it keeps the library for
        // the adapter's whole lifetime.
        if self.worker.is_none() {
            let library = self
                .library
                .take()
                .expect("library present until the worker takes it");
            self.worker = Some(Worker::spawn(library, self.descriptor.id.to_string()));
        }
        let worker = self.worker.as_ref().expect("worker just ensured");

        let (reply_tx, reply_rx) = oneshot::channel();
        worker
            .tx
            .send(WorkerRequest::Open(reply_tx))
            .map_err(|_| Error::ConnectFailed("rig worker died before open".into()))?;
        let opened = tokio::time::timeout(CALL_TIMEOUT, reply_rx)
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|_| Error::ConnectFailed("rig worker died during open".into()))?;
        if let Err(e) = opened {
            return Err(Error::ConnectFailed(format!("library open failed: {e}")));
        }
        self.open = true;

        let (delta_tx, delta_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let poll_tx = worker.tx.clone();
        let interval = self.poll_interval;
        let id = self.descriptor.id.clone();

        self.poll_handle = Some(tokio::spawn(async move {
            poll_loop(poll_tx, delta_tx, interval, id).await;
        }));
        self.updates_rx = Some(delta_rx);

        tracing::debug!(id = %self.descriptor.id, interval_ms = self.poll_interval.as_millis() as u64,
            "native rig connected, polling started");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
        if let Some(worker) = &self.worker {
            if self.open {
                // Close the handle but keep the thread for a reopen.
                let (reply_tx, reply_rx) = oneshot::channel();
                if worker.tx.send(WorkerRequest::Close(reply_tx)).is_ok() {
                    let _ = tokio::time::timeout(CALL_TIMEOUT, reply_rx).await;
                }
            }
        }
        self.open = false;
        tracing::debug!(id = %self.descriptor.id, "native rig disconnected");
        Ok(())
    }

    async fn send_command(&mut self, cmd: AdapterCommand) -> Result<()> {
        if !self.open {
            return Err(Error::NotConnected);
        }
        let call: Box<dyn FnOnce(&mut dyn RigBackend) -> Result<()> + Send> = match cmd {
            AdapterCommand::SetFrequency(hz) => Box::new(move |lib| lib.set_frequency(hz)),
            AdapterCommand::SetMode(mode) => Box::new(move |lib| lib.set_mode(&mode)),
            AdapterCommand::SetPtt(on) => Box::new(move |lib| lib.set_ptt(on)),
            AdapterCommand::SendCw(text) => Box::new(move |lib| lib.send_cw(&text)),
            AdapterCommand::StopCw => Box::new(|lib| lib.stop_cw()),
            AdapterCommand::SetCwSpeed(wpm) => Box::new(move |lib| lib.set_cw_speed(wpm)),
            AdapterCommand::Raw(_) => {
                return Err(Error::Unsupported(
                    "native library has no raw command channel".into(),
                ));
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        self.call(WorkerRequest::Apply(call, reply_tx), reply_rx).await
    }

    fn take_updates(&mut self) -> Option<mpsc::Receiver<StateDelta>> {
        self.updates_rx.take()
    }
}

impl Drop for NativeRigAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_handle.take() {
            handle.abort();
        }
        if let Some(worker) = &self.worker {
            // The thread closes the library handle on its way out.
            worker.shutdown();
        }
    }
}

/// Diff two snapshots into a delta; `None` when nothing changed.
fn diff(previous: Option<&RigSnapshot>, current: &RigSnapshot) -> Option<StateDelta> {
    let mut delta = StateDelta::default();
    match previous {
        None => {
            delta.frequency_hz = Some(current.frequency_hz);
            delta.mode = Some(current.mode.clone());
            delta.transmitting = Some(current.ptt);
        }
        Some(prev) => {
            if prev.frequency_hz != current.frequency_hz {
                delta.frequency_hz = Some(current.frequency_hz);
            }
            if prev.mode != current.mode {
                delta.mode = Some(current.mode.clone());
            }
            if prev.ptt != current.ptt {
                delta.transmitting = Some(current.ptt);
            }
        }
    }
    if delta.is_empty() { None } else { Some(delta) }
}

/// Ticker task: poll, diff, push. Exits (closing the update channel) on
/// the first failed poll or when the consumer goes away.
async fn poll_loop(
    worker_tx: std::sync::mpsc::Sender<WorkerRequest>,
    delta_tx: mpsc::Sender<StateDelta>,
    interval: Duration,
    id: rigbridge_core::DeviceId,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last: Option<RigSnapshot> = None;

    loop {
        ticker.tick().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        if worker_tx.send(WorkerRequest::Poll(reply_tx)).is_err() {
            break;
        }
        let snapshot = match tokio::time::timeout(CALL_TIMEOUT, reply_rx).await {
            Ok(Ok(Ok(s))) => s,
            Ok(Ok(Err(e))) => {
                tracing::debug!(id = %id, error = %e, "rig poll failed");
                break;
            }
            _ => {
                tracing::debug!(id = %id, "rig poll reply lost");
                break;
            }
        };

        if let Some(delta) = diff(last.as_ref(), &snapshot) {
            if delta_tx.send(delta).await.is_err() {
                break;
            }
        }
        last = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use rigbridge_core::{Capability, DeviceFamily, DeviceId, DeviceOrigin};

    /// In-memory stand-in for the native library.
    #[derive(Default)]
    struct FakeState {
        frequency_hz: u64,
        mode: String,
        ptt: bool,
        fail_reads: bool,
        open_calls: u32,
        close_calls: u32,
    }

    #[derive(Clone, Default)]
    struct FakeLibrary {
        state: Arc<Mutex<FakeState>>,
    }

    impl RigBackend for FakeLibrary {
        fn open(&mut self) -> Result<()> {
            let mut s = self.state.lock().unwrap();
            s.open_calls += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.state.lock().unwrap().close_calls += 1;
        }

        fn read_frequency(&mut self) -> Result<u64> {
            let s = self.state.lock().unwrap();
            if s.fail_reads {
                return Err(Error::Transport("rig stopped answering".into()));
            }
            Ok(s.frequency_hz)
        }

        fn read_mode(&mut self) -> Result<String> {
            Ok(self.state.lock().unwrap().mode.clone())
        }

        fn read_ptt(&mut self) -> Result<bool> {
            Ok(self.state.lock().unwrap().ptt)
        }

        fn set_frequency(&mut self, freq_hz: u64) -> Result<()> {
            self.state.lock().unwrap().frequency_hz = freq_hz;
            Ok(())
        }

        fn set_mode(&mut self, mode: &str) -> Result<()> {
            self.state.lock().unwrap().mode = mode.to_string();
            Ok(())
        }

        fn set_ptt(&mut self, on: bool) -> Result<()> {
            self.state.lock().unwrap().ptt = on;
            Ok(())
        }
    }

    fn descriptor() -> RadioDescriptor {
        RadioDescriptor {
            id: DeviceId::new("native:TS-590"),
            family: DeviceFamily::NativeLibraryRig,
            model: "TS-590SG".into(),
            address: "/dev/ttyUSB0".into(),
            capabilities: vec![Capability::Frequency, Capability::Mode, Capability::Ptt],
            origin: DeviceOrigin::Manual,
        }
    }

    fn fast_adapter(lib: FakeLibrary) -> NativeRigAdapter {
        NativeRigAdapter::with_poll_interval(
            descriptor(),
            Box::new(lib),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn first_poll_emits_full_snapshot() {
        let lib = FakeLibrary::default();
        {
            let mut s = lib.state.lock().unwrap();
            s.frequency_hz = 14_025_000;
            s.mode = "CW".into();
        }
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();
        let mut updates = adapter.take_updates().unwrap();

        let delta = updates.recv().await.unwrap();
        assert_eq!(delta.frequency_hz, Some(14_025_000));
        assert_eq!(delta.mode.as_deref(), Some("CW"));
        assert_eq!(delta.transmitting, Some(false));

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_polls_emit_nothing() {
        let lib = FakeLibrary::default();
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();
        let mut updates = adapter.take_updates().unwrap();

        // Initial snapshot.
        updates.recv().await.unwrap();

        // Several idle poll periods: no further deltas.
        let idle = tokio::time::timeout(Duration::from_millis(120), updates.recv()).await;
        assert!(idle.is_err(), "idle polls must not emit deltas");

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn change_between_polls_emits_only_changed_fields() {
        let lib = FakeLibrary::default();
        let state = Arc::clone(&lib.state);
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();
        let mut updates = adapter.take_updates().unwrap();
        updates.recv().await.unwrap(); // initial

        state.lock().unwrap().frequency_hz = 7_030_000;

        let delta = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delta.frequency_hz, Some(7_030_000));
        assert!(delta.mode.is_none());
        assert!(delta.transmitting.is_none());

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn commands_are_serialized_through_the_worker() {
        let lib = FakeLibrary::default();
        let state = Arc::clone(&lib.state);
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();

        adapter
            .send_command(AdapterCommand::SetFrequency(21_074_000))
            .await
            .unwrap();
        adapter
            .send_command(AdapterCommand::SetMode("USB".into()))
            .await
            .unwrap();
        adapter.send_command(AdapterCommand::SetPtt(true)).await.unwrap();

        let s = state.lock().unwrap();
        assert_eq!(s.frequency_hz, 21_074_000);
        assert_eq!(s.mode, "USB");
        assert!(s.ptt);
        drop(s);

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn poll_failure_closes_update_stream_without_retry() {
        let lib = FakeLibrary::default();
        let state = Arc::clone(&lib.state);
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();
        let mut updates = adapter.take_updates().unwrap();
        updates.recv().await.unwrap(); // initial

        state.lock().unwrap().fail_reads = true;

        // The stream ends; the adapter does not retry on its own.
        let closed = tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap();
        assert!(closed.is_none());

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_cw_maps_to_unsupported() {
        let lib = FakeLibrary::default();
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();

        let err = adapter
            .send_command(AdapterCommand::SendCw("TEST".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        adapter.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_closes_library_handle() {
        let lib = FakeLibrary::default();
        let state = Arc::clone(&lib.state);
        let mut adapter = fast_adapter(lib);
        adapter.connect().await.unwrap();
        adapter.disconnect().await.unwrap();

        // Give the worker thread a moment to run its shutdown path.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let s = state.lock().unwrap();
        assert_eq!(s.open_calls, 1);
        assert_eq!(s.close_calls, 1);
    }
}
