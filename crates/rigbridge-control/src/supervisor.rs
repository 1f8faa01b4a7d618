//! Per-device connection supervisor.
//!
//! One supervisor task per device drives its adapter through
//! `Disconnected -> Connecting -> Connected -> Monitoring`; any state can
//! fall to `Error` on I/O failure. The supervisor is the single owner of
//! retry policy: adapters never retry, and the hub only reports.
//!
//! Retries use capped exponential backoff with jitter. Transient failures
//! during backoff stay in `Connecting` -- only exhausting the retry
//! threshold (or a non-retryable error) parks the device in `Error` with
//! the last message attached. A manual disconnect request is honored
//! immediately, even mid-backoff.
//!
//! Leaving `Monitoring` synchronously marks the radio state stale before
//! the connection-state event is published, so no subscriber can mistake
//! frozen values for live ones.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use rigbridge_core::{
    AdapterCommand, ConnectionState, DeviceId, Error, ProtocolAdapter, RadioState, Result,
    StateDelta, compensate,
};

use crate::hub::EventHub;

/// Tuning for a supervisor's retry and teardown behavior.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Consecutive failures tolerated before parking in `Error`.
    /// The device gets `1 + max_retries` connect attempts per episode.
    pub max_retries: u32,
    /// First backoff delay; doubles per consecutive failure.
    pub backoff_base: Duration,
    /// Upper bound on the backoff delay.
    pub backoff_cap: Duration,
    /// Bound on adapter teardown before resources are force-released.
    pub teardown_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            backoff_cap: Duration::from_secs(30),
            teardown_timeout: Duration::from_secs(2),
        }
    }
}

enum Request {
    Connect,
    Disconnect,
    Command(AdapterCommand, oneshot::Sender<Result<()>>),
}

/// Handle to a running supervisor task.
///
/// The supervisor owns its adapter exclusively; holding the only handle
/// for a device id is what guarantees at most one live adapter per
/// device. Dropping the handle tears the connection down.
pub struct SupervisorHandle {
    id: DeviceId,
    tx: mpsc::Sender<Request>,
    status: watch::Receiver<(ConnectionState, Option<String>)>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Request a connection attempt. Idempotent while already connected.
    pub async fn connect(&self) -> Result<()> {
        self.tx
            .send(Request::Connect)
            .await
            .map_err(|_| Error::ConnectionLost)
    }

    /// Request an immediate disconnect. Always honored, backoff included.
    pub async fn disconnect(&self) -> Result<()> {
        self.tx
            .send(Request::Disconnect)
            .await
            .map_err(|_| Error::ConnectionLost)
    }

    /// Route a command to the device and await its result.
    pub async fn command(&self, cmd: AdapterCommand) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Request::Command(cmd, reply_tx))
            .await
            .map_err(|_| Error::ConnectionLost)?;
        reply_rx.await.map_err(|_| Error::ConnectionLost)?
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().0
    }

    /// Current connection state plus the last error message, if any.
    pub fn status(&self) -> (ConnectionState, Option<String>) {
        self.status.borrow().clone()
    }

    /// Wait until the supervisor reaches the given state.
    pub async fn wait_for_state(&self, state: ConnectionState) -> Result<()> {
        let mut rx = self.status.clone();
        rx.wait_for(|(s, _)| *s == state)
            .await
            .map(|_| ())
            .map_err(|_| Error::ConnectionLost)
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawner for per-device supervisor tasks.
pub struct Supervisor;

impl Supervisor {
    /// Spawn a supervisor owning `adapter`, publishing through `hub`.
    pub fn spawn(adapter: Box<dyn ProtocolAdapter>, hub: Arc<EventHub>) -> SupervisorHandle {
        Self::spawn_with_config(adapter, hub, SupervisorConfig::default())
    }

    pub fn spawn_with_config(
        adapter: Box<dyn ProtocolAdapter>,
        hub: Arc<EventHub>,
        config: SupervisorConfig,
    ) -> SupervisorHandle {
        let id = adapter.descriptor().id.clone();
        let (tx, rx) = mpsc::channel(16);
        let (status_tx, status_rx) = watch::channel((ConnectionState::Disconnected, None));

        let task_id = id.clone();
        let task = tokio::spawn(async move {
            run(adapter, hub, config, rx, status_tx, task_id).await;
        });

        SupervisorHandle {
            id,
            tx,
            status: status_rx,
            task,
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor task
// ---------------------------------------------------------------------------

/// How a connect/monitor episode ended.
enum Episode {
    /// Parked (Disconnected or Error); wait for the next request.
    Parked,
    /// Every handle is gone; exit the task.
    HandleGone,
}

struct Ctx {
    hub: Arc<EventHub>,
    config: SupervisorConfig,
    status_tx: watch::Sender<(ConnectionState, Option<String>)>,
    id: DeviceId,
    radio: RadioState,
}

impl Ctx {
    fn set_state(&self, state: ConnectionState, error: Option<String>) {
        tracing::debug!(id = %self.id, state = %state, error = ?error, "connection state");
        let _ = self.status_tx.send((state, error.clone()));
        self.hub.publish(rigbridge_core::BridgeEvent::ConnectionStateChanged {
            id: self.id.clone(),
            state,
            error,
        });
    }

    fn publish_radio(&self) {
        self.hub.publish(rigbridge_core::BridgeEvent::StateChanged {
            id: self.id.clone(),
            state: self.radio.clone(),
        });
    }

    /// Leaving `Monitoring`: mark and publish the stale state before any
    /// connection-state event goes out.
    fn mark_stale(&mut self) {
        self.radio.stale = true;
        self.publish_radio();
    }
}

async fn run(
    mut adapter: Box<dyn ProtocolAdapter>,
    hub: Arc<EventHub>,
    config: SupervisorConfig,
    mut rx: mpsc::Receiver<Request>,
    status_tx: watch::Sender<(ConnectionState, Option<String>)>,
    id: DeviceId,
) {
    let mut ctx = Ctx {
        hub,
        config,
        status_tx,
        id,
        radio: RadioState::default(),
    };

    loop {
        match rx.recv().await {
            None => break,
            Some(Request::Disconnect) => {
                // Already parked; nothing to release.
            }
            Some(Request::Command(_, reply)) => {
                let _ = reply.send(Err(Error::NotConnected));
            }
            Some(Request::Connect) => {
                if let Episode::HandleGone = episode(&mut *adapter, &mut ctx, &mut rx).await {
                    break;
                }
            }
        }
    }

    // Handle dropped: release the transport within the bounded grace.
    let _ = tokio::time::timeout(ctx.config.teardown_timeout, adapter.disconnect()).await;
}

/// One connect episode: retry loop, then monitoring, until parked.
async fn episode(
    adapter: &mut dyn ProtocolAdapter,
    ctx: &mut Ctx,
    rx: &mut mpsc::Receiver<Request>,
) -> Episode {
    let mut consecutive_failures: u32 = 0;

    loop {
        ctx.set_state(ConnectionState::Connecting, None);

        let connect_error = match adapter.connect().await {
            Ok(()) => None,
            Err(e) => Some(e),
        };

        if let Some(e) = connect_error {
            let _ = tokio::time::timeout(ctx.config.teardown_timeout, adapter.disconnect()).await;

            if !e.is_retryable() {
                tracing::warn!(id = %ctx.id, error = %e, "connect failed, not retryable");
                ctx.set_state(ConnectionState::Error, Some(e.to_string()));
                return Episode::Parked;
            }

            consecutive_failures += 1;
            if consecutive_failures > ctx.config.max_retries {
                tracing::warn!(id = %ctx.id, error = %e, attempts = consecutive_failures,
                    "retry threshold exceeded");
                ctx.set_state(ConnectionState::Error, Some(e.to_string()));
                return Episode::Parked;
            }

            tracing::debug!(id = %ctx.id, error = %e, attempt = consecutive_failures,
                "connect failed, backing off");
            match backoff_wait(ctx, rx, consecutive_failures).await {
                Wait::Elapsed => continue,
                Wait::DisconnectRequested => {
                    ctx.set_state(ConnectionState::Disconnected, None);
                    return Episode::Parked;
                }
                Wait::HandleGone => return Episode::HandleGone,
            }
        }

        ctx.set_state(ConnectionState::Connected, None);

        let Some(mut updates) = adapter.take_updates() else {
            let _ = tokio::time::timeout(ctx.config.teardown_timeout, adapter.disconnect()).await;
            ctx.set_state(
                ConnectionState::Error,
                Some("adapter produced no update stream".into()),
            );
            return Episode::Parked;
        };

        ctx.set_state(ConnectionState::Monitoring, None);
        consecutive_failures = 0;

        match monitor(adapter, ctx, rx, &mut updates).await {
            Monitor::DisconnectRequested => {
                ctx.mark_stale();
                let _ =
                    tokio::time::timeout(ctx.config.teardown_timeout, adapter.disconnect()).await;
                ctx.set_state(ConnectionState::Disconnected, None);
                return Episode::Parked;
            }
            Monitor::HandleGone => return Episode::HandleGone,
            Monitor::LinkLost => {
                ctx.mark_stale();
                let _ =
                    tokio::time::timeout(ctx.config.teardown_timeout, adapter.disconnect()).await;
                consecutive_failures = 1;
                tracing::debug!(id = %ctx.id, "link lost, reconnecting");
                match backoff_wait(ctx, rx, consecutive_failures).await {
                    Wait::Elapsed => continue,
                    Wait::DisconnectRequested => {
                        ctx.set_state(ConnectionState::Disconnected, None);
                        return Episode::Parked;
                    }
                    Wait::HandleGone => return Episode::HandleGone,
                }
            }
        }
    }
}

/// How the monitoring loop ended.
enum Monitor {
    DisconnectRequested,
    LinkLost,
    HandleGone,
}

/// Monitoring: forward deltas, route commands. Requests win the race so a
/// disconnect is never queued behind a burst of updates.
async fn monitor(
    adapter: &mut dyn ProtocolAdapter,
    ctx: &mut Ctx,
    rx: &mut mpsc::Receiver<Request>,
    updates: &mut mpsc::Receiver<StateDelta>,
) -> Monitor {
    loop {
        tokio::select! {
            biased;

            request = rx.recv() => match request {
                None => return Monitor::HandleGone,
                Some(Request::Disconnect) => return Monitor::DisconnectRequested,
                Some(Request::Connect) => {
                    // Already connected; nothing to do.
                }
                Some(Request::Command(cmd, reply)) => {
                    let result = route_command(adapter, ctx, cmd).await;
                    let _ = reply.send(result);
                }
            },

            delta = updates.recv() => match delta {
                Some(delta) => {
                    if ctx.radio.apply(&delta) {
                        ctx.publish_radio();
                    }
                }
                None => return Monitor::LinkLost,
            },
        }
    }
}

/// Route one command through the adapter.
///
/// Mode changes pass through the compensator: switching between the CW
/// and sideband families retunes by the sidetone offset so the signal
/// stays put.
async fn route_command(
    adapter: &mut dyn ProtocolAdapter,
    ctx: &Ctx,
    cmd: AdapterCommand,
) -> Result<()> {
    match cmd {
        AdapterCommand::SetMode(mode) => {
            let corrected = compensate(ctx.radio.frequency_hz, &ctx.radio.mode, &mode);
            adapter.send_command(AdapterCommand::SetMode(mode)).await?;
            if corrected != ctx.radio.frequency_hz {
                adapter
                    .send_command(AdapterCommand::SetFrequency(corrected))
                    .await?;
            }
            Ok(())
        }
        other => adapter.send_command(other).await,
    }
}

/// How a backoff sleep ended.
enum Wait {
    Elapsed,
    DisconnectRequested,
    HandleGone,
}

/// Sleep out one backoff period, still answering requests: commands get
/// `NotConnected`, a disconnect interrupts the sleep immediately.
async fn backoff_wait(ctx: &Ctx, rx: &mut mpsc::Receiver<Request>, attempt: u32) -> Wait {
    let exp = ctx
        .config
        .backoff_base
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1).min(16)));
    let capped = exp.min(ctx.config.backoff_cap);
    // Jitter spreads simultaneous reconnects across the fleet.
    let delay = capped.mul_f64(rand::thread_rng().gen_range(0.8..1.2));

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            biased;

            request = rx.recv() => match request {
                None => return Wait::HandleGone,
                Some(Request::Disconnect) => return Wait::DisconnectRequested,
                Some(Request::Connect) => {
                    // Already working on it.
                }
                Some(Request::Command(_, reply)) => {
                    let _ = reply.send(Err(Error::NotConnected));
                }
            },

            _ = &mut sleep => return Wait::Elapsed,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use rigbridge_core::{
        BridgeEvent, Capability, DeviceFamily, DeviceOrigin, RadioDescriptor,
    };

    /// Scripted adapter: connect results pop off a queue; commands are
    /// recorded and optionally echoed back as wire-observed deltas.
    struct FakeAdapter {
        descriptor: RadioDescriptor,
        connect_script: Mutex<VecDeque<Result<()>>>,
        connect_attempts: Arc<Mutex<u32>>,
        sent: Arc<Mutex<Vec<AdapterCommand>>>,
        delta_tx: Arc<Mutex<Option<mpsc::Sender<StateDelta>>>>,
        updates_rx: Option<mpsc::Receiver<StateDelta>>,
        echo: bool,
    }

    struct FakeProbe {
        connect_attempts: Arc<Mutex<u32>>,
        sent: Arc<Mutex<Vec<AdapterCommand>>>,
        delta_tx: Arc<Mutex<Option<mpsc::Sender<StateDelta>>>>,
    }

    impl FakeAdapter {
        fn new(connect_script: Vec<Result<()>>, echo: bool) -> (Box<Self>, FakeProbe) {
            let connect_attempts = Arc::new(Mutex::new(0));
            let sent = Arc::new(Mutex::new(Vec::new()));
            let delta_tx = Arc::new(Mutex::new(None));
            let adapter = Box::new(FakeAdapter {
                descriptor: RadioDescriptor {
                    id: DeviceId::new("sdr6k:FAKE"),
                    family: DeviceFamily::SocketTransceiver,
                    model: "FLEX-6600".into(),
                    address: "127.0.0.1:0".into(),
                    capabilities: vec![Capability::Frequency, Capability::Mode],
                    origin: DeviceOrigin::Discovered,
                },
                connect_script: Mutex::new(connect_script.into()),
                connect_attempts: Arc::clone(&connect_attempts),
                sent: Arc::clone(&sent),
                delta_tx: Arc::clone(&delta_tx),
                updates_rx: None,
                echo,
            });
            let probe = FakeProbe {
                connect_attempts,
                sent,
                delta_tx,
            };
            (adapter, probe)
        }
    }

    #[async_trait]
    impl ProtocolAdapter for FakeAdapter {
        fn descriptor(&self) -> &RadioDescriptor {
            &self.descriptor
        }

        async fn connect(&mut self) -> Result<()> {
            *self.connect_attempts.lock().unwrap() += 1;
            let result = self
                .connect_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            if result.is_ok() {
                let (tx, rx) = mpsc::channel(16);
                *self.delta_tx.lock().unwrap() = Some(tx);
                self.updates_rx = Some(rx);
            }
            result
        }

        async fn disconnect(&mut self) -> Result<()> {
            *self.delta_tx.lock().unwrap() = None;
            Ok(())
        }

        async fn send_command(&mut self, cmd: AdapterCommand) -> Result<()> {
            self.sent.lock().unwrap().push(cmd.clone());
            if self.echo {
                let delta = match &cmd {
                    AdapterCommand::SetFrequency(hz) => StateDelta {
                        frequency_hz: Some(*hz),
                        ..StateDelta::default()
                    },
                    AdapterCommand::SetMode(mode) => StateDelta {
                        mode: Some(mode.clone()),
                        ..StateDelta::default()
                    },
                    AdapterCommand::SetPtt(on) => StateDelta {
                        transmitting: Some(*on),
                        ..StateDelta::default()
                    },
                    _ => StateDelta::default(),
                };
                if !delta.is_empty() {
                    let tx = self.delta_tx.lock().unwrap().clone();
                    if let Some(tx) = tx {
                        let _ = tx.send(delta).await;
                    }
                }
            }
            Ok(())
        }

        fn take_updates(&mut self) -> Option<mpsc::Receiver<StateDelta>> {
            self.updates_rx.take()
        }
    }

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            max_retries: 2,
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(40),
            teardown_timeout: Duration::from_millis(200),
        }
    }

    async fn push_delta(probe: &FakeProbe, delta: StateDelta) {
        let tx = probe.delta_tx.lock().unwrap().clone().expect("connected");
        tx.send(delta).await.unwrap();
    }

    #[tokio::test]
    async fn connect_walks_the_state_machine() {
        let hub = Arc::new(EventHub::new());
        let mut sub = hub.attach();
        let (adapter, _probe) = FakeAdapter::new(vec![Ok(())], false);
        let handle = Supervisor::spawn_with_config(adapter, Arc::clone(&hub), fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Monitoring).await.unwrap();

        // Monitoring is only observed after Connected in the same lifetime.
        let mut states = Vec::new();
        while let Some(event) = sub.try_recv() {
            if let BridgeEvent::ConnectionStateChanged { state, .. } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
            ]
        );
    }

    #[tokio::test]
    async fn deltas_become_state_changed_events() {
        let hub = Arc::new(EventHub::new());
        let mut sub = hub.attach();
        let (adapter, probe) = FakeAdapter::new(vec![Ok(())], false);
        let handle = Supervisor::spawn_with_config(adapter, Arc::clone(&hub), fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Monitoring).await.unwrap();

        push_delta(
            &probe,
            StateDelta {
                frequency_hz: Some(14_250_000),
                mode: Some("USB".into()),
                transmitting: Some(false),
                slice: None,
            },
        )
        .await;

        let state = loop {
            if let BridgeEvent::StateChanged { state, .. } = sub.recv().await {
                break state;
            }
        };
        assert_eq!(state.frequency_hz, 14_250_000);
        assert_eq!(state.mode, "USB");
        assert!(!state.stale);
        assert_eq!(state.band.map(|b| b.to_string()), Some("20m".into()));
    }

    #[tokio::test]
    async fn mode_switch_applies_sidetone_compensation() {
        let hub = Arc::new(EventHub::new());
        let mut sub = hub.attach();
        let (adapter, probe) = FakeAdapter::new(vec![Ok(())], true);
        let handle = Supervisor::spawn_with_config(adapter, Arc::clone(&hub), fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Monitoring).await.unwrap();

        // Radio reports its current position.
        push_delta(
            &probe,
            StateDelta {
                frequency_hz: Some(14_250_000),
                mode: Some("USB".into()),
                ..StateDelta::default()
            },
        )
        .await;
        // Wait until the canonical state reflects the report.
        loop {
            if let BridgeEvent::StateChanged { state, .. } = sub.recv().await {
                if state.frequency_hz == 14_250_000 {
                    break;
                }
            }
        }

        // Client switches to CW; the plane retunes down by 700 Hz.
        handle
            .command(AdapterCommand::SetMode("CW".into()))
            .await
            .unwrap();

        let sent = probe.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                AdapterCommand::SetMode("CW".into()),
                AdapterCommand::SetFrequency(14_249_300),
            ]
        );

        // The echoed wire reports converge on the corrected state.
        let mut last = None;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while tokio::time::Instant::now() < deadline {
            tokio::select! {
                event = sub.recv() => {
                    if let BridgeEvent::StateChanged { state, .. } = event {
                        let done = state.frequency_hz == 14_249_300 && state.mode == "CW";
                        last = Some(state);
                        if done { break; }
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => break,
            }
        }
        let last = last.expect("saw state events");
        assert_eq!(last.frequency_hz, 14_250_000 - 700);
        assert_eq!(last.mode, "CW");
    }

    #[tokio::test]
    async fn retry_threshold_parks_in_error_with_message() {
        let hub = Arc::new(EventHub::new());
        let (adapter, probe) = FakeAdapter::new(
            vec![
                Err(Error::ConnectFailed("refused".into())),
                Err(Error::ConnectFailed("refused".into())),
                Err(Error::ConnectFailed("refused".into())),
            ],
            false,
        );
        let handle = Supervisor::spawn_with_config(adapter, hub, fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Error).await.unwrap();

        let (state, error) = handle.status();
        assert_eq!(state, ConnectionState::Error);
        assert!(error.unwrap().contains("refused"));
        // Initial attempt plus max_retries.
        assert_eq!(*probe.connect_attempts.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_parks_immediately() {
        let hub = Arc::new(EventHub::new());
        let (adapter, probe) = FakeAdapter::new(
            vec![Err(Error::AuthRequired("password rejected".into()))],
            false,
        );
        let handle = Supervisor::spawn_with_config(adapter, hub, fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Error).await.unwrap();

        assert_eq!(*probe.connect_attempts.lock().unwrap(), 1);
        let (_, error) = handle.status();
        assert!(error.unwrap().contains("password rejected"));
    }

    #[tokio::test]
    async fn disconnect_during_backoff_is_immediate() {
        let hub = Arc::new(EventHub::new());
        let (adapter, _probe) = FakeAdapter::new(
            vec![Err(Error::ConnectFailed("refused".into()))],
            false,
        );
        // Long backoff so the test would hang if disconnect waited it out.
        let config = SupervisorConfig {
            max_retries: 5,
            backoff_base: Duration::from_secs(30),
            backoff_cap: Duration::from_secs(60),
            teardown_timeout: Duration::from_millis(200),
        };
        let handle = Supervisor::spawn_with_config(adapter, hub, config);

        handle.connect().await.unwrap();
        // Give the connect attempt time to fail into backoff.
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.disconnect().await.unwrap();
        tokio::time::timeout(
            Duration::from_millis(500),
            handle.wait_for_state(ConnectionState::Disconnected),
        )
        .await
        .expect("disconnect must not wait for backoff")
        .unwrap();
    }

    #[tokio::test]
    async fn disconnect_marks_state_stale_in_snapshot() {
        let hub = Arc::new(EventHub::new());
        let (adapter, probe) = FakeAdapter::new(vec![Ok(())], false);
        let handle = Supervisor::spawn_with_config(adapter, Arc::clone(&hub), fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Monitoring).await.unwrap();
        push_delta(
            &probe,
            StateDelta {
                frequency_hz: Some(14_250_000),
                transmitting: Some(true),
                ..StateDelta::default()
            },
        )
        .await;
        // Let the delta land before disconnecting.
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.disconnect().await.unwrap();
        handle.wait_for_state(ConnectionState::Disconnected).await.unwrap();

        // A fresh subscriber's snapshot shows the state as stale, so no
        // UI renders the frozen values as live.
        let mut sub = hub.attach();
        let mut saw_stale = false;
        while let Some(event) = sub.try_recv() {
            if let BridgeEvent::StateChanged { state, .. } = event {
                assert!(state.stale);
                assert_eq!(state.frequency_hz, 14_250_000);
                saw_stale = true;
            }
        }
        assert!(saw_stale, "snapshot must include the stale radio state");
    }

    #[tokio::test]
    async fn link_loss_reconnects_and_resumes_monitoring() {
        let hub = Arc::new(EventHub::new());
        let (adapter, probe) = FakeAdapter::new(vec![Ok(()), Ok(())], false);
        let handle = Supervisor::spawn_with_config(adapter, Arc::clone(&hub), fast_config());

        handle.connect().await.unwrap();
        handle.wait_for_state(ConnectionState::Monitoring).await.unwrap();

        // Watch the hub so every transition is observed, however fast.
        let mut sub = hub.attach();
        while sub.try_recv().is_some() {}

        // Sever the link: the adapter's update channel closes.
        {
            let tx = probe.delta_tx.lock().unwrap().take();
            drop(tx);
        }

        // The supervisor reconnects on its own: Connecting -> Connected
        // -> Monitoring again, in order.
        let mut states = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), async {
            while states.last() != Some(&ConnectionState::Monitoring) {
                if let BridgeEvent::ConnectionStateChanged { state, .. } = sub.recv().await {
                    states.push(state);
                }
            }
        })
        .await
        .expect("reconnect after link loss");

        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Monitoring,
            ]
        );
        assert_eq!(*probe.connect_attempts.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn command_while_disconnected_is_not_connected() {
        let hub = Arc::new(EventHub::new());
        let (adapter, _probe) = FakeAdapter::new(vec![], false);
        let handle = Supervisor::spawn_with_config(adapter, hub, fast_config());

        let err = handle
            .command(AdapterCommand::SetFrequency(7_030_000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
