//! The `ProtocolAdapter` trait -- unified interface for all device families.
//!
//! Each device family crate (rigbridge-socket, rigbridge-native,
//! rigbridge-accessory) provides a concrete type implementing this trait.
//! The supervisor drives adapters exclusively through `dyn ProtocolAdapter`
//! and never inspects concrete types.
//!
//! # Failure semantics
//!
//! Adapters never retry internally. A transport failure surfaces as an
//! `Err` which the supervisor maps to the `Error` connection state; retry
//! policy (backoff, thresholds) is owned by the supervisor alone.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{RadioDescriptor, StateDelta};

/// A command issued toward a device through its adapter.
///
/// Only frequency, mode, and transmit state are unified across families;
/// anything vendor-specific rides through `Raw` opaquely.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCommand {
    /// Tune to a frequency in hertz.
    SetFrequency(u64),
    /// Switch operating mode (vendor mode string).
    SetMode(String),
    /// Key or unkey the transmitter.
    SetPtt(bool),
    /// Send text through the device's CW keyer.
    SendCw(String),
    /// Abort any in-progress CW transmission.
    StopCw,
    /// Set the CW keyer speed in words per minute.
    SetCwSpeed(u8),
    /// Vendor-specific command passed through unmodified.
    Raw(String),
}

/// Unified asynchronous interface over one device's native protocol.
///
/// One adapter instance exists per connected device, owned by that
/// device's supervisor. State observed on the wire is pushed as
/// [`StateDelta`]s through the channel obtained from
/// [`take_updates`](ProtocolAdapter::take_updates).
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// The descriptor this adapter was built for.
    fn descriptor(&self) -> &RadioDescriptor;

    /// Establish the underlying transport and perform any handshake.
    ///
    /// Returns typed errors; the caller decides whether to retry.
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the transport and stop background tasks.
    ///
    /// Must release the transport resource even if the remote end never
    /// responds; implementations bound their teardown internally.
    async fn disconnect(&mut self) -> Result<()>;

    /// Send a command to the device.
    async fn send_command(&mut self, cmd: AdapterCommand) -> Result<()>;

    /// Take the state-delta channel.
    ///
    /// Yields deltas in the order the adapter observed them on the wire.
    /// Returns `None` on second and later calls; there is exactly one
    /// consumer (the supervisor).
    fn take_updates(&mut self) -> Option<mpsc::Receiver<StateDelta>>;
}
