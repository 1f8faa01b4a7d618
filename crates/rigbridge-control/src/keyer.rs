//! CW keying coordinator.
//!
//! Keying requests are serialized per device: only one text send is in
//! flight per radio at a time, later sends queue behind it. A stop
//! request always wins immediately -- it cancels the in-flight send
//! through a keyed cancellation handle and tells the device to abort.
//! Speed changes pass straight through and cancel nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rigbridge_core::{AdapterCommand, DeviceId, Result};

use crate::supervisor::SupervisorHandle;

/// Default keyer speed assumed until a speed change is issued.
const DEFAULT_WPM: u8 = 25;

/// Morse timing: one dit is `1200 / wpm` milliseconds (PARIS standard),
/// and an average character costs about ten dit units including spacing.
const DIT_UNITS_PER_CHAR: u64 = 10;

/// How a keying request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CwOutcome {
    /// The full text was transmitted.
    Completed,
    /// A stop request cancelled the transmission.
    Stopped,
}

/// Per-device keying bookkeeping.
struct KeySlot {
    /// Serializes sends: one in flight per device.
    gate: tokio::sync::Mutex<()>,
    /// Cancellation handle for the current in-flight send, replaced at
    /// the start of each send. Request-scoped, keyed by device.
    current: Mutex<CancellationToken>,
    /// Last commanded keyer speed, for transmission-time estimates.
    wpm: AtomicU8,
}

/// Coordinates CW keying across all connected devices.
#[derive(Default)]
pub struct CwKeyer {
    slots: Mutex<HashMap<DeviceId, Arc<KeySlot>>>,
}

impl CwKeyer {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &DeviceId) -> Arc<KeySlot> {
        let mut slots = self.slots.lock().unwrap();
        Arc::clone(slots.entry(id.clone()).or_insert_with(|| {
            Arc::new(KeySlot {
                gate: tokio::sync::Mutex::new(()),
                current: Mutex::new(CancellationToken::new()),
                wpm: AtomicU8::new(DEFAULT_WPM),
            })
        }))
    }

    /// Send text through the device's keyer.
    ///
    /// Holds the device's slot for the estimated transmission time so a
    /// second send cannot overlap; resolves early with
    /// [`CwOutcome::Stopped`] if a stop lands first.
    pub async fn send_text(&self, device: &SupervisorHandle, text: &str) -> Result<CwOutcome> {
        let slot = self.slot(device.id());
        let _in_flight = slot.gate.lock().await;

        let token = CancellationToken::new();
        *slot.current.lock().unwrap() = token.clone();

        device
            .command(AdapterCommand::SendCw(text.to_string()))
            .await?;

        let wpm = slot.wpm.load(Ordering::Relaxed).max(5);
        let airtime = estimate_airtime(text, wpm);
        tracing::debug!(id = %device.id(), wpm = wpm, ms = airtime.as_millis() as u64,
            "cw send in flight");

        tokio::select! {
            _ = token.cancelled() => Ok(CwOutcome::Stopped),
            _ = tokio::time::sleep(airtime) => Ok(CwOutcome::Completed),
        }
    }

    /// Abort the in-flight send, if any, and silence the keyer.
    ///
    /// Does not wait for the in-flight send's slot: the cancel lands
    /// first, then the stop command goes to the device.
    pub async fn stop(&self, device: &SupervisorHandle) -> Result<()> {
        let slot = self.slot(device.id());
        slot.current.lock().unwrap().cancel();
        device.command(AdapterCommand::StopCw).await
    }

    /// Change the keyer speed. Never cancels an in-flight send.
    pub async fn set_speed(&self, device: &SupervisorHandle, wpm: u8) -> Result<()> {
        let slot = self.slot(device.id());
        slot.wpm.store(wpm, Ordering::Relaxed);
        device.command(AdapterCommand::SetCwSpeed(wpm)).await
    }
}

/// Rough on-air duration of a text at a keyer speed.
fn estimate_airtime(text: &str, wpm: u8) -> Duration {
    let dit_ms = 1200 / wpm as u64;
    Duration::from_millis(text.chars().count() as u64 * DIT_UNITS_PER_CHAR * dit_ms)
}
