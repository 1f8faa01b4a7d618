//! The synchronous rig-control library boundary.
//!
//! [`RigBackend`] models the foreign library's surface: blocking calls,
//! one logical handle per rig, no reentrancy guarantees. Concrete
//! implementations wrap the actual native binding; tests substitute an
//! in-memory fake. Nothing above the worker thread ever calls these
//! methods directly.

use rigbridge_core::{Error, Result};

/// One polled reading of everything the library exposes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigSnapshot {
    /// Frequency in hertz.
    pub frequency_hz: u64,
    /// Vendor mode string as the library reports it.
    pub mode: String,
    /// Whether the rig reports PTT asserted.
    pub ptt: bool,
}

/// Blocking control surface of a natively-linked rig library.
///
/// All methods may block for a serial round-trip. The worker thread owns
/// the instance exclusively, which is what makes the non-reentrancy of
/// the underlying library safe.
pub trait RigBackend: Send + Sync {
    /// Open the rig handle (port open, identification exchange).
    fn open(&mut self) -> Result<()>;

    /// Close the rig handle. Infallible by contract: the library's own
    /// close never reports useful errors.
    fn close(&mut self);

    /// Read the current frequency in hertz.
    fn read_frequency(&mut self) -> Result<u64>;

    /// Read the current mode string.
    fn read_mode(&mut self) -> Result<String>;

    /// Read the PTT state.
    fn read_ptt(&mut self) -> Result<bool>;

    /// Tune to a frequency in hertz.
    fn set_frequency(&mut self, freq_hz: u64) -> Result<()>;

    /// Switch mode.
    fn set_mode(&mut self, mode: &str) -> Result<()>;

    /// Key or unkey the transmitter.
    fn set_ptt(&mut self, on: bool) -> Result<()>;

    /// Send CW text through the library's keyer, where supported.
    fn send_cw(&mut self, _text: &str) -> Result<()> {
        Err(Error::Unsupported("CW keying not supported".into()))
    }

    /// Abort an in-progress CW transmission, where supported.
    fn stop_cw(&mut self) -> Result<()> {
        Err(Error::Unsupported("CW keying not supported".into()))
    }

    /// Set the keyer speed in words per minute, where supported.
    fn set_cw_speed(&mut self, _wpm: u8) -> Result<()> {
        Err(Error::Unsupported("CW keying not supported".into()))
    }

    /// Compose a full snapshot from the individual reads.
    fn snapshot(&mut self) -> Result<RigSnapshot> {
        Ok(RigSnapshot {
            frequency_hz: self.read_frequency()?,
            mode: self.read_mode()?,
            ptt: self.read_ptt()?,
        })
    }
}
