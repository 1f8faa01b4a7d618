//! Messages decoded from the digital-mode UDP bridge.
//!
//! These are the typed forms of the external decoder application's binary
//! frames (WSJT-X and compatible forks). They are transient: decoded once,
//! forwarded through the hub, never retained by the plane.
//!
//! The wire decoding itself lives in the `rigbridge-wsjtx` crate; this
//! module only defines the message shapes so the event surface can carry
//! them without a protocol dependency.

/// A date-time decoded from the compound wire encoding: a Julian day
/// number plus milliseconds since midnight. Kept raw rather than converted
/// so no timezone policy leaks into the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireDateTime {
    /// Julian day number.
    pub julian_day: u64,
    /// Milliseconds since midnight.
    pub msecs_since_midnight: u32,
    /// Time spec byte: 0 local, 1 UTC, 2 offset-from-UTC.
    pub timespec: u8,
    /// Offset from UTC in seconds, only meaningful when `timespec == 2`.
    pub utc_offset_secs: i32,
}

/// A decoded digital-mode frame, tagged by message type.
#[derive(Debug, Clone, PartialEq)]
pub enum DigitalModeMessage {
    /// Periodic liveness announcement from the decoder application.
    Heartbeat {
        /// Sender's unique client id (e.g. "WSJT-X").
        id: String,
        /// Maximum schema number the sender understands.
        max_schema: u32,
        /// Application version string.
        version: Option<String>,
        /// Source-control revision string.
        revision: Option<String>,
    },

    /// Operating status snapshot from the decoder application.
    Status {
        id: String,
        /// Dial frequency in hertz.
        dial_frequency_hz: u64,
        /// Operating mode (e.g. "FT8").
        mode: Option<String>,
        /// Callsign of the station being worked, if any.
        dx_call: Option<String>,
        /// Signal report in progress.
        report: Option<String>,
        /// Transmit mode if it differs from the receive mode.
        tx_mode: Option<String>,
        tx_enabled: bool,
        transmitting: bool,
        decoding: bool,
        /// Receive audio offset in hertz.
        rx_offset_hz: u32,
        /// Transmit audio offset in hertz.
        tx_offset_hz: u32,
        /// Local station callsign.
        de_call: Option<String>,
        /// Local station grid square.
        de_grid: Option<String>,
        /// Remote station grid square.
        dx_grid: Option<String>,
    },

    /// One decoded over-the-air transmission.
    Decode {
        id: String,
        /// Whether this is a new decode (vs. a replay of the period).
        is_new: bool,
        /// Milliseconds since midnight of the decode.
        time_ms: u32,
        /// Signal-to-noise ratio in dB.
        snr: i32,
        /// Time offset from the decoding period start, in seconds.
        delta_time_s: f64,
        /// Audio frequency offset in hertz.
        delta_frequency_hz: u32,
        /// Decoding mode indicator.
        mode: Option<String>,
        /// The decoded message text (e.g. "CQ W1AW FN31").
        message: Option<String>,
        low_confidence: bool,
        /// Replayed from disk rather than heard live.
        off_air: bool,
    },

    /// A contact the decoder application logged.
    QsoLogged {
        id: String,
        time_off: WireDateTime,
        dx_call: Option<String>,
        dx_grid: Option<String>,
        /// Transmit frequency in hertz.
        tx_frequency_hz: u64,
        mode: Option<String>,
        report_sent: Option<String>,
        report_received: Option<String>,
        tx_power: Option<String>,
        comments: Option<String>,
        name: Option<String>,
        time_on: WireDateTime,
        operator_call: Option<String>,
        my_call: Option<String>,
        my_grid: Option<String>,
        exchange_sent: Option<String>,
        exchange_received: Option<String>,
    },
}

impl DigitalModeMessage {
    /// The sender id common to every message type.
    pub fn sender_id(&self) -> &str {
        match self {
            DigitalModeMessage::Heartbeat { id, .. }
            | DigitalModeMessage::Status { id, .. }
            | DigitalModeMessage::Decode { id, .. }
            | DigitalModeMessage::QsoLogged { id, .. } => id,
        }
    }
}
