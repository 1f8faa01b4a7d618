//! rigbridge-wsjtx: the digital-mode UDP bridge.
//!
//! WSJT-X and compatible decoders announce status, decodes, and logged
//! QSOs as binary UDP frames. [`frames`] is the pure, I/O-free codec for
//! that wire format; [`bridge`] is the listener that turns accepted
//! frames into hub events and relays every received datagram verbatim to
//! configured downstream consumers.

pub mod bridge;
pub mod frames;

pub use bridge::{BridgeConfig, DigitalModeBridge};
pub use frames::{MAGIC, decode_frame};
