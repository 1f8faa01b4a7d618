//! WSJT-X binary frame decoding.
//!
//! Every frame starts with a 4-byte magic constant, a 4-byte schema
//! version, and a 4-byte message-type tag, all big-endian. Strings are a
//! 4-byte big-endian length prefix followed by that many UTF-8 bytes,
//! with length `0xFFFFFFFF` meaning an absent string. Date-times are a
//! compound encoding: a u64 Julian day, a u32 milliseconds-since-midnight,
//! and a time-spec byte (with an extra i32 UTC offset when the spec byte
//! is 2).
//!
//! This module is a pure parser: no I/O, all functions operate on byte
//! slices. Frames with the wrong magic, an unsupported schema, or fields
//! truncated short of their declared message type decode to
//! [`Error::MalformedFrame`] and are never propagated further.

use rigbridge_core::digital::{DigitalModeMessage, WireDateTime};
use rigbridge_core::{Error, Result};

/// Frame magic constant.
pub const MAGIC: u32 = 0xADBC_CBDA;

/// Oldest schema this decoder understands.
pub const MIN_SCHEMA: u32 = 2;

/// Message type tags.
pub const TYPE_HEARTBEAT: u32 = 0;
pub const TYPE_STATUS: u32 = 1;
pub const TYPE_DECODE: u32 = 2;
pub const TYPE_QSO_LOGGED: u32 = 5;

/// Sentinel length meaning "absent string".
const NULL_STRING: u32 = 0xFFFF_FFFF;

/// Big-endian cursor over a frame body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::MalformedFrame(format!(
                "frame truncated: wanted {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    /// Length-prefixed UTF-8 string; `0xFFFFFFFF` decodes to `None`.
    fn string(&mut self) -> Result<Option<String>> {
        let len = self.u32()?;
        if len == NULL_STRING {
            return Ok(None);
        }
        let bytes = self.take(len as usize)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::MalformedFrame("string field is not valid UTF-8".into()))?;
        Ok(Some(s.to_string()))
    }

    /// Like [`string`](Reader::string), but tolerates the frame simply
    /// ending first -- used for fields later schema revisions appended.
    fn tail_string(&mut self) -> Result<Option<String>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        self.string()
    }

    /// Compound date-time: Julian day, ms since midnight, time spec.
    fn datetime(&mut self) -> Result<WireDateTime> {
        let julian_day = self.u64()?;
        let msecs_since_midnight = self.u32()?;
        let timespec = self.u8()?;
        let utc_offset_secs = if timespec == 2 { self.i32()? } else { 0 };
        Ok(WireDateTime {
            julian_day,
            msecs_since_midnight,
            timespec,
            utc_offset_secs,
        })
    }
}

/// Decode one datagram into a typed message.
pub fn decode_frame(data: &[u8]) -> Result<DigitalModeMessage> {
    let mut r = Reader::new(data);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(Error::MalformedFrame(format!(
            "bad magic 0x{magic:08X}, expected 0x{MAGIC:08X}"
        )));
    }
    let schema = r.u32()?;
    if schema < MIN_SCHEMA {
        return Err(Error::MalformedFrame(format!(
            "schema {schema} older than supported minimum {MIN_SCHEMA}"
        )));
    }
    let msg_type = r.u32()?;
    let id = r
        .string()?
        .ok_or_else(|| Error::MalformedFrame("frame is missing the sender id".into()))?;

    match msg_type {
        TYPE_HEARTBEAT => decode_heartbeat(&mut r, id),
        TYPE_STATUS => decode_status(&mut r, id),
        TYPE_DECODE => decode_decode(&mut r, id),
        TYPE_QSO_LOGGED => decode_qso_logged(&mut r, id),
        other => Err(Error::MalformedFrame(format!(
            "unsupported message type {other}"
        ))),
    }
}

fn decode_heartbeat(r: &mut Reader<'_>, id: String) -> Result<DigitalModeMessage> {
    Ok(DigitalModeMessage::Heartbeat {
        id,
        max_schema: r.u32()?,
        version: r.tail_string()?,
        revision: r.tail_string()?,
    })
}

fn decode_status(r: &mut Reader<'_>, id: String) -> Result<DigitalModeMessage> {
    Ok(DigitalModeMessage::Status {
        id,
        dial_frequency_hz: r.u64()?,
        mode: r.string()?,
        dx_call: r.string()?,
        report: r.string()?,
        tx_mode: r.string()?,
        tx_enabled: r.bool()?,
        transmitting: r.bool()?,
        decoding: r.bool()?,
        rx_offset_hz: r.u32()?,
        tx_offset_hz: r.u32()?,
        de_call: r.string()?,
        de_grid: r.string()?,
        dx_grid: r.string()?,
        // Later schema revisions append watchdog/sub-mode/config fields;
        // nothing downstream consumes them.
    })
}

fn decode_decode(r: &mut Reader<'_>, id: String) -> Result<DigitalModeMessage> {
    Ok(DigitalModeMessage::Decode {
        id,
        is_new: r.bool()?,
        time_ms: r.u32()?,
        snr: r.i32()?,
        delta_time_s: r.f64()?,
        delta_frequency_hz: r.u32()?,
        mode: r.string()?,
        message: r.string()?,
        low_confidence: r.bool()?,
        off_air: r.bool()?,
    })
}

fn decode_qso_logged(r: &mut Reader<'_>, id: String) -> Result<DigitalModeMessage> {
    Ok(DigitalModeMessage::QsoLogged {
        id,
        time_off: r.datetime()?,
        dx_call: r.string()?,
        dx_grid: r.string()?,
        tx_frequency_hz: r.u64()?,
        mode: r.string()?,
        report_sent: r.string()?,
        report_received: r.string()?,
        tx_power: r.string()?,
        comments: r.string()?,
        name: r.string()?,
        time_on: r.datetime()?,
        operator_call: r.tail_string()?,
        my_call: r.tail_string()?,
        my_grid: r.tail_string()?,
        exchange_sent: r.tail_string()?,
        exchange_received: r.tail_string()?,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Frame construction helpers shared by this crate's tests.

    use super::*;

    #[derive(Default)]
    pub struct FrameBuilder {
        bytes: Vec<u8>,
    }

    impl FrameBuilder {
        pub fn new(schema: u32, msg_type: u32, id: &str) -> Self {
            let mut b = FrameBuilder::default();
            b.u32(MAGIC);
            b.u32(schema);
            b.u32(msg_type);
            b.string(Some(id));
            b
        }

        pub fn u8(&mut self, v: u8) -> &mut Self {
            self.bytes.push(v);
            self
        }

        pub fn bool(&mut self, v: bool) -> &mut Self {
            self.u8(v as u8)
        }

        pub fn u32(&mut self, v: u32) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn i32(&mut self, v: i32) -> &mut Self {
            self.u32(v as u32)
        }

        pub fn u64(&mut self, v: u64) -> &mut Self {
            self.bytes.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn f64(&mut self, v: f64) -> &mut Self {
            self.u64(v.to_bits())
        }

        pub fn string(&mut self, v: Option<&str>) -> &mut Self {
            match v {
                None => self.u32(NULL_STRING),
                Some(s) => {
                    self.u32(s.len() as u32);
                    self.bytes.extend_from_slice(s.as_bytes());
                    self
                }
            }
        }

        pub fn datetime(&mut self, julian_day: u64, msecs: u32, timespec: u8) -> &mut Self {
            self.u64(julian_day);
            self.u32(msecs);
            self.u8(timespec)
        }

        pub fn build(&self) -> Vec<u8> {
            self.bytes.clone()
        }
    }

    /// A representative Decode frame used by several tests.
    pub fn sample_decode_frame() -> Vec<u8> {
        let mut b = FrameBuilder::new(2, TYPE_DECODE, "WSJT-X");
        b.bool(true)
            .u32(43_200_000)
            .i32(-5)
            .f64(0.2)
            .u32(1500)
            .string(Some("FT8"))
            .string(Some("CQ W1AW FN31"))
            .bool(false)
            .bool(false);
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FrameBuilder, sample_decode_frame};
    use super::*;

    #[test]
    fn decode_frame_exact_fields() {
        let msg = decode_frame(&sample_decode_frame()).unwrap();
        match msg {
            DigitalModeMessage::Decode {
                id,
                is_new,
                time_ms,
                snr,
                delta_time_s,
                delta_frequency_hz,
                mode,
                message,
                low_confidence,
                off_air,
            } => {
                assert_eq!(id, "WSJT-X");
                assert!(is_new);
                assert_eq!(time_ms, 43_200_000);
                assert_eq!(snr, -5);
                assert!((delta_time_s - 0.2).abs() < 1e-9);
                assert_eq!(delta_frequency_hz, 1500);
                assert_eq!(mode.as_deref(), Some("FT8"));
                assert_eq!(message.as_deref(), Some("CQ W1AW FN31"));
                assert!(!low_confidence);
                assert!(!off_air);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn wrong_magic_is_malformed() {
        let mut frame = sample_decode_frame();
        frame[0] = 0xDE;
        let err = decode_frame(&frame).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let frame = sample_decode_frame();
        for cut in [3, 11, 16, frame.len() - 1] {
            let err = decode_frame(&frame[..cut]).unwrap_err();
            assert!(matches!(err, Error::MalformedFrame(_)), "cut at {cut}");
        }
    }

    #[test]
    fn old_schema_is_malformed() {
        let frame = FrameBuilder::new(1, TYPE_DECODE, "WSJT-X").build();
        let err = decode_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn unknown_message_type_is_malformed() {
        let frame = FrameBuilder::new(2, 42, "WSJT-X").build();
        assert!(decode_frame(&frame).is_err());
    }

    #[test]
    fn heartbeat_with_and_without_version() {
        let mut b = FrameBuilder::new(2, TYPE_HEARTBEAT, "WSJT-X");
        b.u32(3).string(Some("2.6.1")).string(Some("a1b2c3"));
        match decode_frame(&b.build()).unwrap() {
            DigitalModeMessage::Heartbeat {
                max_schema,
                version,
                revision,
                ..
            } => {
                assert_eq!(max_schema, 3);
                assert_eq!(version.as_deref(), Some("2.6.1"));
                assert_eq!(revision.as_deref(), Some("a1b2c3"));
            }
            other => panic!("expected Heartbeat, got {other:?}"),
        }

        // Older senders omit the trailing strings entirely.
        let mut short = FrameBuilder::new(2, TYPE_HEARTBEAT, "JTDX");
        short.u32(2);
        match decode_frame(&short.build()).unwrap() {
            DigitalModeMessage::Heartbeat {
                version, revision, ..
            } => {
                assert!(version.is_none());
                assert!(revision.is_none());
            }
            other => panic!("expected Heartbeat, got {other:?}"),
        }
    }

    #[test]
    fn status_frame_decodes() {
        let mut b = FrameBuilder::new(2, TYPE_STATUS, "WSJT-X");
        b.u64(14_074_000)
            .string(Some("FT8"))
            .string(Some("DL1ABC"))
            .string(Some("-12"))
            .string(Some("FT8"))
            .bool(true)
            .bool(false)
            .bool(true)
            .u32(1200)
            .u32(1200)
            .string(Some("W1AW"))
            .string(Some("FN31"))
            .string(None);

        match decode_frame(&b.build()).unwrap() {
            DigitalModeMessage::Status {
                dial_frequency_hz,
                mode,
                dx_call,
                tx_enabled,
                transmitting,
                decoding,
                rx_offset_hz,
                de_call,
                de_grid,
                dx_grid,
                ..
            } => {
                assert_eq!(dial_frequency_hz, 14_074_000);
                assert_eq!(mode.as_deref(), Some("FT8"));
                assert_eq!(dx_call.as_deref(), Some("DL1ABC"));
                assert!(tx_enabled);
                assert!(!transmitting);
                assert!(decoding);
                assert_eq!(rx_offset_hz, 1200);
                assert_eq!(de_call.as_deref(), Some("W1AW"));
                assert_eq!(de_grid.as_deref(), Some("FN31"));
                assert!(dx_grid.is_none());
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn null_string_sentinel_decodes_to_none() {
        let mut b = FrameBuilder::new(2, TYPE_DECODE, "WSJT-X");
        b.bool(false)
            .u32(0)
            .i32(0)
            .f64(0.0)
            .u32(0)
            .string(None)
            .string(None)
            .bool(false)
            .bool(false);
        match decode_frame(&b.build()).unwrap() {
            DigitalModeMessage::Decode { mode, message, .. } => {
                assert!(mode.is_none());
                assert!(message.is_none());
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn qso_logged_frame_decodes() {
        let mut b = FrameBuilder::new(2, TYPE_QSO_LOGGED, "WSJT-X");
        b.datetime(2_460_000, 51_300_000, 1)
            .string(Some("DL1ABC"))
            .string(Some("JO62"))
            .u64(14_075_500)
            .string(Some("FT8"))
            .string(Some("-12"))
            .string(Some("-08"))
            .string(Some("25"))
            .string(None)
            .string(Some("Hans"))
            .datetime(2_460_000, 51_180_000, 1)
            .string(None)
            .string(Some("W1AW"))
            .string(Some("FN31"));

        match decode_frame(&b.build()).unwrap() {
            DigitalModeMessage::QsoLogged {
                time_off,
                dx_call,
                tx_frequency_hz,
                report_sent,
                report_received,
                name,
                time_on,
                my_call,
                my_grid,
                exchange_sent,
                ..
            } => {
                assert_eq!(time_off.julian_day, 2_460_000);
                assert_eq!(time_off.msecs_since_midnight, 51_300_000);
                assert_eq!(time_off.timespec, 1);
                assert_eq!(dx_call.as_deref(), Some("DL1ABC"));
                assert_eq!(tx_frequency_hz, 14_075_500);
                assert_eq!(report_sent.as_deref(), Some("-12"));
                assert_eq!(report_received.as_deref(), Some("-08"));
                assert_eq!(name.as_deref(), Some("Hans"));
                assert_eq!(time_on.msecs_since_midnight, 51_180_000);
                assert_eq!(my_call.as_deref(), Some("W1AW"));
                assert_eq!(my_grid.as_deref(), Some("FN31"));
                // Frame ended before the exchange fields.
                assert!(exchange_sent.is_none());
            }
            other => panic!("expected QsoLogged, got {other:?}"),
        }
    }

    #[test]
    fn datetime_with_utc_offset_spec() {
        let mut b = FrameBuilder::new(2, TYPE_QSO_LOGGED, "WSJT-X");
        b.datetime(2_460_000, 0, 2).i32(3600); // timespec 2 carries an offset
        b.string(Some("DL1ABC"))
            .string(None)
            .u64(7_074_000)
            .string(Some("FT8"))
            .string(None)
            .string(None)
            .string(None)
            .string(None)
            .string(None)
            .datetime(2_460_000, 0, 1);

        match decode_frame(&b.build()).unwrap() {
            DigitalModeMessage::QsoLogged { time_off, .. } => {
                assert_eq!(time_off.timespec, 2);
                assert_eq!(time_off.utc_offset_secs, 3600);
            }
            other => panic!("expected QsoLogged, got {other:?}"),
        }
    }
}
