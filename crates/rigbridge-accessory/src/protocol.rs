//! Accessory line protocol encoding and decoding.
//!
//! ```text
//! Request:   C<seq>|<verb> <args...>\n
//! Response:  R<seq>|<hex-status>|<payload>\n
//! ```
//!
//! Status is hexadecimal; `0` means success. Multi-row results repeat the
//! sequence number and terminate with an empty-payload row. Unsolicited
//! status rows share the response shape but carry sequence 0 or a
//! sequence the client never issued; their payloads are `key=value`
//! reports.
//!
//! All functions here are pure parsing -- no I/O is performed.

use rigbridge_core::{AdapterCommand, Error, Result, StateDelta};

/// Status code the box uses to demand a credential.
pub const STATUS_AUTH_REQUIRED: u32 = 0x53;

/// One decoded `R` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRow {
    /// Sequence this row correlates to; 0 marks unsolicited status.
    pub seq: u32,
    /// Hexadecimal status code; 0 is success.
    pub status: u32,
    /// Row payload; empty terminates a multi-row result.
    pub payload: String,
}

impl ResponseRow {
    /// Whether this row terminates its response.
    pub fn is_terminator(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encode a request line (without the newline).
pub fn encode_request(seq: u32, command: &str) -> String {
    format!("C{seq}|{command}")
}

/// Parse one inbound line as a response row.
pub fn parse_row(line: &str) -> Result<ResponseRow> {
    let line = line.trim();
    let rest = line
        .strip_prefix('R')
        .ok_or_else(|| Error::Protocol(format!("line does not start with R: {line}")))?;

    let mut parts = rest.splitn(3, '|');
    let seq = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| Error::Protocol(format!("bad sequence in row: {line}")))?;
    let status = parts
        .next()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
        .ok_or_else(|| Error::Protocol(format!("bad status code in row: {line}")))?;
    let payload = parts.next().unwrap_or("").to_string();

    Ok(ResponseRow {
        seq,
        status,
        payload,
    })
}

/// Translate a unified command into the accessory verb text.
pub fn command_verb(cmd: &AdapterCommand) -> String {
    match cmd {
        AdapterCommand::SetFrequency(hz) => format!("freq {hz}"),
        AdapterCommand::SetMode(mode) => format!("mode {mode}"),
        AdapterCommand::SetPtt(on) => format!("ptt {}", if *on { 1 } else { 0 }),
        AdapterCommand::SendCw(text) => format!("keyer send {text}"),
        AdapterCommand::StopCw => "keyer stop".to_string(),
        AdapterCommand::SetCwSpeed(wpm) => format!("keyer speed {wpm}"),
        AdapterCommand::Raw(text) => text.clone(),
    }
}

/// Parse an unsolicited status payload (`key=value` tokens) into a delta.
///
/// Unknown keys are skipped; a payload with nothing recognizable yields
/// an empty delta the caller drops.
pub fn parse_status_payload(payload: &str) -> StateDelta {
    let mut delta = StateDelta::default();
    for token in payload.split_whitespace() {
        let Some(eq) = token.find('=') else { continue };
        let (key, value) = (&token[..eq], &token[eq + 1..]);
        match key {
            "freq" => delta.frequency_hz = value.parse().ok(),
            "mode" => {
                if !value.is_empty() {
                    delta.mode = Some(value.to_string());
                }
            }
            "ptt" | "tx" => {
                delta.transmitting = match value {
                    "1" | "on" => Some(true),
                    "0" | "off" => Some(false),
                    _ => None,
                }
            }
            "radio" | "slice" => delta.slice = value.parse().ok(),
            _ => {}
        }
    }
    delta
}
