//! Socket transceiver line encoding and decoding.
//!
//! Inbound report lines:
//!
//! ```text
//! freq=14250000 mode=USB tx=0 slice=0
//! ```
//!
//! Any subset of keys may appear; unknown keys are ignored so newer
//! firmware does not break older stations. Outbound directives:
//!
//! ```text
//! set freq 14250000
//! set mode CW
//! set ptt 1
//! cw send <text>
//! cw stop
//! cw speed 25
//! ```
//!
//! All functions here are pure; no I/O is performed.

use rigbridge_core::{AdapterCommand, Error, Result, StateDelta};

/// Parse one inbound report line into a state delta.
///
/// Returns an empty delta when the line carries only unknown keys.
/// A line with no `key=value` structure at all is a protocol error.
pub fn parse_report(line: &str) -> Result<StateDelta> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Error::Protocol("empty report line".into()));
    }

    let mut delta = StateDelta::default();
    let mut saw_pair = false;

    for token in line.split_whitespace() {
        let Some(eq) = token.find('=') else {
            continue;
        };
        saw_pair = true;
        let (key, value) = (&token[..eq], &token[eq + 1..]);
        match key {
            "freq" => delta.frequency_hz = value.parse().ok(),
            "mode" => {
                if !value.is_empty() {
                    delta.mode = Some(value.to_string());
                }
            }
            "tx" => delta.transmitting = parse_flag(value),
            "slice" => delta.slice = value.parse().ok(),
            _ => {}
        }
    }

    if !saw_pair {
        return Err(Error::Protocol(format!("unparseable report line: {line}")));
    }
    Ok(delta)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Encode a command as the outbound directive text (no newline).
pub fn encode_command(cmd: &AdapterCommand) -> String {
    match cmd {
        AdapterCommand::SetFrequency(hz) => format!("set freq {hz}"),
        AdapterCommand::SetMode(mode) => format!("set mode {mode}"),
        AdapterCommand::SetPtt(on) => format!("set ptt {}", if *on { 1 } else { 0 }),
        AdapterCommand::SendCw(text) => format!("cw send {text}"),
        AdapterCommand::StopCw => "cw stop".to_string(),
        AdapterCommand::SetCwSpeed(wpm) => format!("cw speed {wpm}"),
        AdapterCommand::Raw(text) => text.clone(),
    }
}
