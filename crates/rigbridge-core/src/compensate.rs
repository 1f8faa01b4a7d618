//! Frequency compensation for CW/sideband mode changes.
//!
//! Carrier-based modes (the CW family) and suppressed-carrier modes (the
//! sideband family) reference the dial frequency differently: CW reads the
//! carrier itself, sideband reads the suppressed-carrier point offset by
//! the sidetone. Switching between the families without correction shifts
//! the signal by the sidetone offset, 700 Hz in this plane.
//!
//! [`compensate`] is a pure function with no side effects; the supervisor
//! applies it when routing a mode-change command, and the corrected
//! frequency is documented as a correction, not raw telemetry.

/// Sidetone offset between carrier and suppressed-carrier tuning, in hertz.
pub const SIDETONE_OFFSET_HZ: i64 = 700;

/// Frequency below which an ambiguous sideband mode defaults to lower
/// sideband (amateur convention: LSB below 10 MHz, USB at and above).
const SIDEBAND_SPLIT_HZ: u64 = 10_000_000;

/// Normalized mode family for compensation purposes.
///
/// Data modes, FM, and AM are all `Other`: they are not voice sideband and
/// no correction applies to transitions involving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeClass {
    Cw,
    UpperSideband,
    LowerSideband,
    Other,
}

impl ModeClass {
    /// Classify a vendor mode string.
    ///
    /// `freq_hz` disambiguates mode names that do not encode a sideband
    /// themselves ("SSB", "PHONE"): lower below 10 MHz, upper at/above.
    pub fn classify(mode: &str, freq_hz: u64) -> ModeClass {
        match mode.trim().to_uppercase().as_str() {
            "CW" | "CW-U" | "CW-L" | "CWU" | "CWL" | "CWR" => ModeClass::Cw,
            "USB" => ModeClass::UpperSideband,
            "LSB" => ModeClass::LowerSideband,
            "SSB" | "PHONE" | "VOICE" => {
                if freq_hz < SIDEBAND_SPLIT_HZ {
                    ModeClass::LowerSideband
                } else {
                    ModeClass::UpperSideband
                }
            }
            _ => ModeClass::Other,
        }
    }
}

/// Correct a frequency for a mode change.
///
/// Sideband to CW subtracts the sidetone offset for upper sideband and
/// adds it for lower; CW to sideband applies the inverse signs. Any other
/// transition (same family, or either side not a voice/CW mode) returns
/// the input unchanged.
pub fn compensate(freq_hz: u64, current_mode: &str, target_mode: &str) -> u64 {
    let current = ModeClass::classify(current_mode, freq_hz);
    let target = ModeClass::classify(target_mode, freq_hz);

    let delta = match (current, target) {
        (ModeClass::UpperSideband, ModeClass::Cw) => -SIDETONE_OFFSET_HZ,
        (ModeClass::LowerSideband, ModeClass::Cw) => SIDETONE_OFFSET_HZ,
        (ModeClass::Cw, ModeClass::UpperSideband) => SIDETONE_OFFSET_HZ,
        (ModeClass::Cw, ModeClass::LowerSideband) => -SIDETONE_OFFSET_HZ,
        _ => 0,
    };

    (freq_hz as i64 + delta).max(0) as u64
}
