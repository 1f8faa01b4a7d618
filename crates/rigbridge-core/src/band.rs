//! Amateur radio band derivation.
//!
//! [`Band`] maps a raw frequency in hertz to its amateur band designation.
//! The control plane derives the band from every observed frequency so
//! subscribers get it for free in `RadioState`.

use std::fmt;

/// Standard amateur band, 160 meters through 70 centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    M160,
    M80,
    M60,
    M40,
    M30,
    M20,
    M17,
    M15,
    M12,
    M10,
    M6,
    M2,
    Cm70,
}

/// Band edges in hertz, ITU Region 2 where regions differ.
const BAND_EDGES: &[(u64, u64, Band)] = &[
    (1_800_000, 2_000_000, Band::M160),
    (3_500_000, 4_000_000, Band::M80),
    (5_330_500, 5_403_500, Band::M60),
    (7_000_000, 7_300_000, Band::M40),
    (10_100_000, 10_150_000, Band::M30),
    (14_000_000, 14_350_000, Band::M20),
    (18_068_000, 18_168_000, Band::M17),
    (21_000_000, 21_450_000, Band::M15),
    (24_890_000, 24_990_000, Band::M12),
    (28_000_000, 29_700_000, Band::M10),
    (50_000_000, 54_000_000, Band::M6),
    (144_000_000, 148_000_000, Band::M2),
    (420_000_000, 450_000_000, Band::Cm70),
];

impl Band {
    /// The band containing `freq_hz`, or `None` outside every allocation.
    pub fn from_hz(freq_hz: u64) -> Option<Band> {
        BAND_EDGES
            .iter()
            .find(|(low, high, _)| freq_hz >= *low && freq_hz <= *high)
            .map(|(_, _, band)| *band)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Band::M160 => "160m",
            Band::M80 => "80m",
            Band::M60 => "60m",
            Band::M40 => "40m",
            Band::M30 => "30m",
            Band::M20 => "20m",
            Band::M17 => "17m",
            Band::M15 => "15m",
            Band::M12 => "12m",
            Band::M10 => "10m",
            Band::M6 => "6m",
            Band::M2 => "2m",
            Band::Cm70 => "70cm",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ft8_frequencies_map_to_bands() {
        assert_eq!(Band::from_hz(14_074_000), Some(Band::M20));
        assert_eq!(Band::from_hz(7_074_000), Some(Band::M40));
        assert_eq!(Band::from_hz(3_573_000), Some(Band::M80));
        assert_eq!(Band::from_hz(50_313_000), Some(Band::M6));
    }

    #[test]
    fn band_edges_inclusive() {
        assert_eq!(Band::from_hz(14_000_000), Some(Band::M20));
        assert_eq!(Band::from_hz(14_350_000), Some(Band::M20));
        assert_eq!(Band::from_hz(13_999_999), None);
        assert_eq!(Band::from_hz(14_350_001), None);
    }

    #[test]
    fn out_of_allocation_is_none() {
        assert_eq!(Band::from_hz(0), None);
        assert_eq!(Band::from_hz(13_560_000), None); // ISM, not amateur
        assert_eq!(Band::from_hz(1_000_000_000), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(Band::M20.to_string(), "20m");
        assert_eq!(Band::Cm70.to_string(), "70cm");
    }
}
