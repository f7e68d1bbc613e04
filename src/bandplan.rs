//! Band-edge and mode sub-band tables.

use serde::{Deserialize, Serialize};

use crate::types::{Band, Mode};

/// Inclusive frequency range belonging to one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandEdge {
    /// Band bucket.
    pub band: Band,
    /// Lower edge in Hz, inclusive.
    pub low_hz: u64,
    /// Upper edge in Hz, inclusive.
    pub high_hz: u64,
}

/// Half-open `[low_hz, high_hz)` sub-band conventionally used by one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSegment {
    /// Lower edge in Hz, inclusive.
    pub low_hz: u64,
    /// Upper edge in Hz, exclusive.
    pub high_hz: u64,
    /// Mode assumed inside the segment.
    pub mode: Mode,
}

/// Band plan used to bucket spots and infer their mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPlan {
    /// Band edges. Ranges must not overlap.
    pub edges: Vec<BandEdge>,
    /// Mode sub-bands. Frequencies outside every segment infer `Unknown`.
    pub segments: Vec<ModeSegment>,
    /// Portions open to General-class licensees, as `(low_hz, high_hz)` exclusive bounds.
    pub general: Vec<(u64, u64)>,
}

const fn edge(band: Band, low_khz: u64, high_khz: u64) -> BandEdge {
    BandEdge {
        band,
        low_hz: low_khz * 1000,
        high_hz: high_khz * 1000,
    }
}

const fn seg(low_khz: u64, high_khz: u64, mode: Mode) -> ModeSegment {
    ModeSegment {
        low_hz: low_khz * 1000,
        high_hz: high_khz * 1000,
        mode,
    }
}

const DEFAULT_EDGES: [BandEdge; 12] = [
    edge(Band::B160m, 1_800, 2_000),
    edge(Band::B80m, 3_500, 4_000),
    edge(Band::B60m, 5_330, 5_406),
    edge(Band::B40m, 7_000, 7_300),
    edge(Band::B30m, 10_100, 10_150),
    edge(Band::B20m, 14_000, 14_350),
    edge(Band::B17m, 18_068, 18_168),
    edge(Band::B15m, 21_000, 21_450),
    edge(Band::B12m, 24_890, 24_990),
    edge(Band::B10m, 28_000, 29_700),
    edge(Band::B6m, 50_000, 54_000),
    edge(Band::B2m, 144_000, 148_000),
];

const DEFAULT_SEGMENTS: [ModeSegment; 31] = [
    seg(1_800, 1_840, Mode::CW),
    seg(1_840, 1_843, Mode::Digital),
    seg(1_843, 2_001, Mode::Phone),
    seg(3_500, 3_570, Mode::CW),
    seg(3_570, 3_600, Mode::Digital),
    seg(3_600, 4_001, Mode::Phone),
    seg(7_000, 7_040, Mode::CW),
    seg(7_040, 7_125, Mode::Digital),
    seg(7_125, 7_301, Mode::Phone),
    seg(10_100, 10_130, Mode::CW),
    seg(10_130, 10_151, Mode::Digital),
    seg(14_000, 14_070, Mode::CW),
    seg(14_070, 14_150, Mode::Digital),
    seg(14_150, 14_351, Mode::Phone),
    seg(18_068, 18_095, Mode::CW),
    seg(18_095, 18_110, Mode::Digital),
    seg(18_110, 18_169, Mode::Phone),
    seg(21_000, 21_070, Mode::CW),
    seg(21_070, 21_200, Mode::Digital),
    seg(21_200, 21_451, Mode::Phone),
    seg(24_890, 24_915, Mode::CW),
    seg(24_915, 24_930, Mode::Digital),
    seg(24_930, 24_991, Mode::Phone),
    seg(28_000, 28_070, Mode::CW),
    seg(28_070, 28_300, Mode::Digital),
    seg(28_300, 29_701, Mode::Phone),
    seg(50_000, 50_100, Mode::CW),
    seg(50_100, 50_300, Mode::Phone),
    seg(50_300, 54_001, Mode::Digital),
    seg(144_000, 144_100, Mode::CW),
    seg(144_100, 148_001, Mode::Phone),
];

const DEFAULT_GENERAL: [(u64, u64); 14] = [
    (1_800_000, 2_000_000),
    (3_525_000, 3_600_000),
    (3_800_000, 4_000_000),
    (7_025_000, 7_125_000),
    (7_175_000, 7_300_000),
    (10_100_000, 10_150_000),
    (14_025_000, 14_150_000),
    (14_225_000, 14_350_000),
    (18_068_000, 18_168_000),
    (21_025_000, 21_200_000),
    (21_275_000, 21_450_000),
    (24_890_000, 24_990_000),
    (28_000_000, 29_700_000),
    (50_000_000, 54_000_000),
];

impl Default for BandPlan {
    fn default() -> Self {
        Self {
            edges: DEFAULT_EDGES.to_vec(),
            segments: DEFAULT_SEGMENTS.to_vec(),
            general: DEFAULT_GENERAL.to_vec(),
        }
    }
}

impl BandPlan {
    /// Returns the band containing `freq_hz`, or [`Band::Unknown`].
    pub fn band_for(&self, freq_hz: u64) -> Band {
        self.edges
            .iter()
            .find(|e| e.low_hz <= freq_hz && freq_hz <= e.high_hz)
            .map(|e| e.band)
            .unwrap_or(Band::Unknown)
    }

    /// Infers the conventional mode for `freq_hz` from the sub-band table.
    pub fn infer_mode(&self, freq_hz: u64) -> Mode {
        self.segments
            .iter()
            .find(|s| s.low_hz <= freq_hz && freq_hz < s.high_hz)
            .map(|s| s.mode)
            .unwrap_or(Mode::Unknown)
    }

    /// True when `freq_hz` lies strictly inside a General-class segment.
    pub fn in_general_segment(&self, freq_hz: u64) -> bool {
        self.general
            .iter()
            .any(|(low, high)| *low < freq_hz && freq_hz < *high)
    }

    /// Checks that band edges are well-formed and do not overlap.
    pub fn validate(&self) -> Result<(), String> {
        let mut edges = self.edges.clone();
        edges.sort_by_key(|e| e.low_hz);
        for e in &edges {
            if e.low_hz > e.high_hz {
                return Err(format!("band {} has low edge above high edge", e.band));
            }
            if e.band == Band::Unknown {
                return Err("band table cannot map a range to Unknown".to_string());
            }
        }
        for pair in edges.windows(2) {
            if pair[1].low_hz <= pair[0].high_hz {
                return Err(format!("bands {} and {} overlap", pair[0].band, pair[1].band));
            }
        }
        Ok(())
    }
}
