//! Shared primitive IDs and band/mode enums.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic spot identifier, unique for the lifetime of a cache.
pub type SpotId = u64;
/// Wall-clock timestamp in milliseconds since epoch.
pub type TimestampMs = u64;

/// Amateur band bucket.
///
/// Declaration order is the canonical display order (low to high frequency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    /// 160 meters.
    B160m,
    /// 80 meters.
    B80m,
    /// 60 meters.
    B60m,
    /// 40 meters.
    B40m,
    /// 30 meters.
    B30m,
    /// 20 meters.
    B20m,
    /// 17 meters.
    B17m,
    /// 15 meters.
    B15m,
    /// 12 meters.
    B12m,
    /// 10 meters.
    B10m,
    /// 6 meters.
    B6m,
    /// 2 meters.
    B2m,
    /// Outside every band in the plan.
    Unknown,
}

impl Band {
    /// Every real band in canonical order. `Unknown` is not part of it.
    pub const CANONICAL: [Band; 12] = [
        Band::B160m,
        Band::B80m,
        Band::B60m,
        Band::B40m,
        Band::B30m,
        Band::B20m,
        Band::B17m,
        Band::B15m,
        Band::B12m,
        Band::B10m,
        Band::B6m,
        Band::B2m,
    ];

    /// Position in [`Band::CANONICAL`]; `Unknown` sorts last.
    pub fn rank(self) -> usize {
        Self::CANONICAL
            .iter()
            .position(|b| *b == self)
            .unwrap_or(Self::CANONICAL.len())
    }

    /// Short label such as `"20m"`.
    pub fn label(self) -> &'static str {
        match self {
            Band::B160m => "160m",
            Band::B80m => "80m",
            Band::B60m => "60m",
            Band::B40m => "40m",
            Band::B30m => "30m",
            Band::B20m => "20m",
            Band::B17m => "17m",
            Band::B15m => "15m",
            Band::B12m => "12m",
            Band::B10m => "10m",
            Band::B6m => "6m",
            Band::B2m => "2m",
            Band::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Band {
    type Err = std::convert::Infallible;

    /// Accepts `"20"`, `"20m"` and `"20M"`. Anything else is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_suffix(['m', 'M']).unwrap_or(s);
        let band = match digits {
            "160" => Band::B160m,
            "80" => Band::B80m,
            "60" => Band::B60m,
            "40" => Band::B40m,
            "30" => Band::B30m,
            "20" => Band::B20m,
            "17" => Band::B17m,
            "15" => Band::B15m,
            "12" => Band::B12m,
            "10" => Band::B10m,
            "6" => Band::B6m,
            "2" => Band::B2m,
            _ => Band::Unknown,
        };
        Ok(band)
    }
}

/// Emission mode bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Continuous Wave.
    CW,
    /// Any voice mode (SSB, AM, FM).
    Phone,
    /// Any digital mode (RTTY, FT8, PSK, ...).
    Digital,
    /// Not reported and not inferable.
    Unknown,
}

impl Mode {
    /// Maps a free-form mode label from a spot source or logger.
    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "CW" => Mode::CW,
            "PH" | "PHONE" | "SSB" | "USB" | "LSB" | "AM" | "FM" => Mode::Phone,
            "DG" | "DIG" | "DIGI" | "DIGITAL" | "RTTY" | "FT8" | "FT4" | "PSK" | "PSK31"
            | "DATA" => Mode::Digital,
            _ => Mode::Unknown,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::CW => "CW",
            Mode::Phone => "PHONE",
            Mode::Digital => "DIGITAL",
            Mode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Worked annotation attached to every snapshot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkedState {
    /// Already in the log for this band (and mode, unless cross-mode credit applies).
    Worked,
    /// Not in the log for this band/mode.
    Needed,
    /// The spot's mode is unknown and the log only has this call on other modes.
    Unknown,
}
