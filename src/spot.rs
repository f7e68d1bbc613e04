//! Spot and contact records: inbound reports, cached spots, and snapshot rows.

use serde::{Deserialize, Serialize};

use crate::types::{Band, Mode, SpotId, TimestampMs, WorkedState};

/// Normalized spot report as delivered by a spot source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotReport {
    /// Reported station callsign, any case.
    pub callsign: String,
    /// Frequency in kHz.
    pub frequency_khz: f64,
    /// Mode label when the source reports one.
    #[serde(default)]
    pub mode: Option<String>,
    /// Report time in milliseconds since epoch.
    pub timestamp: TimestampMs,
    /// Free-text annotation from the spotter.
    #[serde(default)]
    pub comment: Option<String>,
    /// Callsign of the reporting skimmer or spotter.
    #[serde(default)]
    pub spotter: Option<String>,
}

impl SpotReport {
    /// Builds a report with no mode or comment.
    pub fn new(callsign: impl Into<String>, frequency_khz: f64, timestamp: TimestampMs) -> Self {
        Self {
            callsign: callsign.into(),
            frequency_khz,
            mode: None,
            timestamp,
            comment: None,
            spotter: None,
        }
    }

    /// Sets the reported mode label.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Sets the spotter comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the reporting spotter.
    pub fn with_spotter(mut self, spotter: impl Into<String>) -> Self {
        self.spotter = Some(spotter.into());
        self
    }

    /// Decodes a JSON array of reports.
    pub fn batch_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A live spot owned by the cache. Callers only ever see clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    /// Cache-assigned identifier.
    pub id: SpotId,
    /// Uppercase, trimmed callsign.
    pub callsign: String,
    /// Displayed frequency in Hz.
    pub freq_hz: u64,
    /// Band derived from the frequency.
    pub band: Band,
    /// Reported or inferred mode.
    pub mode: Mode,
    /// Time of the first contributing report.
    pub first_seen_ms: TimestampMs,
    /// Time of the latest contributing report.
    pub last_seen_ms: TimestampMs,
    /// Number of reports merged into this spot.
    pub report_count: u32,
    /// Last non-empty comment from any contributing report.
    pub comment: Option<String>,
}

impl Spot {
    /// Frequency in kHz.
    pub fn frequency_khz(&self) -> f64 {
        hz_to_khz(self.freq_hz)
    }

    /// Milliseconds since the last report, saturating at zero for future timestamps.
    pub fn age_ms(&self, now_ms: TimestampMs) -> u64 {
        now_ms.saturating_sub(self.last_seen_ms)
    }
}

/// Completed contact as broadcast by the logger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEvent {
    /// Worked station.
    pub callsign: String,
    /// Band label, e.g. `"20m"` or `"20"`.
    pub band: String,
    /// Mode label, e.g. `"CW"`.
    pub mode: String,
    /// Contact time in milliseconds since epoch.
    pub timestamp: TimestampMs,
}

/// Normalized contact held by the worked-station index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkedEntry {
    /// Uppercase, trimmed callsign.
    pub callsign: String,
    /// Band bucket.
    pub band: Band,
    /// Mode bucket.
    pub mode: Mode,
    /// Contact time in milliseconds since epoch.
    pub ts_ms: TimestampMs,
}

impl WorkedEntry {
    /// Builds an entry with the callsign normalized.
    pub fn new(callsign: &str, band: Band, mode: Mode, ts_ms: TimestampMs) -> Self {
        Self {
            callsign: normalize_callsign(callsign),
            band,
            mode,
            ts_ms,
        }
    }
}

impl From<&ContactEvent> for WorkedEntry {
    fn from(ev: &ContactEvent) -> Self {
        let band = ev.band.parse().unwrap_or(Band::Unknown);
        Self::new(&ev.callsign, band, Mode::parse_label(&ev.mode), ev.timestamp)
    }
}

/// One display row handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    /// Spot callsign.
    pub callsign: String,
    /// Frequency in kHz.
    pub frequency_khz: f64,
    /// Band bucket.
    pub band: Band,
    /// Mode bucket.
    pub mode: Mode,
    /// Whole seconds since the last report.
    pub age_seconds: u64,
    /// Merged report count.
    pub report_count: u32,
    /// Worked annotation for this spot's call, band and mode.
    pub worked_state: WorkedState,
    /// Last spotter comment.
    pub comment: Option<String>,
    /// Signed distance from the filter's VFO in kHz, when one was given.
    pub vfo_delta_khz: Option<f64>,
}

/// Immutable, display-ordered view of the cache at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Clock reading used for `age_seconds`.
    pub taken_at_ms: TimestampMs,
    /// Number of mutation ticks applied before this snapshot was taken.
    pub tick: u64,
    /// Rows in band, then frequency, then callsign order.
    pub rows: Vec<SnapshotRow>,
}

/// Uppercases and trims a callsign.
pub fn normalize_callsign(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Converts kHz to whole Hz. Returns `None` for non-finite or non-positive input.
pub fn khz_to_hz(khz: f64) -> Option<u64> {
    if !khz.is_finite() || khz <= 0.0 {
        return None;
    }
    let hz = (khz * 1000.0).round();
    if hz < 1.0 || hz > u64::MAX as f64 {
        return None;
    }
    Some(hz as u64)
}

/// Converts Hz to kHz.
pub fn hz_to_khz(hz: u64) -> f64 {
    hz as f64 / 1000.0
}
