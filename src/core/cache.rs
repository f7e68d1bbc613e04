use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    config::BandmapConfig,
    spot::{Spot, SpotReport, khz_to_hz, normalize_callsign},
    types::{Band, Mode, SpotId, TimestampMs},
};

use super::indices::{SpotKey, VecIndex, remove_from_vec_index};

/// Why a report was rejected as malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Callsign empty after trimming.
    EmptyCallsign,
    /// Frequency zero, negative, or not a number.
    NonPositiveFrequency,
}

/// A report the cache refused. The cache is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// Malformed report.
    #[error("invalid report: {0:?}")]
    InvalidReport(InvalidReason),
    /// The report's band is excluded by `monitored_bands`.
    #[error("band {0} is not monitored")]
    BandNotMonitored(Band),
    /// The reporting skimmer is not in `allowed_spotters`, or the report named none.
    #[error("spotter {0:?} is not in the allow-list")]
    SpotterNotAllowed(Option<String>),
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    /// A new spot was created.
    Created(SpotId),
    /// The report was folded into an existing spot.
    Merged(SpotId),
}

impl MergeResult {
    /// Id of the created or updated spot.
    pub fn id(self) -> SpotId {
        match self {
            Self::Created(id) | Self::Merged(id) => id,
        }
    }
}

/// Running counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Spots created.
    pub created: u64,
    /// Reports merged into an existing spot.
    pub merged: u64,
    /// Reports refused.
    pub rejected: u64,
    /// Spots removed by the aging sweep.
    pub aged_out: u64,
    /// Spots removed to respect `max_spots`.
    pub capacity_evicted: u64,
    /// Spots absorbed into a neighbour that moved within merge tolerance.
    pub coalesced: u64,
}

/// Optional query restrictions. The default matches every placed spot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotFilter {
    /// Only this band.
    pub band: Option<Band>,
    /// Only this mode.
    pub mode: Option<Mode>,
    /// Only spots inside General-class segments.
    pub general_only: bool,
    /// Rig VFO in kHz. Does not filter; snapshots annotate each row with its distance.
    pub vfo_khz: Option<f64>,
}

impl SpotFilter {
    /// Filter on a single band.
    pub fn band(band: Band) -> Self {
        Self {
            band: Some(band),
            ..Self::default()
        }
    }

    /// Adds a mode restriction.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the VFO used for proximity annotation.
    pub fn with_vfo_khz(mut self, vfo_khz: f64) -> Self {
        self.vfo_khz = Some(vfo_khz);
        self
    }
}

/// Live spots keyed by id, with a `(callsign, band)` index for merge lookups.
#[derive(Debug)]
pub struct SpotCache {
    spots: HashMap<SpotId, Spot>,
    by_key: VecIndex<SpotKey>,
    next_id: SpotId,
    config: BandmapConfig,
    stats: CacheStats,
}

impl SpotCache {
    /// Creates an empty cache governed by `config`.
    pub fn new(config: BandmapConfig) -> Self {
        Self {
            spots: HashMap::new(),
            by_key: VecIndex::new(),
            next_id: 1,
            config,
            stats: CacheStats::default(),
        }
    }

    /// Creates a spot for `report` or merges it into the nearest live spot
    /// of the same call and band within `merge_tolerance_hz`.
    pub fn ingest(&mut self, report: &SpotReport) -> Result<MergeResult, IngestError> {
        let res = self.ingest_inner(report);
        match res {
            Ok(MergeResult::Created(_)) => self.stats.created += 1,
            Ok(MergeResult::Merged(_)) => self.stats.merged += 1,
            Err(_) => self.stats.rejected += 1,
        }
        res
    }

    /// Removes every spot whose last report is older than the TTL. Returns the count removed.
    pub fn sweep(&mut self, now_ms: TimestampMs) -> usize {
        let ttl = self.config.ttl_ms;
        let expired: Vec<SpotId> = self
            .spots
            .values()
            .filter(|s| s.age_ms(now_ms) > ttl)
            .map(|s| s.id)
            .collect();

        for id in &expired {
            self.remove(*id);
        }
        self.stats.aged_out += expired.len() as u64;
        expired.len()
    }

    /// Clones the matching spots in band, frequency, callsign order.
    ///
    /// Spots on [`Band::Unknown`] are never returned.
    pub fn query_active(&self, filter: &SpotFilter) -> Vec<Spot> {
        let plan = &self.config.band_plan;
        let mut out: Vec<Spot> = self
            .spots
            .values()
            .filter(|s| s.band != Band::Unknown)
            .filter(|s| filter.band.is_none_or(|b| b == s.band))
            .filter(|s| filter.mode.is_none_or(|m| m == s.mode))
            .filter(|s| !filter.general_only || plan.in_general_segment(s.freq_hz))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.band
                .rank()
                .cmp(&b.band.rank())
                .then(a.freq_hz.cmp(&b.freq_hz))
                .then_with(|| a.callsign.cmp(&b.callsign))
                .then(a.id.cmp(&b.id))
        });
        out
    }

    /// Borrows a live spot.
    pub fn get(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(&id)
    }

    /// Clones a live spot.
    pub fn get_cloned(&self, id: SpotId) -> Option<Spot> {
        self.get(id).cloned()
    }

    /// Every live spot for `callsign` on `band`. Any two of them are further apart than the merge tolerance.
    pub fn lookup(&self, callsign: &str, band: Band) -> Vec<&Spot> {
        let key = SpotKey {
            callsign: normalize_callsign(callsign),
            band,
        };
        self.by_key
            .get(&key)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.spots.get(id))
            .collect()
    }

    /// Number of live spots, including ones on [`Band::Unknown`].
    pub fn len(&self) -> usize {
        self.spots.len()
    }

    /// True when no spot is live.
    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Configuration the cache was built with.
    pub fn config(&self) -> &BandmapConfig {
        &self.config
    }

    fn ingest_inner(&mut self, report: &SpotReport) -> Result<MergeResult, IngestError> {
        let callsign = normalize_callsign(&report.callsign);
        if callsign.is_empty() {
            return Err(IngestError::InvalidReport(InvalidReason::EmptyCallsign));
        }
        let freq_hz = khz_to_hz(report.frequency_khz)
            .ok_or(IngestError::InvalidReport(InvalidReason::NonPositiveFrequency))?;

        let band = self.config.band_plan.band_for(freq_hz);
        if !self.config.band_monitored(band) {
            return Err(IngestError::BandNotMonitored(band));
        }
        if !self.config.spotter_allowed(report.spotter.as_deref()) {
            return Err(IngestError::SpotterNotAllowed(report.spotter.clone()));
        }

        let explicit_mode = report
            .mode
            .as_deref()
            .map(Mode::parse_label)
            .filter(|m| *m != Mode::Unknown);
        let comment = report
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let key = SpotKey { callsign, band };
        if let Some(id) = self.nearest_within_tolerance(&key, freq_hz) {
            if self.merge_into(id, freq_hz, explicit_mode, comment, report.timestamp) {
                self.coalesce_neighbours(&key, id);
            }
            return Ok(MergeResult::Merged(id));
        }

        let mode = explicit_mode.unwrap_or_else(|| self.inferred_mode(freq_hz));
        let id = self.next_id;
        self.next_id += 1;

        let spot = Spot {
            id,
            callsign: key.callsign.clone(),
            freq_hz,
            band,
            mode,
            first_seen_ms: report.timestamp,
            last_seen_ms: report.timestamp,
            report_count: 1,
            comment,
        };
        self.by_key.entry(key).or_default().push(id);
        self.spots.insert(id, spot);
        self.enforce_capacity(id);
        Ok(MergeResult::Created(id))
    }

    fn nearest_within_tolerance(&self, key: &SpotKey, freq_hz: u64) -> Option<SpotId> {
        let tolerance = self.config.merge_tolerance_hz;
        self.by_key
            .get(key)?
            .iter()
            .filter_map(|id| self.spots.get(id))
            .map(|s| (s.freq_hz.abs_diff(freq_hz), s.id))
            .filter(|(delta, _)| *delta <= tolerance)
            .min()
            .map(|(_, id)| id)
    }

    /// Returns true when the spot moved to the report's frequency.
    fn merge_into(
        &mut self,
        id: SpotId,
        freq_hz: u64,
        explicit_mode: Option<Mode>,
        comment: Option<String>,
        ts_ms: TimestampMs,
    ) -> bool {
        let significant = self.config.significant_move_hz;
        let inferred = self.inferred_mode(freq_hz);
        let Some(spot) = self.spots.get_mut(&id) else {
            return false;
        };

        spot.report_count = spot.report_count.saturating_add(1);

        // Late reports only refresh the count; position and annotations follow the newest report.
        if ts_ms < spot.last_seen_ms {
            return false;
        }
        spot.last_seen_ms = ts_ms;
        match explicit_mode {
            Some(mode) => spot.mode = mode,
            None if spot.mode == Mode::Unknown => spot.mode = inferred,
            None => {}
        }
        if comment.is_some() {
            spot.comment = comment;
        }
        if spot.freq_hz.abs_diff(freq_hz) > significant {
            spot.freq_hz = freq_hz;
            return true;
        }
        false
    }

    /// Folds every other spot on `key` now within tolerance of `survivor` into it.
    fn coalesce_neighbours(&mut self, key: &SpotKey, survivor: SpotId) {
        let tolerance = self.config.merge_tolerance_hz;
        let Some(freq_hz) = self.spots.get(&survivor).map(|s| s.freq_hz) else {
            return;
        };
        let absorbed: Vec<SpotId> = self
            .by_key
            .get(key)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
            .filter(|id| *id != survivor)
            .filter(|id| {
                self.spots
                    .get(id)
                    .is_some_and(|s| s.freq_hz.abs_diff(freq_hz) <= tolerance)
            })
            .collect();

        for id in absorbed {
            let Some(other) = self.remove(id) else {
                continue;
            };
            let Some(spot) = self.spots.get_mut(&survivor) else {
                return;
            };
            spot.report_count = spot.report_count.saturating_add(other.report_count);
            spot.first_seen_ms = spot.first_seen_ms.min(other.first_seen_ms);
            if other.comment.is_some()
                && (spot.comment.is_none() || other.last_seen_ms > spot.last_seen_ms)
            {
                spot.comment = other.comment;
            }
            spot.last_seen_ms = spot.last_seen_ms.max(other.last_seen_ms);
            self.stats.coalesced += 1;
        }
    }

    fn inferred_mode(&self, freq_hz: u64) -> Mode {
        if self.config.infer_mode {
            self.config.band_plan.infer_mode(freq_hz)
        } else {
            Mode::Unknown
        }
    }

    fn enforce_capacity(&mut self, keep: SpotId) {
        let Some(max) = self.config.max_spots else {
            return;
        };
        while self.spots.len() > max {
            let stalest = self
                .spots
                .values()
                .filter(|s| s.id != keep)
                .min_by_key(|s| (s.last_seen_ms, s.id))
                .map(|s| s.id);
            let Some(id) = stalest else {
                break;
            };
            self.remove(id);
            self.stats.capacity_evicted += 1;
        }
    }

    fn remove(&mut self, id: SpotId) -> Option<Spot> {
        let spot = self.spots.remove(&id)?;
        let key = SpotKey {
            callsign: spot.callsign.clone(),
            band: spot.band,
        };
        remove_from_vec_index(&mut self.by_key, &key, id);
        Some(spot)
    }
}
