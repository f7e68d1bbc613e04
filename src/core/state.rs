use tracing::debug;

use crate::{
    config::BandmapConfig,
    spot::{ContactEvent, Snapshot, SpotReport, WorkedEntry},
    types::TimestampMs,
};

use super::{
    cache::{IngestError, MergeResult, SpotCache, SpotFilter},
    snapshot,
    worked::WorkedIndex,
};

/// Per-tick ingest outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Tick the batch was applied as.
    pub tick: u64,
    /// Reports that created a spot.
    pub created: usize,
    /// Reports merged into an existing spot.
    pub merged: usize,
    /// Reports refused.
    pub rejected: usize,
}

/// The only shared mutable state: spot cache plus worked index.
///
/// Every mutating call is one tick. Whoever owns this value serializes access,
/// so a snapshot taken through `&self` sees whole ticks only.
#[derive(Debug)]
pub struct BandmapState {
    cache: SpotCache,
    worked: WorkedIndex,
    tick: u64,
}

impl BandmapState {
    /// Empty cache and index at tick 0.
    pub fn new(config: BandmapConfig) -> Self {
        let worked = WorkedIndex::new(config.cross_mode_credit);
        Self {
            cache: SpotCache::new(config),
            worked,
            tick: 0,
        }
    }

    /// Ingests a batch as a single tick. A bad report never aborts the rest of the batch.
    pub fn apply_reports(&mut self, reports: &[SpotReport]) -> BatchSummary {
        self.tick += 1;
        let mut summary = BatchSummary {
            tick: self.tick,
            ..BatchSummary::default()
        };
        for report in reports {
            match self.cache.ingest(report) {
                Ok(MergeResult::Created(_)) => summary.created += 1,
                Ok(MergeResult::Merged(_)) => summary.merged += 1,
                Err(err) => {
                    debug!(callsign = %report.callsign, frequency_khz = report.frequency_khz, %err, "report dropped");
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    /// Ingests one report as its own tick.
    pub fn apply_report(&mut self, report: &SpotReport) -> Result<MergeResult, IngestError> {
        self.tick += 1;
        self.cache.ingest(report)
    }

    /// Records logger contacts as a single tick. Returns how many were kept.
    pub fn record_contacts(&mut self, events: &[ContactEvent]) -> usize {
        self.tick += 1;
        events
            .iter()
            .filter(|ev| self.worked.record(WorkedEntry::from(*ev)))
            .count()
    }

    /// Ages out expired spots as one tick.
    pub fn sweep(&mut self, now_ms: TimestampMs) -> usize {
        self.tick += 1;
        self.cache.sweep(now_ms)
    }

    /// Snapshot of the current tick, aged against `now_ms`.
    pub fn snapshot(&self, filter: &SpotFilter, now_ms: TimestampMs) -> Snapshot {
        snapshot::build(&self.cache, &self.worked, filter, now_ms, self.tick)
    }

    /// Read access to the spot cache.
    pub fn cache(&self) -> &SpotCache {
        &self.cache
    }

    /// Read access to the worked index.
    pub fn worked(&self) -> &WorkedIndex {
        &self.worked
    }

    /// Mutation ticks applied so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }
}
