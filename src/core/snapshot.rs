use crate::{
    spot::{Snapshot, SnapshotRow},
    types::TimestampMs,
};

use super::{
    cache::{SpotCache, SpotFilter},
    worked::WorkedIndex,
};

/// Builds a snapshot from borrowed state.
///
/// Both borrows are shared, so the caller's ownership discipline guarantees
/// no mutation can interleave: every row reflects the same tick. When the
/// filter carries a VFO, each row gets its signed offset from it.
pub fn build(
    cache: &SpotCache,
    worked: &WorkedIndex,
    filter: &SpotFilter,
    now_ms: TimestampMs,
    tick: u64,
) -> Snapshot {
    let rows = cache
        .query_active(filter)
        .into_iter()
        .map(|spot| SnapshotRow {
            frequency_khz: spot.frequency_khz(),
            age_seconds: spot.age_ms(now_ms) / 1000,
            worked_state: worked.status(&spot.callsign, spot.band, spot.mode),
            vfo_delta_khz: filter.vfo_khz.map(|vfo| spot.frequency_khz() - vfo),
            callsign: spot.callsign,
            band: spot.band,
            mode: spot.mode,
            report_count: spot.report_count,
            comment: spot.comment,
        })
        .collect();

    Snapshot {
        taken_at_ms: now_ms,
        tick,
        rows,
    }
}
