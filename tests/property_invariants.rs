use proptest::prelude::*;

use bandmap::{
    config::BandmapConfig,
    core::cache::{MergeResult, SpotCache, SpotFilter},
    spot::SpotReport,
};

#[derive(Debug, Clone)]
enum Action {
    Report { call_idx: u8, offset_hz: u32, ts: u32 },
    Sweep { now: u32 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => (0u8..12, 0u32..20_000, 0u32..2_000_000)
            .prop_map(|(call_idx, offset_hz, ts)| Action::Report { call_idx, offset_hz, ts }),
        1 => (0u32..3_000_000).prop_map(|now| Action::Sweep { now }),
    ]
}

fn report_for(call_idx: u8, offset_hz: u32, ts: u32) -> SpotReport {
    // Alternate between 40m and 20m so band ordering is exercised.
    let base_khz = if call_idx % 2 == 0 { 7_000.0 } else { 14_000.0 };
    SpotReport::new(
        format!("K{call_idx}AA"),
        base_khz + f64::from(offset_hz) / 1000.0,
        u64::from(ts),
    )
}

proptest! {
    #[test]
    fn random_sequences_keep_order_and_ttl(actions in prop::collection::vec(action_strategy(), 1..200)) {
        let cfg = BandmapConfig::default();
        let ttl = cfg.ttl_ms;
        let tolerance = cfg.merge_tolerance_hz;
        let mut cache = SpotCache::new(cfg);
        let mut accepted = 0u64;

        for action in actions {
            match action {
                Action::Report { call_idx, offset_hz, ts } => {
                    let report = report_for(call_idx, offset_hz, ts);
                    let freq_hz = (report.frequency_khz * 1000.0).round() as u64;
                    let band = cache.config().band_plan.band_for(freq_hz);
                    let near_existing = cache
                        .lookup(&report.callsign, band)
                        .iter()
                        .any(|s| s.freq_hz.abs_diff(freq_hz) <= tolerance);

                    let res = cache.ingest(&report);
                    prop_assert!(res.is_ok());
                    prop_assert_eq!(matches!(res, Ok(MergeResult::Merged(_))), near_existing);
                    accepted += 1;
                }
                Action::Sweep { now } => {
                    let now = u64::from(now);
                    cache.sweep(now);
                    for spot in cache.query_active(&SpotFilter::default()) {
                        prop_assert!(now.saturating_sub(spot.last_seen_ms) <= ttl);
                    }
                }
            }

            let spots = cache.query_active(&SpotFilter::default());
            prop_assert_eq!(spots.len(), cache.len());

            for pair in spots.windows(2) {
                let a = &pair[0];
                let b = &pair[1];
                let key_a = (a.band.rank(), a.freq_hz, a.callsign.as_str());
                let key_b = (b.band.rank(), b.freq_hz, b.callsign.as_str());
                prop_assert!(key_a <= key_b);
            }

            for spot in &spots {
                prop_assert!(spot.first_seen_ms <= spot.last_seen_ms);
                prop_assert!(spot.report_count >= 1);
            }

            // Spots sharing a call and band must stay further apart than the tolerance.
            for (i, a) in spots.iter().enumerate() {
                for b in &spots[i + 1..] {
                    if a.callsign == b.callsign && a.band == b.band {
                        prop_assert!(
                            a.freq_hz.abs_diff(b.freq_hz) > tolerance,
                            "{} at {} and {}", a.callsign, a.freq_hz, b.freq_hz
                        );
                    }
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.created + stats.merged, accepted);
        prop_assert_eq!(
            stats.created,
            cache.len() as u64 + stats.aged_out + stats.capacity_evicted + stats.coalesced
        );
    }
}
