use std::{sync::Arc, time::Duration};

use tokio::sync::RwLock;

use bandmap::{
    config::BandmapConfig,
    core::{cache::SpotFilter, state::BandmapState},
    runtime::handle::spawn_bandmap,
    spot::{ContactEvent, SpotReport},
    types::{Band, Mode, WorkedState},
};

fn contact(call: &str, band: &str, mode: &str) -> ContactEvent {
    ContactEvent {
        callsign: call.to_string(),
        band: band.to_string(),
        mode: mode.to_string(),
        timestamp: 1,
    }
}

#[test]
fn snapshot_rows_carry_worked_state_age_and_order() {
    let mut state = BandmapState::new(BandmapConfig::default());
    state.apply_reports(&[
        SpotReport::new("K2", 7_010.0, 10_000).with_mode("CW"),
        SpotReport::new("K3", 7_005.0, 4_000).with_mode("CW").with_comment("TEST"),
        SpotReport::new("K1", 14_025.0, 10_000).with_mode("CW"),
    ]);
    state.record_contacts(&[contact("K2", "40", "CW"), contact("K1", "20m", "SSB")]);

    let snap = state.snapshot(&SpotFilter::default(), 12_500);
    assert_eq!(snap.taken_at_ms, 12_500);
    assert_eq!(snap.tick, 2);

    let calls: Vec<&str> = snap.rows.iter().map(|r| r.callsign.as_str()).collect();
    assert_eq!(calls, vec!["K3", "K2", "K1"]);

    assert_eq!(snap.rows[0].age_seconds, 8);
    assert_eq!(snap.rows[0].comment.as_deref(), Some("TEST"));
    assert_eq!(snap.rows[0].worked_state, WorkedState::Needed);
    assert_eq!(snap.rows[1].worked_state, WorkedState::Worked);
    assert_eq!(snap.rows[2].worked_state, WorkedState::Needed);
    assert_eq!(snap.rows[2].band, Band::B20m);
    assert_eq!(snap.rows[2].mode, Mode::CW);
    assert_eq!(snap.rows[2].frequency_khz, 14_025.0);
}

#[test]
fn cross_mode_credit_flows_into_snapshot() {
    let mut state = BandmapState::new(BandmapConfig {
        cross_mode_credit: true,
        ..BandmapConfig::default()
    });
    state.apply_reports(&[SpotReport::new("K1", 14_250.0, 1)]);
    state.record_contacts(&[contact("K1", "20", "CW")]);
    let snap = state.snapshot(&SpotFilter::default(), 1);
    assert_eq!(snap.rows[0].mode, Mode::Phone);
    assert_eq!(snap.rows[0].worked_state, WorkedState::Worked);
}

#[test]
fn bad_report_does_not_abort_batch() {
    let mut state = BandmapState::new(BandmapConfig::default());
    let summary = state.apply_reports(&[
        SpotReport::new("K1", 14_025.0, 1),
        SpotReport::new("", 14_030.0, 1),
        SpotReport::new("K2", -1.0, 1),
        SpotReport::new("K3", 14_035.0, 1),
        SpotReport::new("K1", 14_025.1, 2),
    ]);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.merged, 1);
    assert_eq!(summary.rejected, 2);
    assert_eq!(state.cache().len(), 2);
}

const BATCH: usize = 8;

fn batch(round: usize) -> Vec<SpotReport> {
    (0..BATCH)
        .map(|i| SpotReport::new(format!("R{round}X{i}"), 14_000.0 + (i as f64) * 5.0, round as u64))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshots_under_shared_lock_see_whole_ticks() {
    let state = Arc::new(RwLock::new(BandmapState::new(BandmapConfig::default())));

    let writer = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            for round in 0..200 {
                let reports = batch(round);
                state.write().await.apply_reports(&reports);
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..3 {
        let state = Arc::clone(&state);
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let snap = state.read().await.snapshot(&SpotFilter::default(), 0);
                assert_eq!(snap.rows.len(), snap.tick as usize * BATCH);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.expect("writer");
    for r in readers {
        r.await.expect("reader");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runtime_snapshots_never_observe_partial_batches() {
    let handle = spawn_bandmap(None, None, BandmapConfig::default());

    let writer = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for round in 0..100 {
                handle.ingest_batch(batch(round)).await.expect("batch");
            }
        })
    };

    let reader = {
        let handle = handle.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                let snap = handle.current_snapshot().await.expect("snapshot");
                assert_eq!(snap.rows.len() % BATCH, 0);
                let per_round = snap
                    .rows
                    .iter()
                    .fold(std::collections::HashMap::<String, usize>::new(), |mut acc, r| {
                        let round = r.callsign.split('X').next().unwrap_or_default().to_string();
                        *acc.entry(round).or_default() += 1;
                        acc
                    });
                assert!(per_round.values().all(|n| *n == BATCH));
                tokio::time::sleep(Duration::from_micros(50)).await;
            }
        })
    };

    writer.await.expect("writer");
    reader.await.expect("reader");
    handle.shutdown().await.expect("shutdown");
}
