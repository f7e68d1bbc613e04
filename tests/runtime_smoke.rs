use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use bandmap::{
    config::BandmapConfig,
    core::cache::{MergeResult, SpotFilter},
    feed::{
        SourceError, SourceResult, SpotSource,
        channel::{ChannelContactSource, ChannelSpotSource},
    },
    runtime::{
        events::BandmapEvent,
        handle::{RuntimeError, spawn_bandmap},
    },
    spot::{ContactEvent, SpotReport},
    types::{Band, Mode, WorkedState},
};

fn fast_config() -> BandmapConfig {
    BandmapConfig {
        poll_interval_ms: 20,
        sweep_interval_ms: 60_000,
        fetch_timeout_ms: 100,
        ..BandmapConfig::default()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Fails every other fetch.
struct FlakySource {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SpotSource for FlakySource {
    async fn fetch_spots(&mut self) -> SourceResult<Vec<SpotReport>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            return Err(SourceError::Unavailable("connection refused".to_string()));
        }
        Ok(vec![SpotReport::new("K1ABC", 14_025.0, now_ms())])
    }
}

struct HangingSource;

#[async_trait]
impl SpotSource for HangingSource {
    async fn fetch_spots(&mut self) -> SourceResult<Vec<SpotReport>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn direct_commands_ingest_query_and_status() {
    let handle = spawn_bandmap(None, None, BandmapConfig::default());
    let mut sub = handle.subscribe();

    let created = handle
        .ingest(SpotReport::new("K1ABC", 14_025.0, now_ms()).with_mode("CW"))
        .await
        .expect("ingest");
    assert!(matches!(created, MergeResult::Created(_)));

    let err = handle.ingest(SpotReport::new("", 14_025.0, now_ms())).await;
    assert!(matches!(err, Err(RuntimeError::Ingest(_))));

    assert!(
        handle
            .record_contact(ContactEvent {
                callsign: "K1ABC".to_string(),
                band: "20m".to_string(),
                mode: "CW".to_string(),
                timestamp: now_ms(),
            })
            .await
            .expect("record")
    );

    assert_eq!(
        handle.status("K1ABC", Band::B20m, Mode::CW).await.expect("status"),
        WorkedState::Worked
    );
    let spots = handle.query_active(SpotFilter::band(Band::B20m)).await.expect("query");
    assert_eq!(spots.len(), 1);

    let snap = handle.current_snapshot().await.expect("snapshot");
    assert_eq!(snap.rows[0].worked_state, WorkedState::Worked);

    let first = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv");
    assert_eq!(
        first,
        BandmapEvent::TickApplied {
            tick: 1,
            created: 1,
            merged: 0,
            rejected: 0
        }
    );

    handle.shutdown().await.expect("shutdown");
    assert!(matches!(
        handle.current_snapshot().await,
        Err(RuntimeError::ChannelClosed)
    ));
}

#[tokio::test]
async fn failed_polls_are_counted_and_polling_continues() {
    let calls = Arc::new(AtomicUsize::new(0));
    let source = FlakySource {
        calls: Arc::clone(&calls),
    };
    let handle = spawn_bandmap(Some(Box::new(source)), None, fast_config());
    let mut sub = handle.subscribe();

    let mut failure_seen = false;
    for _ in 0..20 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if matches!(evt, BandmapEvent::SourceFailed { .. }) {
            failure_seen = true;
        }
        let stats = handle.stats().await.expect("stats");
        if failure_seen && stats.polls_ok >= 2 {
            break;
        }
    }

    let stats = handle.stats().await.expect("stats");
    assert!(failure_seen);
    assert!(stats.polls_failed >= 1);
    assert!(stats.polls_ok >= 2);
    assert_eq!(stats.spots, 1);
    assert!(stats.cache.merged >= 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn channel_sources_feed_cache_and_worked_index() {
    let (spot_tx, spots) = ChannelSpotSource::new(8);
    let (contact_tx, contacts) = ChannelContactSource::new(8);
    let handle = spawn_bandmap(Some(Box::new(spots)), Some(Box::new(contacts)), fast_config());

    contact_tx
        .send(vec![ContactEvent {
            callsign: "W1AW".to_string(),
            band: "40".to_string(),
            mode: "CW".to_string(),
            timestamp: now_ms(),
        }])
        .await
        .expect("send contact");
    spot_tx
        .send(vec![
            SpotReport::new("W1AW", 7_030.0, now_ms()),
            SpotReport::new("K9XYZ", 7_020.0, now_ms()),
        ])
        .await
        .expect("send spots");

    let mut rows = Vec::new();
    for _ in 0..50 {
        let snap = handle.current_snapshot().await.expect("snapshot");
        if snap.rows.len() == 2 && snap.rows.iter().any(|r| r.worked_state == WorkedState::Worked) {
            rows = snap.rows;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].callsign, "K9XYZ");
    assert_eq!(rows[0].worked_state, WorkedState::Needed);
    assert_eq!(rows[1].callsign, "W1AW");
    assert_eq!(rows[1].worked_state, WorkedState::Worked);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_aborts_in_flight_fetch() {
    let handle = spawn_bandmap(Some(Box::new(HangingSource)), None, BandmapConfig::default());
    tokio::time::sleep(Duration::from_millis(20)).await;

    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown did not hang")
        .expect("shutdown");
}

#[tokio::test]
async fn slow_fetch_times_out_and_is_counted() {
    let cfg = BandmapConfig {
        poll_interval_ms: 10,
        fetch_timeout_ms: 10,
        ..BandmapConfig::default()
    };
    let handle = spawn_bandmap(Some(Box::new(HangingSource)), None, cfg);
    let mut sub = handle.subscribe();

    let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("event")
        .expect("recv");
    assert_eq!(
        evt,
        BandmapEvent::SourceFailed {
            message: SourceError::Timeout.to_string()
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn explicit_sweep_evicts_expired_spots() {
    let handle = spawn_bandmap(None, None, BandmapConfig::default());
    let summary = handle
        .ingest_batch(vec![
            SpotReport::new("OLD", 14_010.0, 1_000),
            SpotReport::new("NEW", 14_020.0, 900_000),
        ])
        .await
        .expect("batch");
    assert_eq!(summary.created, 2);

    assert_eq!(handle.sweep_at(1_000 + 600_001).await.expect("sweep"), 1);
    let spots = handle.query_active(SpotFilter::default()).await.expect("query");
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].callsign, "NEW");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn caller_driven_fetch_reports_source_errors() {
    let handle = spawn_bandmap(None, None, BandmapConfig::default());
    let mut flaky = FlakySource {
        calls: Arc::new(AtomicUsize::new(0)),
    };

    let err = handle.ingest_from(&mut flaky, Duration::from_millis(100)).await;
    assert!(matches!(err, Err(RuntimeError::Source(SourceError::Unavailable(_)))));
    assert_eq!(handle.stats().await.expect("stats").ticks, 0);

    let summary = handle
        .ingest_from(&mut flaky, Duration::from_millis(100))
        .await
        .expect("second fetch succeeds");
    assert_eq!(summary.created, 1);
    assert_eq!(summary.tick, 1);

    let timed_out = handle.ingest_from(&mut HangingSource, Duration::from_millis(20)).await;
    assert!(matches!(timed_out, Err(RuntimeError::Source(SourceError::Timeout))));

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn snapshot_rows_carry_vfo_offset() {
    let handle = spawn_bandmap(None, None, BandmapConfig::default());
    handle
        .ingest_batch(vec![
            SpotReport::new("K1ABC", 14_025.0, now_ms()),
            SpotReport::new("W1AW", 14_030.5, now_ms()),
        ])
        .await
        .expect("batch");

    let snap = handle
        .snapshot(SpotFilter::band(Band::B20m).with_vfo_khz(14_026.0))
        .await
        .expect("snapshot");
    let deltas: Vec<Option<f64>> = snap.rows.iter().map(|r| r.vfo_delta_khz).collect();
    assert_eq!(deltas, vec![Some(-1.0), Some(4.5)]);

    let plain = handle.current_snapshot().await.expect("snapshot");
    assert!(plain.rows.iter().all(|r| r.vfo_delta_khz.is_none()));

    handle.shutdown().await.expect("shutdown");
}
