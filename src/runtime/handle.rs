use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::BandmapConfig,
    core::{
        cache::{CacheStats, IngestError, MergeResult, SpotFilter},
        state::{BandmapState, BatchSummary},
    },
    feed::{ContactSource, SourceError, SpotSource},
    spot::{ContactEvent, Snapshot, Spot, SpotReport},
    types::{Band, Mode, TimestampMs, WorkedState},
};

use super::events::BandmapEvent;

/// Failure of a call made through [`BandmapHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime loop has stopped.
    #[error("bandmap runtime is not running")]
    ChannelClosed,
    /// The cache refused a single report.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// A caller-driven fetch failed before anything reached the cache.
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Counters reported by [`BandmapHandle::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Cache counters.
    pub cache: CacheStats,
    /// Mutation ticks applied.
    pub ticks: u64,
    /// Live spots.
    pub spots: usize,
    /// Worked index entries.
    pub worked_entries: usize,
    /// Successful spot polls.
    pub polls_ok: u64,
    /// Failed or timed-out polls of either source.
    pub polls_failed: u64,
}

/// Clonable handle to a running bandmap. Every clone talks to the same loop.
pub struct BandmapHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<BandmapEvent>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Clone for BandmapHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            shutdown_tx: Arc::clone(&self.shutdown_tx),
        }
    }
}

enum Command {
    Ingest {
        report: SpotReport,
        resp: oneshot::Sender<Result<MergeResult, IngestError>>,
    },
    IngestBatch {
        reports: Vec<SpotReport>,
        resp: oneshot::Sender<BatchSummary>,
    },
    RecordContacts {
        events: Vec<ContactEvent>,
        resp: oneshot::Sender<usize>,
    },
    PollCompleted {
        reports: Vec<SpotReport>,
    },
    PollContacts {
        events: Vec<ContactEvent>,
    },
    PollFailed {
        message: String,
    },
    Sweep {
        now_ms: TimestampMs,
        resp: oneshot::Sender<usize>,
    },
    Snapshot {
        filter: SpotFilter,
        resp: oneshot::Sender<Snapshot>,
    },
    Query {
        filter: SpotFilter,
        resp: oneshot::Sender<Vec<Spot>>,
    },
    Status {
        callsign: String,
        band: Band,
        mode: Mode,
        resp: oneshot::Sender<WorkedState>,
    },
    Stats {
        resp: oneshot::Sender<RuntimeStats>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Actor {
    state: BandmapState,
    events_tx: broadcast::Sender<BandmapEvent>,
    polls_ok: u64,
    polls_failed: u64,
}

/// Starts the single-writer loop plus, when any source is given, the poller task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_bandmap(
    spot_source: Option<Box<dyn SpotSource>>,
    contact_source: Option<Box<dyn ContactSource>>,
    config: BandmapConfig,
) -> BandmapHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<BandmapEvent>(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut poller = if spot_source.is_some() || contact_source.is_some() {
        Some(spawn_poller(
            spot_source,
            contact_source,
            cmd_tx.clone(),
            shutdown_rx,
            config.clone(),
        ))
    } else {
        None
    };

    let sweep_every = config.sweep_interval();
    let mut actor = Actor {
        state: BandmapState::new(config),
        events_tx: events_tx.clone(),
        polls_ok: 0,
        polls_failed: 0,
    };

    tokio::spawn(async move {
        info!(sweep_interval_ms = sweep_every.as_millis() as u64, "bandmap runtime started");
        let mut sweep_timer = tokio::time::interval_at(Instant::now() + sweep_every, sweep_every);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if let Command::Shutdown { resp } = cmd {
                        if let Some(poller) = poller.take() {
                            let _ = poller.await;
                        }
                        let _ = resp.send(());
                        break;
                    }
                    actor.handle_command(cmd);
                }
                _ = sweep_timer.tick() => {
                    actor.sweep(now_ms());
                }
            }
        }
        info!(ticks = actor.state.tick(), "bandmap runtime stopped");
    });

    BandmapHandle {
        cmd_tx,
        events_tx,
        shutdown_tx: Arc::new(shutdown_tx),
    }
}

impl BandmapHandle {
    /// Subscribes to tick, sweep and source events.
    pub fn subscribe(&self) -> broadcast::Receiver<BandmapEvent> {
        self.events_tx.subscribe()
    }

    /// Ingests one report as its own tick.
    pub async fn ingest(&self, report: SpotReport) -> Result<MergeResult, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Ingest { report, resp: tx }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::ChannelClosed)??)
    }

    /// Applies `reports` as one tick; snapshots observe all of them or none.
    pub async fn ingest_batch(&self, reports: Vec<SpotReport>) -> Result<BatchSummary, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::IngestBatch { reports, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Fetches once from `source` on the caller's task and applies the result as one tick.
    ///
    /// The fetch is bounded by `fetch_timeout`. A failed fetch leaves the cache untouched.
    pub async fn ingest_from(
        &self,
        source: &mut dyn SpotSource,
        fetch_timeout: Duration,
    ) -> Result<BatchSummary, RuntimeError> {
        let reports = flatten_timeout(tokio::time::timeout(fetch_timeout, source.fetch_spots()).await)?;
        self.ingest_batch(reports).await
    }

    /// Records logger contacts as one tick. Returns how many were kept.
    pub async fn record_contacts(&self, events: Vec<ContactEvent>) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::RecordContacts { events, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Records a single contact. Returns false if it was dropped.
    pub async fn record_contact(&self, event: ContactEvent) -> Result<bool, RuntimeError> {
        Ok(self.record_contacts(vec![event]).await? == 1)
    }

    /// Runs an aging sweep immediately against the wall clock.
    pub async fn sweep_now(&self) -> Result<usize, RuntimeError> {
        self.sweep_at(now_ms()).await
    }

    /// Runs an aging sweep against `now_ms`.
    pub async fn sweep_at(&self, now_ms: TimestampMs) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Sweep { now_ms, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Filtered snapshot of the latest completed tick.
    pub async fn snapshot(&self, filter: SpotFilter) -> Result<Snapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot { filter, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Unfiltered snapshot for the renderer's refresh cycle.
    pub async fn current_snapshot(&self) -> Result<Snapshot, RuntimeError> {
        self.snapshot(SpotFilter::default()).await
    }

    /// Copies of the matching live spots.
    pub async fn query_active(&self, filter: SpotFilter) -> Result<Vec<Spot>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Query { filter, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Worked state of `callsign` on `band` and `mode`.
    pub async fn status(
        &self,
        callsign: impl Into<String>,
        band: Band,
        mode: Mode,
    ) -> Result<WorkedState, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status {
            callsign: callsign.into(),
            band,
            mode,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Current counters.
    pub async fn stats(&self) -> Result<RuntimeStats, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Stops the poller, lets the current tick finish, then stops the loop.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.shutdown_tx.send_replace(true);
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

impl Actor {
    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Ingest { report, resp } => {
                let res = self.state.apply_report(&report);
                let (created, merged, rejected) = match res {
                    Ok(MergeResult::Created(_)) => (1, 0, 0),
                    Ok(MergeResult::Merged(_)) => (0, 1, 0),
                    Err(_) => (0, 0, 1),
                };
                let _ = self.events_tx.send(BandmapEvent::TickApplied {
                    tick: self.state.tick(),
                    created,
                    merged,
                    rejected,
                });
                let _ = resp.send(res);
            }
            Command::IngestBatch { reports, resp } => {
                let summary = self.apply_batch(&reports);
                let _ = resp.send(summary);
            }
            Command::RecordContacts { events, resp } => {
                let kept = self.record_contacts(&events);
                let _ = resp.send(kept);
            }
            Command::PollCompleted { reports } => {
                self.polls_ok += 1;
                self.apply_batch(&reports);
            }
            Command::PollContacts { events } => {
                self.record_contacts(&events);
            }
            Command::PollFailed { message } => {
                self.polls_failed += 1;
                let _ = self.events_tx.send(BandmapEvent::SourceFailed { message });
            }
            Command::Sweep { now_ms, resp } => {
                let evicted = self.sweep(now_ms);
                let _ = resp.send(evicted);
            }
            Command::Snapshot { filter, resp } => {
                let _ = resp.send(self.state.snapshot(&filter, now_ms()));
            }
            Command::Query { filter, resp } => {
                let _ = resp.send(self.state.cache().query_active(&filter));
            }
            Command::Status {
                callsign,
                band,
                mode,
                resp,
            } => {
                let _ = resp.send(self.state.worked().status(&callsign, band, mode));
            }
            Command::Stats { resp } => {
                let _ = resp.send(RuntimeStats {
                    cache: self.state.cache().stats(),
                    ticks: self.state.tick(),
                    spots: self.state.cache().len(),
                    worked_entries: self.state.worked().len(),
                    polls_ok: self.polls_ok,
                    polls_failed: self.polls_failed,
                });
            }
            Command::Shutdown { resp } => {
                let _ = resp.send(());
            }
        }
    }

    fn apply_batch(&mut self, reports: &[SpotReport]) -> BatchSummary {
        let summary = self.state.apply_reports(reports);
        debug!(
            tick = summary.tick,
            created = summary.created,
            merged = summary.merged,
            rejected = summary.rejected,
            "spot batch applied"
        );
        if summary.rejected > 0 {
            warn!(tick = summary.tick, rejected = summary.rejected, "dropped invalid spot reports");
        }
        let _ = self.events_tx.send(BandmapEvent::TickApplied {
            tick: summary.tick,
            created: summary.created,
            merged: summary.merged,
            rejected: summary.rejected,
        });
        summary
    }

    fn record_contacts(&mut self, events: &[ContactEvent]) -> usize {
        let count = self.state.record_contacts(events);
        debug!(tick = self.state.tick(), count, "contacts recorded");
        let _ = self.events_tx.send(BandmapEvent::ContactsRecorded { count });
        count
    }

    fn sweep(&mut self, now_ms: TimestampMs) -> usize {
        let evicted = self.state.sweep(now_ms);
        debug!(tick = self.state.tick(), evicted, remaining = self.state.cache().len(), "aging sweep");
        let _ = self.events_tx.send(BandmapEvent::Swept {
            tick: self.state.tick(),
            evicted,
        });
        evicted
    }
}

fn spawn_poller(
    mut spot_source: Option<Box<dyn SpotSource>>,
    mut contact_source: Option<Box<dyn ContactSource>>,
    cmd_tx: mpsc::Sender<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
    config: BandmapConfig,
) -> JoinHandle<()> {
    let timeout = config.fetch_timeout();
    let period = config.poll_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                _ = ticker.tick() => {}
            }

            let mut msgs = Vec::with_capacity(2);

            if let Some(source) = contact_source.as_mut() {
                let fetched = tokio::select! {
                    biased;
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                    r = tokio::time::timeout(timeout, source.fetch_contacts()) => flatten_timeout(r),
                };
                match fetched {
                    Ok(events) if events.is_empty() => {}
                    Ok(events) => msgs.push(Command::PollContacts { events }),
                    Err(err) => {
                        warn!(%err, "contact source fetch failed");
                        msgs.push(Command::PollFailed { message: err.to_string() });
                    }
                }
            }

            if let Some(source) = spot_source.as_mut() {
                let fetched = tokio::select! {
                    biased;
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                    r = tokio::time::timeout(timeout, source.fetch_spots()) => flatten_timeout(r),
                };
                match fetched {
                    Ok(reports) => msgs.push(Command::PollCompleted { reports }),
                    Err(err) => {
                        warn!(%err, "spot source fetch failed; retrying next tick");
                        msgs.push(Command::PollFailed { message: err.to_string() });
                    }
                }
            }

            for msg in msgs {
                let sent = tokio::select! {
                    biased;
                    _ = shutdown_rx.wait_for(|stop| *stop) => false,
                    r = cmd_tx.send(msg) => r.is_ok(),
                };
                if !sent {
                    return;
                }
            }
        }
        debug!("spot poller stopped");
    })
}

fn flatten_timeout<T>(
    r: Result<Result<T, SourceError>, tokio::time::error::Elapsed>,
) -> Result<T, SourceError> {
    r.unwrap_or(Err(SourceError::Timeout))
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
