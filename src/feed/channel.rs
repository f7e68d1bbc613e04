//! Sources fed through tokio channels by an external adapter.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::spot::{ContactEvent, SpotReport};

use super::{ContactSource, SourceError, SourceResult, SpotSource};

/// Spot source that drains batches pushed by an adapter task.
pub struct ChannelSpotSource {
    rx: mpsc::Receiver<Vec<SpotReport>>,
}

impl ChannelSpotSource {
    /// Creates the source and the sender the adapter pushes batches into.
    pub fn new(bound: usize) -> (mpsc::Sender<Vec<SpotReport>>, Self) {
        let (tx, rx) = mpsc::channel(bound);
        (tx, Self { rx })
    }
}

#[async_trait]
impl SpotSource for ChannelSpotSource {
    async fn fetch_spots(&mut self) -> SourceResult<Vec<SpotReport>> {
        drain(&mut self.rx, "spot")
    }
}

/// Contact source for loggers that broadcast one event per completed QSO.
pub struct ChannelContactSource {
    rx: mpsc::Receiver<Vec<ContactEvent>>,
}

impl ChannelContactSource {
    /// Creates the source and the sender the logger bridge pushes events into.
    pub fn new(bound: usize) -> (mpsc::Sender<Vec<ContactEvent>>, Self) {
        let (tx, rx) = mpsc::channel(bound);
        (tx, Self { rx })
    }
}

#[async_trait]
impl ContactSource for ChannelContactSource {
    async fn fetch_contacts(&mut self) -> SourceResult<Vec<ContactEvent>> {
        drain(&mut self.rx, "contact")
    }
}

fn drain<T>(rx: &mut mpsc::Receiver<Vec<T>>, what: &str) -> SourceResult<Vec<T>> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(batch) => out.extend(batch),
            Err(TryRecvError::Empty) => return Ok(out),
            Err(TryRecvError::Disconnected) if out.is_empty() => {
                return Err(SourceError::Unavailable(format!("{what} channel closed")));
            }
            Err(TryRecvError::Disconnected) => return Ok(out),
        }
    }
}
