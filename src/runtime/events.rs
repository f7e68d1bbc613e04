//! Runtime event stream payloads.

/// Events emitted from the single-writer runtime loop after each mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandmapEvent {
    /// A batch of spot reports was applied.
    TickApplied {
        /// Tick number of the batch.
        tick: u64,
        /// Spots created.
        created: usize,
        /// Reports merged into existing spots.
        merged: usize,
        /// Reports dropped as invalid, off a monitored band, or from an unlisted spotter.
        rejected: usize,
    },
    /// An aging sweep ran.
    Swept {
        /// Tick number of the sweep.
        tick: u64,
        /// Spots evicted.
        evicted: usize,
    },
    /// Logger contacts were recorded.
    ContactsRecorded {
        /// Contacts kept.
        count: usize,
    },
    /// A source fetch failed; the poll tick was skipped.
    SourceFailed {
        /// Failure description.
        message: String,
    },
}
