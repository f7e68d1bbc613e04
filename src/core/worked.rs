use hashbrown::HashMap;

use crate::{
    spot::{WorkedEntry, normalize_callsign},
    types::{Band, Mode, WorkedState},
};

use super::indices::WorkedKey;

/// Latest contact per `(callsign, band, mode)`, plus a per-`(callsign, band)`
/// mode list so cross-mode lookups do not scan the whole log.
#[derive(Debug, Default)]
pub struct WorkedIndex {
    entries: HashMap<WorkedKey, WorkedEntry>,
    modes_by_call_band: HashMap<(String, Band), Vec<Mode>>,
    cross_mode_credit: bool,
}

impl WorkedIndex {
    /// Creates an empty index. `cross_mode_credit` lets a contact on any mode count as worked.
    pub fn new(cross_mode_credit: bool) -> Self {
        Self {
            cross_mode_credit,
            ..Self::default()
        }
    }

    /// Upserts `entry`, keeping whichever of the old and new entries is newer.
    /// Entries with an empty callsign are dropped and `false` is returned.
    pub fn record(&mut self, entry: WorkedEntry) -> bool {
        let callsign = normalize_callsign(&entry.callsign);
        if callsign.is_empty() {
            return false;
        }

        let key = WorkedKey {
            callsign: callsign.clone(),
            band: entry.band,
            mode: entry.mode,
        };
        let entry = WorkedEntry { callsign, ..entry };

        match self.entries.get_mut(&key) {
            Some(existing) => {
                if entry.ts_ms >= existing.ts_ms {
                    *existing = entry;
                }
            }
            None => {
                self.entries.insert(key.clone(), entry);
                self.modes_by_call_band
                    .entry((key.callsign, key.band))
                    .or_default()
                    .push(key.mode);
            }
        }
        true
    }

    /// Worked annotation for a spot of `callsign` on `band` and `mode`.
    pub fn status(&self, callsign: &str, band: Band, mode: Mode) -> WorkedState {
        let callsign = normalize_callsign(callsign);
        let Some(modes) = self.modes_by_call_band.get(&(callsign, band)) else {
            return WorkedState::Needed;
        };

        if modes.contains(&mode) || self.cross_mode_credit {
            return WorkedState::Worked;
        }
        // Worked on some mode, but the spot's own mode is unknown so we cannot tell.
        if mode == Mode::Unknown {
            return WorkedState::Unknown;
        }
        WorkedState::Needed
    }

    /// Stored entry for the exact `(callsign, band, mode)` key.
    pub fn get(&self, callsign: &str, band: Band, mode: Mode) -> Option<&WorkedEntry> {
        self.entries.get(&WorkedKey {
            callsign: normalize_callsign(callsign),
            band,
            mode,
        })
    }

    /// Number of distinct `(callsign, band, mode)` keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether cross-mode credit is on.
    pub fn cross_mode_credit(&self) -> bool {
        self.cross_mode_credit
    }
}
