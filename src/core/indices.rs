use hashbrown::HashMap;

use crate::types::{Band, Mode, SpotId};

/// Merge identity of a spot. Several live spots may share a key when the
/// same station is reported on frequencies further apart than the merge tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpotKey {
    /// Normalized callsign.
    pub callsign: String,
    /// Band bucket.
    pub band: Band,
}

/// Upsert identity of a worked entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkedKey {
    /// Normalized callsign.
    pub callsign: String,
    /// Band bucket.
    pub band: Band,
    /// Mode bucket.
    pub mode: Mode,
}

/// Key to the ids of every spot filed under it.
pub type VecIndex<K> = HashMap<K, Vec<SpotId>>;

pub(crate) fn remove_from_vec_index<K: Eq + std::hash::Hash>(index: &mut VecIndex<K>, key: &K, id: SpotId) {
    let Some(ids) = index.get_mut(key) else {
        return;
    };
    if let Some(pos) = ids.iter().position(|x| *x == id) {
        ids.swap_remove(pos);
    }
    if ids.is_empty() {
        index.remove(key);
    }
}
