//! Spot cache, worked-station index, and snapshot builder.

/// Spot cache engine: merge, aging, and ordered queries.
pub mod cache;
/// Key types and multi-valued index helpers.
pub mod indices;
/// Point-in-time snapshot construction.
pub mod snapshot;
/// Worked-station index.
pub mod worked;
/// Cache and index bundled behind one owner.
pub mod state;
