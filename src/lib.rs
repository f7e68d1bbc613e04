//! Live spot cache and bandmap aggregation for contest logging.
//!
//! # Examples
//!
//! Direct use of [`core::state::BandmapState`]:
//! ```
//! use bandmap::{
//!     config::BandmapConfig,
//!     core::{cache::SpotFilter, state::BandmapState},
//!     spot::{ContactEvent, SpotReport},
//!     types::{Band, WorkedState},
//! };
//!
//! let mut state = BandmapState::new(BandmapConfig::default());
//! state.apply_reports(&[
//!     SpotReport::new("K1ABC", 14_025.0, 1_000).with_mode("CW"),
//!     SpotReport::new("W1AW", 7_030.0, 1_000),
//! ]);
//! state.record_contacts(&[ContactEvent {
//!     callsign: "K1ABC".to_string(),
//!     band: "20m".to_string(),
//!     mode: "CW".to_string(),
//!     timestamp: 900,
//! }]);
//!
//! let snap = state.snapshot(&SpotFilter::default(), 5_000);
//! assert_eq!(snap.rows[0].callsign, "W1AW");
//! assert_eq!(snap.rows[1].band, Band::B20m);
//! assert_eq!(snap.rows[1].worked_state, WorkedState::Worked);
//! ```
//!
//! Runtime usage with a channel-fed spot source:
//! ```no_run
//! use bandmap::{
//!     config::BandmapConfig,
//!     feed::channel::ChannelSpotSource,
//!     runtime::handle::spawn_bandmap,
//!     spot::SpotReport,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (tx, source) = ChannelSpotSource::new(64);
//! let handle = spawn_bandmap(Some(Box::new(source)), None, BandmapConfig::default());
//! tx.send(vec![SpotReport::new("K1ABC", 14_025.0, 1_000)]).await.expect("send");
//! let snap = handle.current_snapshot().await.expect("snapshot");
//! println!("{} spots", snap.rows.len());
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Band-edge and mode sub-band tables.
pub mod bandplan;
/// Runtime configuration values.
pub mod config;
/// Spot cache, worked index, and snapshot builder.
pub mod core;
/// Spot and contact source traits and adapters.
pub mod feed;
/// Maidenhead locators and skimmer distance.
pub mod grid;
/// Single-writer scheduler handle and events.
pub mod runtime;
/// Spot, contact, and snapshot records.
pub mod spot;
/// Shared primitive types and enums.
pub mod types;
