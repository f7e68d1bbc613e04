//! Runtime configuration values consumed by the cache, index, and scheduler.

use serde::Deserialize;
use thiserror::Error;
use tokio::time::Duration;

use crate::{bandplan::BandPlan, spot::normalize_callsign, types::Band};

/// Configuration decode or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document did not match [`BandmapConfig`].
    #[error("config decode failed: {0}")]
    Toml(#[from] toml::de::Error),
    /// A value was out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// All tunables for a bandmap instance.
///
/// Every field has a default, so a partial TOML document is enough:
///
/// ```
/// let cfg = bandmap::config::BandmapConfig::from_toml_str("ttl_ms = 300000").unwrap();
/// assert_eq!(cfg.ttl_ms, 300_000);
/// assert_eq!(cfg.merge_tolerance_hz, 1_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BandmapConfig {
    /// Spot source polling period.
    pub poll_interval_ms: u64,
    /// Aging sweep period.
    pub sweep_interval_ms: u64,
    /// Spots not refreshed for longer than this are evicted.
    pub ttl_ms: u64,
    /// Reports for the same call and band within this distance merge into one spot.
    pub merge_tolerance_hz: u64,
    /// A merge moves the spot only when the new report is further away than this.
    pub significant_move_hz: u64,
    /// Lets a contact on one mode satisfy a worked query on another.
    pub cross_mode_credit: bool,
    /// Infers mode from the sub-band table when a report carries none.
    pub infer_mode: bool,
    /// Upper bound for a single source fetch.
    pub fetch_timeout_ms: u64,
    /// Evict the stalest spot once the cache grows past this.
    pub max_spots: Option<usize>,
    /// Only accept reports on these bands. `None` accepts every band.
    pub monitored_bands: Option<Vec<Band>>,
    /// Only accept reports from these spotters. `None` accepts any report,
    /// including ones that name no spotter. See [`crate::grid::local_spotters`].
    pub allowed_spotters: Option<Vec<String>>,
    /// Band-edge and sub-band tables.
    pub band_plan: BandPlan,
}

impl Default for BandmapConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            sweep_interval_ms: 30_000,
            ttl_ms: 600_000,
            merge_tolerance_hz: 1_000,
            significant_move_hz: 500,
            cross_mode_credit: false,
            infer_mode: true,
            fetch_timeout_ms: 5_000,
            max_spots: None,
            monitored_bands: None,
            allowed_spotters: None,
            band_plan: BandPlan::default(),
        }
    }
}

impl BandmapConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects combinations that would make the scheduler or merge policy misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".to_string()));
        }
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid("ttl_ms must be non-zero".to_string()));
        }
        if self.significant_move_hz > self.merge_tolerance_hz {
            return Err(ConfigError::Invalid(format!(
                "significant_move_hz ({}) exceeds merge_tolerance_hz ({})",
                self.significant_move_hz, self.merge_tolerance_hz
            )));
        }
        if self.max_spots == Some(0) {
            return Err(ConfigError::Invalid("max_spots must be at least 1".to_string()));
        }
        self.band_plan.validate().map_err(ConfigError::Invalid)
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub(crate) fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub(crate) fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub(crate) fn band_monitored(&self, band: Band) -> bool {
        self.monitored_bands
            .as_ref()
            .is_none_or(|bands| bands.contains(&band))
    }

    pub(crate) fn spotter_allowed(&self, spotter: Option<&str>) -> bool {
        let Some(allowed) = &self.allowed_spotters else {
            return true;
        };
        let Some(spotter) = spotter.map(normalize_callsign) else {
            return false;
        };
        allowed.iter().any(|a| normalize_callsign(a) == spotter)
    }
}
