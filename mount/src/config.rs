//! Driver configuration.
//!
//! All tunables live in one [`MountConfig`] value built once and handed to the
//! driver. It serializes to JSON so a site configuration can be kept on disk:
//!
//! ```no_run
//! use eqmount::MountConfig;
//! use std::path::Path;
//!
//! let mut config = MountConfig::default();
//! config.observer.latitude_deg = -33.87;
//! config.save_to_file(Path::new("mount.json"))?;
//! let loaded = MountConfig::load_from_file(Path::new("mount.json"))?;
//! assert!(loaded.observer.latitude_deg < 0.0);
//! # Ok::<(), std::io::Error>(())
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::astro::ObserverPosition;
use crate::coords::Hemisphere;
use crate::protocol::AxisId;

/// Default encoder reference the controller powers up with.
pub const DEFAULT_ENCODER_ZERO: u32 = 0x800000;

/// Goto behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GotoConfig {
    /// RA completion tolerance in arcseconds of axis rotation
    pub ra_tolerance_arcsec: f64,
    /// DEC completion tolerance in arcseconds of axis rotation
    pub dec_tolerance_arcsec: f64,
    /// Corrective slews allowed after the first slew
    pub max_iterations: u32,
    /// Moves longer than this many steps run in high speed mode, and high
    /// speed moves begin braking at least this many steps before the target
    pub low_speed_margin: u32,
    /// Fraction of a move reserved for braking
    pub brake_fraction: f64,
    /// Cap on the brake distance of low speed moves
    pub max_low_speed_brake: u32,
    /// Step period used for goto moves
    pub goto_period: u32,
    /// Prefer the counterweight-up configuration
    pub force_counterweight_up: bool,
    /// Keep counterweight-up targets within the RA cable-wrap window
    pub check_limits: bool,
    /// How far ahead of the current sidereal time targets are computed
    pub lead_time_ms: u64,
}

impl Default for GotoConfig {
    fn default() -> Self {
        Self {
            ra_tolerance_arcsec: 5.0,
            dec_tolerance_arcsec: 5.0,
            max_iterations: 5,
            low_speed_margin: 20_000,
            brake_fraction: 0.1,
            max_low_speed_brake: 200,
            goto_period: 18,
            force_counterweight_up: false,
            check_limits: true,
            lead_time_ms: 1000,
        }
    }
}

/// Backlash compensation for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklashConfig {
    /// Excursion in steps taken on direction reversal
    pub steps: u32,
    pub enabled: bool,
}

impl Default for BacklashConfig {
    fn default() -> Self {
        Self {
            steps: 800,
            enabled: false,
        }
    }
}

/// Rate limits for continuous motion, in multiples of the sidereal rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateConfig {
    pub min_rate: f64,
    pub max_rate: f64,
    /// Rates above this use high speed mode
    pub low_speed_limit: f64,
    /// Step period of the backlash excursion
    pub backlash_period: u32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            min_rate: 0.05,
            max_rate: 800.0,
            low_speed_limit: 128.0,
            backlash_period: 64,
        }
    }
}

/// Automatic homing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutohomeConfig {
    /// Ticks allowed between the request and its confirmation
    pub confirm_timeout_ticks: u32,
    /// Clearance move away from home before searching, degrees
    pub clearance_deg: f64,
    /// Retreat from the detected index before the final approach, degrees
    pub retreat_deg: f64,
    /// Search rate toward home, sidereal multiples
    pub fast_rate: f64,
    /// Calibration rate across the index, sidereal multiples
    pub slow_rate: f64,
    /// Ticks to keep moving after the first index flip
    pub settle_ticks: u32,
    /// Ticks a search may run before homing is abandoned
    pub search_limit_ticks: u32,
    /// Encoder value written to the RA register at home
    pub home_encoder_ra: u32,
    /// Encoder value written to the DEC register at home
    pub home_encoder_dec: u32,
}

impl Default for AutohomeConfig {
    fn default() -> Self {
        Self {
            confirm_timeout_ticks: 10,
            clearance_deg: 5.0,
            retreat_deg: 10.0,
            fast_rate: 400.0,
            slow_rate: 50.0,
            settle_ticks: 3,
            search_limit_ticks: 600,
            home_encoder_ra: DEFAULT_ENCODER_ZERO,
            home_encoder_dec: 0xA26C80,
        }
    }
}

/// Park position, supplied by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParkConfig {
    pub ra_encoder: u32,
    pub dec_encoder: u32,
}

impl Default for ParkConfig {
    fn default() -> Self {
        Self {
            ra_encoder: DEFAULT_ENCODER_ZERO,
            dec_encoder: 0xA26C80,
        }
    }
}

/// Complete driver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub observer: ObserverPosition,
    /// Period of the external tick scheduler
    pub tick_period_ms: u64,
    /// Bounded read timeout for a single reply
    pub read_timeout_ms: u64,
    /// Status replies younger than this are reused
    pub status_cache_ms: u64,
    /// Interval between status polls while waiting for a stop
    pub stop_poll_interval_ms: u64,
    /// Polls before a stop wait gives up
    pub stop_poll_limit: u32,
    pub goto: GotoConfig,
    pub backlash_ra: BacklashConfig,
    pub backlash_dec: BacklashConfig,
    pub rates: RateConfig,
    pub autohome: AutohomeConfig,
    pub park: ParkConfig,
    /// Accepted mount type codes
    pub supported_mounts: Vec<u8>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            observer: ObserverPosition::default(),
            tick_period_ms: 1000,
            read_timeout_ms: 1000,
            status_cache_ms: 500,
            stop_poll_interval_ms: 100,
            stop_poll_limit: 600,
            goto: GotoConfig::default(),
            backlash_ra: BacklashConfig::default(),
            backlash_dec: BacklashConfig::default(),
            rates: RateConfig::default(),
            autohome: AutohomeConfig::default(),
            park: ParkConfig::default(),
            supported_mounts: crate::driver::MountModel::supported_codes(),
        }
    }
}

impl MountConfig {
    pub fn hemisphere(&self) -> Hemisphere {
        Hemisphere::from_latitude(self.observer.latitude_deg)
    }

    pub fn backlash(&self, axis: AxisId) -> BacklashConfig {
        match axis {
            AxisId::Ra => self.backlash_ra,
            AxisId::Dec => self.backlash_dec,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn status_cache(&self) -> Duration {
        Duration::from_millis(self.status_cache_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mount.json");

        let mut config = MountConfig::default();
        config.observer.latitude_deg = -31.25;
        config.backlash_dec = BacklashConfig {
            steps: 1200,
            enabled: true,
        };
        config.goto.force_counterweight_up = true;
        config.save_to_file(&path).unwrap();

        let loaded = MountConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.hemisphere(), Hemisphere::South);
        assert_eq!(loaded.backlash(AxisId::Dec).steps, 1200);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "tick_period_ms": 250, "goto": { "max_iterations": 8 } }"#)
            .unwrap();

        let loaded = MountConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.tick_period(), Duration::from_millis(250));
        assert_eq!(loaded.goto.max_iterations, 8);
        assert_eq!(loaded.goto.low_speed_margin, 20_000);
        assert!(!loaded.supported_mounts.is_empty());
    }

    #[test]
    fn test_malformed_file_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = MountConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
