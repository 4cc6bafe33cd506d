//! Conversions between encoder steps and axis angles.
//!
//! All functions are pure. Encoder values are signed so that intermediate
//! results below the zero reference do not wrap; the controller register itself
//! is 24-bit and positions near the default 0x800000 reference never approach
//! either end of that range.
//!
//! # Conventions
//!
//! - The RA axis reads 6h at its zero reference (counterweight down, pointing at
//!   the pole) and the hour value decreases as the encoder increases.
//! - The DEC axis reads 0° at its zero reference and the pole sits a quarter
//!   revolution above it.
//! - Southern hemisphere mounts run mirrored: both readings are reflected.
//!
//! [`encoder_from_hours`] and [`encoder_from_degrees`] invert the readings exactly
//! for encoder values within half a revolution of the zero reference.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Observer hemisphere, which mirrors the sense of both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub fn from_latitude(latitude_deg: f64) -> Self {
        if latitude_deg < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }
}

/// Side of the pier the telescope tube sits on.
///
/// `West` is the normal configuration for targets east of the meridian and
/// keeps the declination axis between the equator and the pole. `East` is the
/// flipped configuration with the declination axis beyond the pole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum PierSide {
    East,
    West,
}

impl PierSide {
    pub fn flipped(self) -> Self {
        match self {
            PierSide::East => PierSide::West,
            PierSide::West => PierSide::East,
        }
    }
}

/// Wrap hours to `[0, 24)`.
pub fn range_24(hours: f64) -> f64 {
    let r = hours.rem_euclid(24.0);
    if r >= 24.0 {
        0.0
    } else {
        r
    }
}

/// Wrap degrees to `[0, 360)`.
pub fn range_360(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Wrap an hour angle to `[-12, 12)`.
pub fn range_ha(hours: f64) -> f64 {
    range_24(hours + 12.0) - 12.0
}

/// Wrap a declination-like angle to `[-180, 180)`.
pub fn range_dec(degrees: f64) -> f64 {
    range_360(degrees + 180.0) - 180.0
}

/// RA axis reading in hours for an encoder value.
pub fn encoder_to_hours(step: i64, zero: i64, total: u32, hemisphere: Hemisphere) -> f64 {
    let delta = (step - zero) as f64 / f64::from(total) * 24.0;
    match hemisphere {
        Hemisphere::North => range_24(6.0 - delta),
        Hemisphere::South => range_24(6.0 + delta),
    }
}

/// DEC axis reading in degrees for an encoder value.
pub fn encoder_to_degrees(step: i64, zero: i64, total: u32, hemisphere: Hemisphere) -> f64 {
    let delta = (step - zero) as f64 / f64::from(total) * 360.0;
    match hemisphere {
        Hemisphere::North => range_360(delta),
        Hemisphere::South => range_360(360.0 - delta),
    }
}

/// Encoder value at which the RA axis reads `hours`.
///
/// The result lies within half a revolution of `zero`.
pub fn encoder_from_hours(hours: f64, zero: i64, total: u32, hemisphere: Hemisphere) -> i64 {
    let shift = range_24(hours - 6.0);
    let total = f64::from(total);
    let offset = match hemisphere {
        Hemisphere::North if shift <= 12.0 => -(shift / 24.0) * total,
        Hemisphere::North => ((24.0 - shift) / 24.0) * total,
        Hemisphere::South if shift < 12.0 => (shift / 24.0) * total,
        Hemisphere::South => -((24.0 - shift) / 24.0) * total,
    };
    zero + offset.round() as i64
}

/// Encoder value at which the DEC axis reads `degrees`.
///
/// Readings past 180° fold back below the zero reference on the west pier, so
/// the normal configuration passes continuously through the equator.
pub fn encoder_from_degrees(
    degrees: f64,
    pier: PierSide,
    zero: i64,
    total: u32,
    hemisphere: Hemisphere,
) -> i64 {
    let target = match hemisphere {
        Hemisphere::North => range_360(degrees),
        Hemisphere::South => range_360(360.0 - degrees),
    };
    let total = f64::from(total);
    let offset = if target > 180.0 && pier == PierSide::West {
        -((360.0 - target) / 360.0) * total
    } else {
        (target / 360.0) * total
    };
    zero + offset.round() as i64
}

/// DEC axis reading for a declination on the given pier side.
pub fn dec_axis_degrees(declination: f64, pier: PierSide) -> f64 {
    match pier {
        PierSide::West => range_360(declination),
        PierSide::East => range_360(180.0 - declination),
    }
}

/// Declination and pier side for a DEC axis reading.
pub fn dec_from_axis_degrees(axis_degrees: f64) -> (f64, PierSide) {
    let axis_degrees = range_360(axis_degrees);
    if axis_degrees > 90.0 && axis_degrees <= 270.0 {
        (180.0 - axis_degrees, PierSide::East)
    } else {
        (range_dec(axis_degrees), PierSide::West)
    }
}

/// RA axis reading for a target, given local sidereal time and pier side.
///
/// The flipped configuration turns the RA axis half a revolution.
pub fn ra_axis_hours(ra: f64, lst: f64, pier: PierSide) -> f64 {
    match pier {
        PierSide::West => range_24(ra - lst),
        PierSide::East => range_24(ra - lst + 12.0),
    }
}

/// Right ascension for an RA axis reading.
pub fn ra_from_axis_hours(axis_hours: f64, lst: f64, pier: PierSide) -> f64 {
    match pier {
        PierSide::West => range_24(axis_hours + lst),
        PierSide::East => range_24(axis_hours + lst - 12.0),
    }
}

/// Convert an angular step count to arcseconds of axis rotation.
pub fn steps_to_arcsec(steps: i64, total: u32) -> f64 {
    steps as f64 * 1_296_000.0 / f64::from(total)
}

/// Convert degrees of axis rotation to encoder steps.
pub fn degrees_to_steps(degrees: f64, total: u32) -> i64 {
    (degrees / 360.0 * f64::from(total)).round() as i64
}

/// Zero references and resolution of both axes for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountGeometry {
    pub ra_zero: i64,
    pub dec_zero: i64,
    pub ra_total: u32,
    pub dec_total: u32,
    pub hemisphere: Hemisphere,
}

/// Sky position derived from a pair of encoder readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    /// Right ascension in hours
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    pub pier_side: PierSide,
}

impl MountGeometry {
    /// Encoder values that point the mount at `(ra, dec)` on the given side.
    pub fn encoders_for(&self, ra: f64, dec: f64, lst: f64, pier: PierSide) -> (i64, i64) {
        let ra_encoder = encoder_from_hours(
            ra_axis_hours(ra, lst, pier),
            self.ra_zero,
            self.ra_total,
            self.hemisphere,
        );
        let dec_encoder = encoder_from_degrees(
            dec_axis_degrees(dec, pier),
            pier,
            self.dec_zero,
            self.dec_total,
            self.hemisphere,
        );
        (ra_encoder, dec_encoder)
    }

    /// Sky position for encoder readings at sidereal time `lst`.
    pub fn sky_position(&self, ra_encoder: i64, dec_encoder: i64, lst: f64) -> SkyPosition {
        let axis_hours = encoder_to_hours(ra_encoder, self.ra_zero, self.ra_total, self.hemisphere);
        let axis_degrees =
            encoder_to_degrees(dec_encoder, self.dec_zero, self.dec_total, self.hemisphere);
        let (dec, pier_side) = dec_from_axis_degrees(axis_degrees);
        SkyPosition {
            ra: ra_from_axis_hours(axis_hours, lst, pier_side),
            dec,
            pier_side,
        }
    }

    /// RA encoder offset from the zero reference.
    pub fn ra_offset(&self, ra_encoder: i64) -> i64 {
        ra_encoder - self.ra_zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOTAL: u32 = 9_024_000;
    const ZERO: i64 = 0x800000;

    #[test]
    fn test_zero_reference_readings() {
        assert_relative_eq!(encoder_to_hours(ZERO, ZERO, TOTAL, Hemisphere::North), 6.0);
        assert_relative_eq!(encoder_to_hours(ZERO, ZERO, TOTAL, Hemisphere::South), 6.0);
        assert_relative_eq!(encoder_to_degrees(ZERO, ZERO, TOTAL, Hemisphere::North), 0.0);
        let pole = ZERO + i64::from(TOTAL / 4);
        assert_relative_eq!(encoder_to_degrees(pole, ZERO, TOTAL, Hemisphere::North), 90.0);
        assert_relative_eq!(
            encoder_to_degrees(pole, ZERO, TOTAL, Hemisphere::South),
            270.0
        );
    }

    #[test]
    fn test_south_mirrors_north() {
        let step = ZERO + 1_000_000;
        let north = encoder_to_hours(step, ZERO, TOTAL, Hemisphere::North);
        let south = encoder_to_hours(step, ZERO, TOTAL, Hemisphere::South);
        assert_relative_eq!(range_24(north - 6.0), range_24(-(south - 6.0)), epsilon = 1e-9);
    }

    #[test]
    fn test_hours_inverse_over_revolution() {
        // Zero at half a revolution so [0, total) is the invertible window.
        let zero = i64::from(TOTAL / 2);
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            for step in (0..i64::from(TOTAL)).step_by(4_513).chain([0, i64::from(TOTAL) - 1]) {
                let hours = encoder_to_hours(step, zero, TOTAL, hemisphere);
                assert_eq!(
                    encoder_from_hours(hours, zero, TOTAL, hemisphere),
                    step,
                    "{hemisphere} step {step}"
                );
            }
        }
    }

    #[test]
    fn test_degrees_inverse_on_both_piers() {
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            for declination in [-89.0, -45.0, -0.5, 0.0, 12.5, 45.0, 89.9] {
                for pier in [PierSide::East, PierSide::West] {
                    let axis = dec_axis_degrees(declination, pier);
                    let step = encoder_from_degrees(axis, pier, ZERO, TOTAL, hemisphere);
                    let reading = encoder_to_degrees(step, ZERO, TOTAL, hemisphere);
                    let (dec, side) = dec_from_axis_degrees(reading);
                    assert_relative_eq!(dec, declination, epsilon = 1e-4);
                    assert_eq!(side, pier, "{hemisphere} dec {declination}");
                }
            }
        }
    }

    #[test]
    fn test_west_pier_folds_through_zero() {
        // Negative declination on the normal side sits just below the zero reference.
        let axis = dec_axis_degrees(-10.0, PierSide::West);
        let step = encoder_from_degrees(axis, PierSide::West, ZERO, TOTAL, Hemisphere::North);
        assert_eq!(step, ZERO - degrees_to_steps(10.0, TOTAL));

        // The flipped side continues past the pole instead.
        let axis = dec_axis_degrees(-10.0, PierSide::East);
        let step = encoder_from_degrees(axis, PierSide::East, ZERO, TOTAL, Hemisphere::North);
        assert_eq!(step, ZERO + degrees_to_steps(190.0, TOTAL));
    }

    #[test]
    fn test_axis_hours_inverse() {
        let lst = 12.0;
        for ra in [0.0, 5.5, 18.0, 23.99] {
            for pier in [PierSide::East, PierSide::West] {
                let hours = ra_axis_hours(ra, lst, pier);
                assert_relative_eq!(ra_from_axis_hours(hours, lst, pier), ra, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_geometry_round_trip() {
        for hemisphere in [Hemisphere::North, Hemisphere::South] {
            let geometry = MountGeometry {
                ra_zero: ZERO,
                dec_zero: ZERO,
                ra_total: TOTAL,
                dec_total: TOTAL,
                hemisphere,
            };
            for (ra, dec, pier) in [
                (18.0, 45.0, PierSide::West),
                (7.25, -30.0, PierSide::East),
                (11.0, 80.0, PierSide::West),
            ] {
                let (ra_enc, dec_enc) = geometry.encoders_for(ra, dec, 12.0, pier);
                let sky = geometry.sky_position(ra_enc, dec_enc, 12.0);
                assert_relative_eq!(sky.ra, ra, epsilon = 1e-4);
                assert_relative_eq!(sky.dec, dec, epsilon = 1e-4);
                assert_eq!(sky.pier_side, pier);
            }
        }
    }

    #[test]
    fn test_home_position_points_at_pole() {
        let geometry = MountGeometry {
            ra_zero: ZERO,
            dec_zero: ZERO,
            ra_total: TOTAL,
            dec_total: TOTAL,
            hemisphere: Hemisphere::North,
        };
        let sky = geometry.sky_position(ZERO, ZERO + i64::from(TOTAL / 4), 3.0);
        assert_relative_eq!(sky.dec, 90.0);
        assert_eq!(sky.pier_side, PierSide::West);
    }

    #[test]
    fn test_range_helpers() {
        assert_relative_eq!(range_24(-1.0), 23.0);
        assert_relative_eq!(range_24(25.0), 1.0);
        assert_relative_eq!(range_360(-90.0), 270.0);
        assert_relative_eq!(range_ha(13.0), -11.0);
        assert_relative_eq!(range_ha(-12.0), -12.0);
        assert_relative_eq!(range_dec(270.0), -90.0);
        assert_relative_eq!(steps_to_arcsec(i64::from(TOTAL), TOTAL), 1_296_000.0);
    }
}
