//! Time and horizon calculations.
//!
//! Sidereal time uses the IAU 1982 GMST expression, which is accurate to well
//! under a second over decades and is all a mount driver needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coords::{range_24, range_360};

/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian date of J2000.0.
const J2000_JD: f64 = 2_451_545.0;

/// Observer location on the Earth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverPosition {
    /// Geodetic latitude in degrees, north positive
    pub latitude_deg: f64,
    /// Longitude in degrees, east positive
    pub longitude_deg: f64,
    /// Elevation above sea level in meters
    pub elevation_m: f64,
}

impl Default for ObserverPosition {
    fn default() -> Self {
        Self {
            latitude_deg: 51.4769,
            longitude_deg: 0.0,
            elevation_m: 46.0,
        }
    }
}

/// Horizontal coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HorizontalCoords {
    /// Azimuth measured from north through east, `[0, 360)`
    pub azimuth_deg: f64,
    /// Altitude above the horizon, `[-90, 90]`
    pub altitude_deg: f64,
}

/// Julian date for a UTC instant.
pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + seconds / 86_400.0
}

/// Greenwich mean sidereal time in hours.
pub fn greenwich_sidereal_time(jd: f64) -> f64 {
    let d = jd - J2000_JD;
    let t = d / 36_525.0;
    let degrees = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    range_360(degrees) / 15.0
}

/// Local sidereal time in hours for an east-positive longitude.
pub fn local_sidereal_time(jd: f64, longitude_deg: f64) -> f64 {
    range_24(greenwich_sidereal_time(jd) + longitude_deg / 15.0)
}

/// Convert hour angle (hours, west positive) and declination to altitude/azimuth.
pub fn equatorial_to_horizontal(
    hour_angle: f64,
    declination_deg: f64,
    latitude_deg: f64,
) -> HorizontalCoords {
    let ha = (hour_angle * 15.0).to_radians();
    let dec = declination_deg.to_radians();
    let lat = latitude_deg.to_radians();

    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
    let altitude = sin_alt.clamp(-1.0, 1.0).asin();

    let y = -ha.sin() * dec.cos();
    let x = dec.sin() * lat.cos() - dec.cos() * lat.sin() * ha.cos();
    let azimuth = y.atan2(x);

    HorizontalCoords {
        azimuth_deg: range_360(azimuth.to_degrees()),
        altitude_deg: altitude.to_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_julian_date_epochs() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert_relative_eq!(julian_date(j2000), J2000_JD, epsilon = 1e-9);
        let unix = Utc.timestamp_opt(0, 0).unwrap();
        assert_relative_eq!(julian_date(unix), UNIX_EPOCH_JD);
    }

    #[test]
    fn test_gmst_reference_value() {
        // Meeus example 12.a: 1987 April 10, 0h UT -> GMST 13h10m46.3668s
        let time = Utc.with_ymd_and_hms(1987, 4, 10, 0, 0, 0).unwrap();
        let gmst = greenwich_sidereal_time(julian_date(time));
        assert_relative_eq!(gmst, 13.0 + 10.0 / 60.0 + 46.3668 / 3600.0, epsilon = 1e-5);
    }

    #[test]
    fn test_lst_longitude_offset() {
        let jd = 2_460_000.25;
        let gmst = greenwich_sidereal_time(jd);
        assert_relative_eq!(local_sidereal_time(jd, 30.0), range_24(gmst + 2.0), epsilon = 1e-12);
        assert_relative_eq!(local_sidereal_time(jd, -75.0), range_24(gmst - 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_meridian_transit_altitude() {
        // On the meridian, altitude = 90 - |lat - dec| and azimuth points south.
        let hz = equatorial_to_horizontal(0.0, 20.0, 50.0);
        assert_relative_eq!(hz.altitude_deg, 60.0, epsilon = 1e-9);
        assert_relative_eq!(hz.azimuth_deg, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pole_altitude_equals_latitude() {
        let hz = equatorial_to_horizontal(5.0, 90.0, 42.0);
        assert_relative_eq!(hz.altitude_deg, 42.0, epsilon = 1e-9);
    }

    #[test]
    fn test_east_rising() {
        // Negative hour angle on the equator is in the eastern sky.
        let hz = equatorial_to_horizontal(-6.0, 0.0, 40.0);
        assert_relative_eq!(hz.altitude_deg, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hz.azimuth_deg, 90.0, epsilon = 1e-9);
    }
}
