//! Solar position math for night-hour filtering.

use chrono::{DateTime, Utc};

/// Sun altitude in degrees above the horizon for a coordinate and instant.
///
/// Low-precision NOAA-style approximation (good to a fraction of a degree),
/// which is plenty for deciding whether an hour counts as daylight.
pub fn sun_altitude_deg(lat: f64, lon: f64, time: DateTime<Utc>) -> f64 {
    // Days since J2000.0 epoch.
    let julian_day = time.timestamp() as f64 / 86_400.0 + 2_440_587.5;
    let d = julian_day - 2_451_545.0;

    // Mean anomaly and mean longitude of the sun (degrees).
    let g = (357.529 + 0.985_600_28 * d).rem_euclid(360.0).to_radians();
    let q = (280.459 + 0.985_647_36 * d).rem_euclid(360.0);

    // Ecliptic longitude with equation-of-center correction.
    let l = (q + 1.915 * g.sin() + 0.020 * (2.0 * g).sin())
        .rem_euclid(360.0)
        .to_radians();

    // Obliquity of the ecliptic.
    let e = (23.439 - 0.000_000_36 * d).to_radians();

    let right_ascension = (e.cos() * l.sin()).atan2(l.cos());
    let declination = (e.sin() * l.sin()).asin();

    // Greenwich mean sidereal time, then local hour angle.
    let gmst = (280.460_618_37 + 360.985_647_366_29 * d).rem_euclid(360.0);
    let local_sidereal = (gmst + lon).to_radians();
    let hour_angle = local_sidereal - right_ascension;

    let lat_rad = lat.to_radians();
    let altitude = (lat_rad.sin() * declination.sin()
        + lat_rad.cos() * declination.cos() * hour_angle.cos())
    .asin();

    altitude.to_degrees()
}
