//! Per-slot flight suitability checks and risk scoring.

use crate::models::{Criteria, WeatherSlot};

/// Check whether a slot satisfies all suitability thresholds.
///
/// Unknown (`None`) values never block: a missing reading is treated as safe
/// so incomplete provider data cannot produce false negatives.
pub fn slot_is_flyable(slot: &WeatherSlot, criteria: &Criteria) -> bool {
    let wind_ok = slot.wind.map_or(true, |w| w <= criteria.max_wind);

    // If gusts are unknown, checking sustained wind against the gust limit is
    // the best available proxy.
    let gust_ok = match slot.gust.or(slot.wind) {
        Some(g) => g <= criteria.max_gust,
        None => true,
    };

    let clouds_ok = slot
        .clouds
        .map_or(true, |c| c >= criteria.min_cloud_cover && c <= criteria.max_cloud_cover);

    let rain_ok = slot.rain_prob.map_or(true, |p| p <= criteria.max_rain_prob);

    let sun_ok = criteria.include_night_flights
        || slot.sun_alt.map_or(true, |alt| {
            alt >= criteria.min_sun_altitude && alt <= criteria.max_sun_altitude
        });

    wind_ok && gust_ok && clouds_ok && rain_ok && sun_ok
}

/// Continuous risk score for a slot.
///
/// Mean of the wind, gust, rain and sun components. The divisor is always 4,
/// even when a component is structurally zero (night flights allowed, unknown
/// readings): disabling a component dilutes the score rather than
/// renormalizing it. The result is non-negative but has no upper bound.
pub fn slot_risk(slot: &WeatherSlot, criteria: &Criteria) -> f64 {
    let wind_risk = slot
        .wind
        .map_or(0.0, |w| excess_ratio(w, criteria.max_wind, criteria.max_wind.max(1.0)));

    let gust_risk = slot
        .gust
        .or(slot.wind)
        .map_or(0.0, |g| excess_ratio(g, criteria.max_gust, criteria.max_gust.max(1.0)));

    let rain_risk = slot.rain_prob.map_or(0.0, |p| {
        excess_ratio(p, criteria.max_rain_prob, (100.0 - criteria.max_rain_prob).max(1.0))
    });

    let sun_risk = if criteria.include_night_flights {
        0.0
    } else {
        match slot.sun_alt {
            Some(alt) if alt < criteria.min_sun_altitude || alt > criteria.max_sun_altitude => 1.0,
            _ => 0.0,
        }
    };

    (wind_risk + gust_risk + rain_risk + sun_risk) / 4.0
}

fn excess_ratio(value: f64, limit: f64, scale: f64) -> f64 {
    ((value - limit) / scale).max(0.0)
}
