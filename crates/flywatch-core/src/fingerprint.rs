//! Flyable-pattern fingerprinting and window summarization.

use sha2::{Digest, Sha256};

use crate::models::{Criteria, Status, WeatherSlot};
use crate::suitability::slot_is_flyable;

/// Whether a slot counts toward the suitability percentage and fingerprint.
///
/// Mirrors the night-hour exclusion: hours whose sun altitude falls outside
/// the allowed band are invisible to the summary unless night flights are
/// included. Unknown sun altitude always counts.
pub fn slot_is_relevant(slot: &WeatherSlot, criteria: &Criteria) -> bool {
    criteria.include_night_flights
        || slot.sun_alt.map_or(true, |alt| {
            alt >= criteria.min_sun_altitude && alt <= criteria.max_sun_altitude
        })
}

/// Stable fingerprint of the ordered `(time, flyable)` pattern.
///
/// Raw weather values are deliberately excluded: the hash changes only when
/// at least one hour flips between flyable and not, so sub-threshold drift
/// never triggers a notification.
pub fn state_fingerprint(pattern: &[(String, bool)]) -> String {
    let mut hasher = Sha256::new();
    for (time, flyable) in pattern {
        hasher.update(time.as_bytes());
        hasher.update(if *flyable { b":1;" } else { b":0;" });
    }
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Evaluation of one rule's slots: the relevant flyable pattern plus the
/// aggregate numbers the summary and decision logic need.
#[derive(Debug, Clone)]
pub struct SlotEvaluation {
    /// Ordered `(time, flyable)` pairs for relevant slots only.
    pub pattern: Vec<(String, bool)>,
    pub flyable_count: u32,
    pub total_count: u32,
    pub percent: u8,
    pub status: Status,
    /// Hours (0-23) of the earliest and latest flyable relevant slots.
    pub flyable_hour_range: Option<(u32, u32)>,
}

impl SlotEvaluation {
    /// Evaluate all slots against the criteria, keeping only relevant ones.
    pub fn compute(slots: &[WeatherSlot], criteria: &Criteria) -> Self {
        let mut pattern = Vec::new();
        let mut flyable_count = 0u32;
        let mut flyable_hour_range: Option<(u32, u32)> = None;

        for slot in slots {
            if !slot_is_relevant(slot, criteria) {
                continue;
            }
            let flyable = slot_is_flyable(slot, criteria);
            if flyable {
                flyable_count += 1;
                if let Some(hour) = slot_hour(&slot.time) {
                    flyable_hour_range = Some(match flyable_hour_range {
                        Some((lo, hi)) => (lo.min(hour), hi.max(hour)),
                        None => (hour, hour),
                    });
                }
            }
            pattern.push((slot.time.clone(), flyable));
        }

        let total_count = pattern.len() as u32;
        let percent = if total_count == 0 {
            0
        } else {
            (100.0 * flyable_count as f64 / total_count as f64).round() as u8
        };
        let status = if flyable_count == 0 {
            Status::NoFly
        } else if flyable_count == total_count {
            Status::Fly
        } else {
            Status::Risk
        };

        Self {
            pattern,
            flyable_count,
            total_count,
            percent,
            status,
            flyable_hour_range,
        }
    }

    pub fn fingerprint(&self) -> String {
        state_fingerprint(&self.pattern)
    }
}

/// Hour component of an hour-granularity ISO timestamp such as
/// `2026-02-16T09:00`.
fn slot_hour(time: &str) -> Option<u32> {
    let (_, rest) = time.split_once('T')?;
    rest.get(0..2)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(time: &str, wind: Option<f64>, sun_alt: Option<f64>) -> WeatherSlot {
        WeatherSlot {
            time: time.into(),
            wind,
            gust: None,
            clouds: None,
            rain_prob: None,
            sun_alt,
        }
    }

    #[test]
    fn fingerprint_ignores_raw_weather_values() {
        let criteria = Criteria::default();
        let calm = vec![
            slot("2026-02-16T09:00", Some(5.0), Some(20.0)),
            slot("2026-02-16T10:00", Some(12.0), Some(25.0)),
        ];
        let breezier = vec![
            slot("2026-02-16T09:00", Some(15.0), Some(20.0)),
            slot("2026-02-16T10:00", Some(19.0), Some(25.0)),
        ];
        let a = SlotEvaluation::compute(&calm, &criteria).fingerprint();
        let b = SlotEvaluation::compute(&breezier, &criteria).fingerprint();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_when_one_slot_flips() {
        let criteria = Criteria::default();
        let before = vec![
            slot("2026-02-16T09:00", Some(5.0), Some(20.0)),
            slot("2026-02-16T10:00", Some(5.0), Some(25.0)),
        ];
        // Second hour crosses the wind threshold.
        let after = vec![
            slot("2026-02-16T09:00", Some(5.0), Some(20.0)),
            slot("2026-02-16T10:00", Some(30.0), Some(25.0)),
        ];
        let a = SlotEvaluation::compute(&before, &criteria).fingerprint();
        let b = SlotEvaluation::compute(&after, &criteria).fingerprint();
        assert_ne!(a, b);
    }

    #[test]
    fn night_slots_are_excluded_from_summary() {
        let criteria = Criteria::default();
        let slots = vec![
            slot("2026-02-16T06:00", Some(5.0), Some(-10.0)),
            slot("2026-02-16T09:00", Some(5.0), Some(15.0)),
            slot("2026-02-16T10:00", Some(30.0), Some(20.0)),
        ];
        let eval = SlotEvaluation::compute(&slots, &criteria);
        assert_eq!(eval.total_count, 2);
        assert_eq!(eval.flyable_count, 1);
        assert_eq!(eval.percent, 50);
        assert_eq!(eval.status, Status::Risk);
    }

    #[test]
    fn night_slots_count_when_night_flights_allowed() {
        let criteria = Criteria {
            include_night_flights: true,
            ..Criteria::default()
        };
        let slots = vec![
            slot("2026-02-16T06:00", Some(5.0), Some(-10.0)),
            slot("2026-02-16T09:00", Some(5.0), Some(15.0)),
        ];
        let eval = SlotEvaluation::compute(&slots, &criteria);
        assert_eq!(eval.total_count, 2);
        assert_eq!(eval.status, Status::Fly);
        assert_eq!(eval.percent, 100);
    }

    #[test]
    fn empty_window_has_zero_percent_no_fly() {
        let eval = SlotEvaluation::compute(&[], &Criteria::default());
        assert_eq!(eval.percent, 0);
        assert_eq!(eval.total_count, 0);
        assert_eq!(eval.status, Status::NoFly);
        assert!(eval.flyable_hour_range.is_none());
    }

    #[test]
    fn flyable_hour_range_spans_earliest_to_latest() {
        let criteria = Criteria::default();
        let slots = vec![
            slot("2026-02-16T08:00", Some(30.0), Some(10.0)),
            slot("2026-02-16T09:00", Some(5.0), Some(15.0)),
            slot("2026-02-16T12:00", Some(5.0), Some(30.0)),
            slot("2026-02-16T15:00", Some(5.0), Some(10.0)),
            slot("2026-02-16T16:00", Some(30.0), Some(5.0)),
        ];
        let eval = SlotEvaluation::compute(&slots, &criteria);
        assert_eq!(eval.flyable_hour_range, Some((9, 15)));
    }
}
