//! Notification content: per-status templates, deep links and labels.

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::{NotificationPayload, RuleMetadata, Status, WeatherSummary};

/// Normalize a client-supplied app base path.
///
/// Only absolute paths are accepted; anything else (relative paths,
/// non-string JSON, empty input) collapses to `""`. Trailing slashes are
/// stripped so the result composes cleanly with `"/..."` suffixes. The
/// function is idempotent.
pub fn normalize_base_path(value: &Value) -> String {
    let Some(path) = value.as_str() else {
        return String::new();
    };
    let path = path.trim();
    if !path.starts_with('/') {
        return String::new();
    }
    path.trim_end_matches('/').to_string()
}

/// Human-readable label for the tracked start date, e.g. `Mon, Feb 16`.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%a, %b %-d").to_string()
}

/// `"09:00-15:00"` for a flyable hour range.
fn hour_range_label(range: (u32, u32)) -> String {
    format!("{:02}:00-{:02}:00", range.0, range.1)
}

/// Build the push payload for an evaluated rule.
///
/// Title and body are selected by status, with dedicated variants for the
/// first pass after a future-dated rule enters the forecast horizon. Fly and
/// risk bodies carry the earliest-to-latest flyable hour range.
pub fn build_notification(
    rule_id: i64,
    start_date: NaiveDate,
    metadata: &RuleMetadata,
    summary: &WeatherSummary,
    flyable_hour_range: Option<(u32, u32)>,
    entering_forecast: bool,
    icon: Option<&str>,
) -> NotificationPayload {
    let date = date_label(start_date);
    let place = metadata
        .location_name
        .clone()
        .unwrap_or_else(|| "your location".to_string());
    let range = flyable_hour_range.map(hour_range_label);

    let (title, body) = if entering_forecast {
        match summary.status {
            Status::Fly => (
                format!("Forecast in: {date} looks flyable"),
                match &range {
                    Some(r) => format!("{place} is now in forecast range. All tracked hours look flyable ({r})."),
                    None => format!("{place} is now in forecast range and looks flyable."),
                },
            ),
            _ => (
                format!("Forecast in for {date}"),
                format!(
                    "{place} is now in forecast range: {}% of tracked hours look flyable.",
                    summary.percent
                ),
            ),
        }
    } else {
        match summary.status {
            Status::Fly => (
                format!("Clear to fly on {date}"),
                match &range {
                    Some(r) => format!("All tracked hours at {place} look flyable ({r})."),
                    None => format!("All tracked hours at {place} look flyable."),
                },
            ),
            Status::Risk => (
                format!("Mixed conditions on {date}"),
                match &range {
                    Some(r) => format!(
                        "{}% of tracked hours at {place} look flyable ({r}).",
                        summary.percent
                    ),
                    None => format!(
                        "{}% of tracked hours at {place} look flyable.",
                        summary.percent
                    ),
                },
            ),
            Status::NoFly => (
                format!("No-fly conditions on {date}"),
                format!("No tracked hour at {place} meets your flight criteria."),
            ),
            Status::NoData | Status::AwaitingForecast => (
                format!("Forecast unavailable for {date}"),
                format!("Could not retrieve weather data for {place}. Will retry later."),
            ),
        }
    };

    let base = normalize_base_path(&Value::String(
        metadata.app_base_path.clone().unwrap_or_default(),
    ));

    NotificationPayload {
        title,
        body,
        tag: format!("flywatch-rule-{rule_id}"),
        url: format!("{base}/?date={}", start_date.format("%Y-%m-%d")),
        icon: icon.map(str::to_string),
    }
}
