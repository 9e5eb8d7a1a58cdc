//! Core data models for flight weather tracking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel fingerprint for future-dated rules whose target date has not yet
/// entered the provider's forecast horizon.
pub const AWAITING_FORECAST: &str = "__awaiting_forecast__";

/// One hourly forecast sample, enriched with derived sun altitude.
///
/// `None` means "unknown" and is non-blocking everywhere: a missing value
/// never makes a slot unflyable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSlot {
    /// ISO-8601 timestamp at hour granularity, unique within a rule's window.
    pub time: String,
    /// Wind speed in km/h.
    pub wind: Option<f64>,
    /// Wind gust speed in km/h.
    pub gust: Option<f64>,
    /// Cloud cover percentage (0-100).
    pub clouds: Option<f64>,
    /// Precipitation probability percentage (0-100).
    pub rain_prob: Option<f64>,
    /// Sun altitude in degrees above the horizon.
    pub sun_alt: Option<f64>,
}

/// Flight suitability thresholds.
///
/// Always normalized: every numeric field is finite, and construction from
/// arbitrary JSON never fails (missing or invalid fields fall back to
/// defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    pub max_wind: f64,
    pub max_gust: f64,
    pub min_cloud_cover: f64,
    pub max_cloud_cover: f64,
    pub max_rain_prob: f64,
    pub min_sun_altitude: f64,
    pub max_sun_altitude: f64,
    pub include_night_flights: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            max_wind: 20.0,
            max_gust: 30.0,
            min_cloud_cover: 0.0,
            max_cloud_cover: 100.0,
            max_rain_prob: 20.0,
            min_sun_altitude: 0.0,
            max_sun_altitude: 90.0,
            include_night_flights: false,
        }
    }
}

impl Criteria {
    /// Build criteria from an arbitrary JSON blob.
    ///
    /// Never fails: any missing, non-numeric or non-finite field takes its
    /// default value.
    pub fn from_json(value: &Value) -> Self {
        let defaults = Self::default();
        Self {
            max_wind: finite_or(value, "maxWind", defaults.max_wind),
            max_gust: finite_or(value, "maxGust", defaults.max_gust),
            min_cloud_cover: finite_or(value, "minCloudCover", defaults.min_cloud_cover),
            max_cloud_cover: finite_or(value, "maxCloudCover", defaults.max_cloud_cover),
            max_rain_prob: finite_or(value, "maxRainProb", defaults.max_rain_prob),
            min_sun_altitude: finite_or(value, "minSunAltitude", defaults.min_sun_altitude),
            max_sun_altitude: finite_or(value, "maxSunAltitude", defaults.max_sun_altitude),
            include_night_flights: value
                .get("includeNightFlights")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.include_night_flights),
        }
    }
}

fn finite_or(value: &Value, key: &str, default: f64) -> f64 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Whether a rule tracks a date already inside the forecast horizon
/// (`Standard`) or one still beyond it (`Future`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    #[default]
    Standard,
    Future,
}

/// Presentation metadata stored alongside the thresholds in the same JSON
/// blob, parsed loosely (unknown fields ignored, missing fields defaulted).
/// Criteria and metadata are only recombined at the storage boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub location_name: Option<String>,
    pub rule_type: RuleType,
    pub app_base_path: Option<String>,
}

impl RuleMetadata {
    /// Build metadata from the combined JSON blob. Never fails.
    pub fn from_json(value: &Value) -> Self {
        Self {
            location_name: value
                .get("locationName")
                .and_then(Value::as_str)
                .map(str::to_string),
            rule_type: match value.get("ruleType").and_then(Value::as_str) {
                Some("future") => RuleType::Future,
                _ => RuleType::Standard,
            },
            app_base_path: value
                .get("appBasePath")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// Recombine criteria and metadata into the single JSON blob stored in the
/// rule row's criteria column.
pub fn criteria_blob(criteria: &Criteria, metadata: &RuleMetadata) -> Value {
    let mut blob = serde_json::to_value(criteria).unwrap_or_else(|_| Value::Null);
    if let Value::Object(map) = &mut blob {
        if let Some(name) = &metadata.location_name {
            map.insert("locationName".into(), Value::String(name.clone()));
        }
        map.insert(
            "ruleType".into(),
            Value::String(
                match metadata.rule_type {
                    RuleType::Future => "future",
                    RuleType::Standard => "standard",
                }
                .into(),
            ),
        );
        if let Some(path) = &metadata.app_base_path {
            map.insert("appBasePath".into(), Value::String(path.clone()));
        }
    }
    blob
}

/// When a rule's owner wants to be notified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Notify only when the flyable pattern fingerprint changes.
    #[default]
    StatusChange,
    /// Notify on every evaluated pass.
    Always,
    /// Never notify; the rule is skipped entirely.
    Disabled,
}

impl NotifyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyPolicy::StatusChange => "status_change",
            NotifyPolicy::Always => "always",
            NotifyPolicy::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "always" => NotifyPolicy::Always,
            "disabled" => NotifyPolicy::Disabled,
            _ => NotifyPolicy::StatusChange,
        }
    }
}

/// Overall suitability status for a rule's tracked window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// No relevant slot is flyable.
    NoFly,
    /// Every relevant slot is flyable.
    Fly,
    /// Some but not all relevant slots are flyable.
    Risk,
    /// The forecast fetch failed this pass.
    NoData,
    /// Future-dated rule whose target is still beyond the forecast horizon.
    AwaitingForecast,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoFly => "no-fly",
            Status::Fly => "fly",
            Status::Risk => "risk",
            Status::NoData => "no-data",
            Status::AwaitingForecast => "awaiting-forecast",
        }
    }
}

/// Last computed summary for a rule, persisted on the rule row and carried
/// forward so the next pass can report the previous flyable count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSummary {
    pub status: Status,
    pub percent: u8,
    pub flyable_count: u32,
    pub total_count: u32,
    #[serde(default)]
    pub prev_flyable_count: Option<u32>,
}

/// A persistent tracking directive tying a location/date window to a push
/// subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub subscription_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hour_from: u8,
    pub hour_to: u8,
    pub criteria: Criteria,
    pub metadata: RuleMetadata,
    pub notify_on: NotifyPolicy,
    pub expires_at: DateTime<Utc>,
    pub last_state_hash: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub weather_summary: Option<WeatherSummary>,
}

impl Rule {
    /// Rules expire at the end of their last tracked day.
    pub fn expiry_for(end_date: NaiveDate) -> DateTime<Utc> {
        end_date
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now)
    }
}

/// Outbound notification payload handed to the push sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Stable per-rule tag so the OS notification system replaces rather than
    /// stacks successive notifications.
    pub tag: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn criteria_from_empty_json_is_default() {
        assert_eq!(Criteria::from_json(&json!({})), Criteria::default());
        assert_eq!(Criteria::from_json(&Value::Null), Criteria::default());
    }

    #[test]
    fn criteria_ignores_invalid_fields() {
        let blob = json!({
            "maxWind": "fast",
            "maxGust": f64::NAN,
            "maxRainProb": 35,
            "includeNightFlights": true,
        });
        let criteria = Criteria::from_json(&blob);
        assert_eq!(criteria.max_wind, Criteria::default().max_wind);
        assert_eq!(criteria.max_gust, Criteria::default().max_gust);
        assert_eq!(criteria.max_rain_prob, 35.0);
        assert!(criteria.include_night_flights);
    }

    #[test]
    fn metadata_roundtrips_through_blob() {
        let metadata = RuleMetadata {
            location_name: Some("Lausanne".into()),
            rule_type: RuleType::Future,
            app_base_path: Some("/app".into()),
        };
        let blob = criteria_blob(&Criteria::default(), &metadata);
        assert_eq!(RuleMetadata::from_json(&blob), metadata);
        assert_eq!(Criteria::from_json(&blob), Criteria::default());
    }

    #[test]
    fn notify_policy_wire_strings() {
        for policy in [
            NotifyPolicy::StatusChange,
            NotifyPolicy::Always,
            NotifyPolicy::Disabled,
        ] {
            assert_eq!(NotifyPolicy::from_str(policy.as_str()), policy);
        }
        assert_eq!(NotifyPolicy::from_str("garbage"), NotifyPolicy::StatusChange);
    }
}
