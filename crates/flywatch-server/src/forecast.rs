//! Hourly forecast retrieval and slot normalization.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use flywatch_core::models::{Rule, WeatherSlot};
use flywatch_core::solar::sun_altitude_deg;

/// Exact forecast query parameters. Two rules sharing a key share one fetch
/// per pass. Coordinates are keyed at 1e-4 degree resolution (about 10 m).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchKey {
    lat_e4: i64,
    lon_e4: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hour_from: u8,
    pub hour_to: u8,
}

impl FetchKey {
    pub fn new(
        lat: f64,
        lon: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
        hour_from: u8,
        hour_to: u8,
    ) -> Self {
        Self {
            lat_e4: (lat * 1e4).round() as i64,
            lon_e4: (lon * 1e4).round() as i64,
            start_date,
            end_date,
            hour_from,
            hour_to,
        }
    }

    pub fn for_rule(rule: &Rule) -> Self {
        Self::new(
            rule.lat,
            rule.lon,
            rule.start_date,
            rule.end_date,
            rule.hour_from,
            rule.hour_to,
        )
    }

    pub fn lat(&self) -> f64 {
        self.lat_e4 as f64 / 1e4
    }

    pub fn lon(&self) -> f64 {
        self.lon_e4 as f64 / 1e4
    }
}

/// Seam between the orchestrator and the forecast provider, so passes can be
/// tested against a scripted provider.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch_slots(&self, key: &FetchKey) -> Result<Vec<WeatherSlot>>;
}

/// HTTP client for an Open-Meteo-style hourly forecast API.
pub struct ForecastClient {
    client: Client,
    base_url: String,
    model: String,
}

const HOURLY_FIELDS: &str = "wind_speed_10m,wind_gusts_10m,cloud_cover,precipitation_probability";

impl ForecastClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ForecastProvider for ForecastClient {
    async fn fetch_slots(&self, key: &FetchKey) -> Result<Vec<WeatherSlot>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", key.lat().to_string()),
                ("longitude", key.lon().to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("start_date", key.start_date.format("%Y-%m-%d").to_string()),
                ("end_date", key.end_date.format("%Y-%m-%d").to_string()),
                ("timezone", "UTC".to_string()),
                ("wind_speed_unit", "kmh".to_string()),
                ("models", self.model.clone()),
            ])
            .send()
            .await
            .context("Forecast request failed")?
            .error_for_status()
            .context("Forecast provider returned an error status")?;

        let body: ForecastResponse = response
            .json()
            .await
            .context("Failed to parse forecast response")?;

        Ok(build_slots(&body.hourly, key))
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlyBlock,
}

/// Parallel arrays keyed by field name, as the provider returns them.
#[derive(Debug, Default, Deserialize)]
pub struct HourlyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_gusts_10m: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
}

/// Normalize the provider's parallel arrays into slots.
///
/// Hours outside the rule's window are dropped, and any row whose timestamp
/// fails to parse is silently skipped: malformed provider data must never
/// take down the pipeline.
pub fn build_slots(hourly: &HourlyBlock, key: &FetchKey) -> Vec<WeatherSlot> {
    let mut slots = Vec::new();

    for (i, time) in hourly.time.iter().enumerate() {
        let Some(parsed) = parse_slot_time(time) else {
            tracing::debug!("Skipping unparseable forecast timestamp: {}", time);
            continue;
        };

        let hour = parsed.format("%H").to_string().parse::<u8>().unwrap_or(0);
        if hour < key.hour_from || hour > key.hour_to {
            continue;
        }

        let sun_alt = sun_altitude_deg(key.lat(), key.lon(), parsed.and_utc());
        slots.push(WeatherSlot {
            time: time.clone(),
            wind: field_at(&hourly.wind_speed_10m, i),
            gust: field_at(&hourly.wind_gusts_10m, i),
            clouds: field_at(&hourly.cloud_cover, i),
            rain_prob: field_at(&hourly.precipitation_probability, i),
            sun_alt: Some(sun_alt).filter(|v| v.is_finite()),
        });
    }

    slots
}

fn field_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten().filter(|v| v.is_finite())
}

fn parse_slot_time(time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FetchKey {
        FetchKey::new(
            46.5,
            6.6,
            "2026-02-16".parse().unwrap(),
            "2026-02-16".parse().unwrap(),
            9,
            12,
        )
    }

    fn hourly(times: Vec<&str>) -> HourlyBlock {
        let n = times.len();
        HourlyBlock {
            time: times.into_iter().map(str::to_string).collect(),
            wind_speed_10m: vec![Some(10.0); n],
            wind_gusts_10m: vec![Some(15.0); n],
            cloud_cover: vec![Some(40.0); n],
            precipitation_probability: vec![Some(5.0); n],
        }
    }

    #[test]
    fn hours_outside_window_are_dropped() {
        let block = hourly(vec![
            "2026-02-16T08:00",
            "2026-02-16T09:00",
            "2026-02-16T12:00",
            "2026-02-16T13:00",
        ]);
        let slots = build_slots(&block, &key());
        let times: Vec<&str> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["2026-02-16T09:00", "2026-02-16T12:00"]);
    }

    #[test]
    fn malformed_timestamps_are_skipped_not_fatal() {
        let block = hourly(vec!["not-a-date", "2026-02-16T10:00", ""]);
        let slots = build_slots(&block, &key());
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].time, "2026-02-16T10:00");
    }

    #[test]
    fn missing_field_arrays_become_unknowns() {
        let block = HourlyBlock {
            time: vec!["2026-02-16T10:00".into()],
            ..HourlyBlock::default()
        };
        let slots = build_slots(&block, &key());
        assert_eq!(slots.len(), 1);
        assert!(slots[0].wind.is_none());
        assert!(slots[0].gust.is_none());
        assert!(slots[0].clouds.is_none());
        assert!(slots[0].rain_prob.is_none());
        // Sun altitude is always derivable from the key and timestamp.
        assert!(slots[0].sun_alt.is_some());
    }

    #[test]
    fn fetch_key_dedupes_equal_queries() {
        let a = FetchKey::new(46.50001, 6.6, "2026-02-16".parse().unwrap(), "2026-02-17".parse().unwrap(), 9, 17);
        let b = FetchKey::new(46.50002, 6.6, "2026-02-16".parse().unwrap(), "2026-02-17".parse().unwrap(), 9, 17);
        let c = FetchKey::new(46.6, 6.6, "2026-02-16".parse().unwrap(), "2026-02-17".parse().unwrap(), 9, 17);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
