//! Tracking rule persistence operations.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::SqlitePool;

use flywatch_core::models::{
    Criteria, NotifyPolicy, Rule, RuleMetadata, WeatherSummary,
};

/// Push keys joined onto a rule row. `disabled` rules are skipped, not
/// deleted, so a re-enabled subscription picks its rules back up.
#[derive(Debug, Clone)]
pub struct SubscriptionKeys {
    pub id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub disabled: bool,
}

/// A rule with its owning subscription's keys, as loaded for one pass.
#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub rule: Rule,
    pub subscription: Option<SubscriptionKeys>,
}

/// Per-rule state written back after evaluation.
#[derive(Debug, Clone)]
pub struct RuleUpdate {
    pub rule_id: i64,
    pub last_state_hash: String,
    pub last_checked_at: DateTime<Utc>,
    pub weather_summary: WeatherSummary,
    /// Present only on the forecast-entering transition, carrying the flipped
    /// rule type.
    pub criteria_blob: Option<Value>,
}

/// Fields for creating or replacing a rule at its natural key.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub subscription_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hour_from: u8,
    pub hour_to: u8,
    pub criteria_blob: Value,
    pub notify_on: NotifyPolicy,
    pub last_state_hash: Option<String>,
}

/// Load all unexpired rules joined with their subscription keys.
pub async fn load_active_rules(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<ActiveRule>> {
    let rows = sqlx::query_as::<_, RuleRow>(
        r#"
        SELECT r.id, r.subscription_id, r.lat, r.lon,
               r.start_date, r.end_date, r.hour_from, r.hour_to,
               r.criteria, r.notify_on, r.expires_at,
               r.last_state_hash, r.last_checked_at, r.weather_summary,
               s.endpoint, s.p256dh, s.auth, s.disabled_at
        FROM weather_rules r
        LEFT JOIN push_subscriptions s ON s.id = r.subscription_id
        WHERE r.expires_at > ?1
        "#,
    )
    .bind(now.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Delete all rules whose expiry has passed. Returns the number removed.
pub async fn delete_expired_rules(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM weather_rules WHERE expires_at < ?1")
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Write a rule's post-evaluation state. Id-scoped, so concurrent updates to
/// different rules never contend.
pub async fn apply_rule_update(pool: &SqlitePool, update: &RuleUpdate) -> Result<()> {
    let summary_json = serde_json::to_string(&update.weather_summary)?;
    match &update.criteria_blob {
        Some(blob) => {
            sqlx::query(
                r#"
                UPDATE weather_rules
                SET last_state_hash = ?2, last_checked_at = ?3,
                    weather_summary = ?4, criteria = ?5
                WHERE id = ?1
                "#,
            )
            .bind(update.rule_id)
            .bind(&update.last_state_hash)
            .bind(update.last_checked_at.to_rfc3339())
            .bind(&summary_json)
            .bind(serde_json::to_string(blob)?)
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE weather_rules
                SET last_state_hash = ?2, last_checked_at = ?3, weather_summary = ?4
                WHERE id = ?1
                "#,
            )
            .bind(update.rule_id)
            .bind(&update.last_state_hash)
            .bind(update.last_checked_at.to_rfc3339())
            .bind(&summary_json)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Upsert a rule at its composite natural key. Criteria edits and policy
/// changes arrive as re-upserts; evaluation state is reset by them.
pub async fn upsert_rule(pool: &SqlitePool, rule: &NewRule) -> Result<i64> {
    let expires_at = Rule::expiry_for(rule.end_date);
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO weather_rules (
            subscription_id, lat, lon, start_date, end_date,
            hour_from, hour_to, criteria, notify_on, expires_at,
            last_state_hash, created_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(subscription_id, lat, lon, start_date, end_date, hour_from, hour_to)
        DO UPDATE SET
            criteria = ?8, notify_on = ?9, expires_at = ?10,
            last_state_hash = ?11, last_checked_at = NULL, weather_summary = NULL
        RETURNING id
        "#,
    )
    .bind(rule.subscription_id)
    .bind(rule.lat)
    .bind(rule.lon)
    .bind(rule.start_date.format("%Y-%m-%d").to_string())
    .bind(rule.end_date.format("%Y-%m-%d").to_string())
    .bind(rule.hour_from as i64)
    .bind(rule.hour_to as i64)
    .bind(serde_json::to_string(&rule.criteria_blob)?)
    .bind(rule.notify_on.as_str())
    .bind(expires_at.to_rfc3339())
    .bind(&rule.last_state_hash)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Delete a rule by id.
pub async fn delete_rule(pool: &SqlitePool, rule_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM weather_rules WHERE id = ?1")
        .bind(rule_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct RuleRow {
    id: i64,
    subscription_id: i64,
    lat: f64,
    lon: f64,
    start_date: String,
    end_date: String,
    hour_from: i64,
    hour_to: i64,
    criteria: String,
    notify_on: String,
    expires_at: String,
    last_state_hash: Option<String>,
    last_checked_at: Option<String>,
    weather_summary: Option<String>,
    endpoint: Option<String>,
    p256dh: Option<String>,
    auth: Option<String>,
    disabled_at: Option<String>,
}

impl TryFrom<RuleRow> for ActiveRule {
    type Error = anyhow::Error;

    fn try_from(row: RuleRow) -> Result<Self> {
        let blob: Value = serde_json::from_str(&row.criteria).unwrap_or(Value::Null);
        let criteria = Criteria::from_json(&blob);
        let metadata = RuleMetadata::from_json(&blob);

        let start_date: NaiveDate = row.start_date.parse()?;
        let end_date: NaiveDate = row.end_date.parse()?;

        let expires_at = DateTime::parse_from_rfc3339(&row.expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Rule::expiry_for(end_date));

        let last_checked_at = row
            .last_checked_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let weather_summary: Option<WeatherSummary> = row
            .weather_summary
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok());

        let subscription = match (row.endpoint, row.p256dh, row.auth) {
            (Some(endpoint), Some(p256dh), Some(auth)) => Some(SubscriptionKeys {
                id: row.subscription_id,
                endpoint,
                p256dh,
                auth,
                disabled: row.disabled_at.is_some(),
            }),
            _ => None,
        };

        Ok(ActiveRule {
            rule: Rule {
                id: row.id,
                subscription_id: row.subscription_id,
                lat: row.lat,
                lon: row.lon,
                start_date,
                end_date,
                hour_from: row.hour_from.clamp(0, 23) as u8,
                hour_to: row.hour_to.clamp(0, 23) as u8,
                criteria,
                metadata,
                notify_on: NotifyPolicy::from_str(&row.notify_on),
                expires_at,
                last_state_hash: row.last_state_hash,
                last_checked_at,
                weather_summary,
            },
            subscription,
        })
    }
}
