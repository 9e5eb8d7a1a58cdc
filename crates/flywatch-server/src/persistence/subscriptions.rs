//! Push subscription persistence operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Upsert a subscription at its endpoint. Re-subscribing with fresh keys
/// clears any disabled state and previous error.
pub async fn upsert_subscription(
    pool: &SqlitePool,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO push_subscriptions (endpoint, p256dh, auth, created_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(endpoint) DO UPDATE SET
            p256dh = ?2, auth = ?3, disabled_at = NULL, last_error = NULL
        RETURNING id
        "#,
    )
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Mark a subscription's endpoint as permanently gone. The row is kept so
/// its rules are skipped rather than deleted.
pub async fn disable_subscription(pool: &SqlitePool, subscription_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE push_subscriptions SET disabled_at = ?2, last_error = 'endpoint gone' WHERE id = ?1",
    )
    .bind(subscription_id)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a transient delivery failure without disabling the subscription.
pub async fn record_push_error(pool: &SqlitePool, subscription_id: i64, error: &str) -> Result<()> {
    sqlx::query("UPDATE push_subscriptions SET last_error = ?2 WHERE id = ?1")
        .bind(subscription_id)
        .bind(error)
        .execute(pool)
        .await?;
    Ok(())
}
