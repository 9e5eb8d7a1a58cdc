//! REST API routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::auth::{self, CheckSecret, RateLimiter};
use crate::config::Config;
use crate::persistence::rules::{self, NewRule};
use crate::persistence::subscriptions;
use crate::state::AppState;
use flywatch_core::models::{
    criteria_blob, Criteria, NotifyPolicy, RuleMetadata, RuleType, AWAITING_FORECAST,
};

/// Create the API router.
pub fn create_router(config: &Config) -> Router<Arc<AppState>> {
    let rate_limiter = RateLimiter::new(
        config.rate_limit_rps,
        config.rate_limit_enabled,
        config.trust_proxy,
    );
    let check_secret = CheckSecret(Arc::new(config.check_secret.clone()));

    // The trigger is for the external scheduler only.
    let trigger_routes = Router::new()
        .route("/v1/check", post(run_check))
        .layer(middleware::from_fn_with_state(
            check_secret,
            auth::require_check_secret,
        ));

    // Client-facing subscription lifecycle.
    let client_routes = Router::new()
        .route("/v1/subscriptions", post(create_subscription))
        .route("/v1/rules", post(upsert_rule))
        .route("/v1/rules/:id", delete(delete_rule))
        .layer(middleware::from_fn_with_state(rate_limiter, auth::rate_limit));

    trigger_routes.merge(client_routes)
}

/// POST /v1/check - run one polling pass. Any request body is ignored.
async fn run_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let summary = state.runner().run_pass().await;
    Json(json!({
        "ok": true,
        "checked_at": summary.checked_at.to_rfc3339(),
        "results": summary.results,
    }))
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    endpoint: String,
    keys: SubscribeKeys,
}

#[derive(Debug, Deserialize)]
struct SubscribeKeys {
    p256dh: String,
    auth: String,
}

/// POST /v1/subscriptions - register or refresh a push subscription.
async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> impl IntoResponse {
    if body.endpoint.trim().is_empty()
        || body.keys.p256dh.trim().is_empty()
        || body.keys.auth.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "endpoint and keys are required"})),
        )
            .into_response();
    }

    match subscriptions::upsert_subscription(
        state.pool(),
        body.endpoint.trim(),
        body.keys.p256dh.trim(),
        body.keys.auth.trim(),
    )
    .await
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({"ok": true, "subscription_id": id})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to store subscription: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to store subscription"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpsertRuleRequest {
    subscription_id: i64,
    lat: f64,
    lon: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    hour_from: u8,
    hour_to: u8,
    #[serde(default)]
    criteria: Value,
    #[serde(default)]
    notify_on: Option<String>,
}

impl UpsertRuleRequest {
    fn validate(&self) -> Result<(), &'static str> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err("lat/lon out of range");
        }
        if self.start_date > self.end_date {
            return Err("start_date must not be after end_date");
        }
        if (self.end_date - self.start_date).num_days() > 6 {
            return Err("date span must be at most 7 days");
        }
        if self.hour_from > 23 || self.hour_to > 23 || self.hour_from > self.hour_to {
            return Err("hour window must satisfy 0 <= hour_from <= hour_to <= 23");
        }
        Ok(())
    }
}

/// POST /v1/rules - create or replace a tracking rule at its natural key.
async fn upsert_rule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpsertRuleRequest>,
) -> impl IntoResponse {
    if let Err(msg) = body.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))).into_response();
    }

    // Normalize the thresholds, keep the loose metadata, and recombine into
    // the stored blob.
    let criteria = Criteria::from_json(&body.criteria);
    let metadata = RuleMetadata::from_json(&body.criteria);
    let last_state_hash = (metadata.rule_type == RuleType::Future)
        .then(|| AWAITING_FORECAST.to_string());

    let new_rule = NewRule {
        subscription_id: body.subscription_id,
        lat: body.lat,
        lon: body.lon,
        start_date: body.start_date,
        end_date: body.end_date,
        hour_from: body.hour_from,
        hour_to: body.hour_to,
        criteria_blob: criteria_blob(&criteria, &metadata),
        notify_on: body
            .notify_on
            .as_deref()
            .map(NotifyPolicy::from_str)
            .unwrap_or_default(),
        last_state_hash,
    };

    match rules::upsert_rule(state.pool(), &new_rule).await {
        Ok(id) => (StatusCode::CREATED, Json(json!({"ok": true, "rule_id": id}))).into_response(),
        Err(e) => {
            tracing::error!("Failed to upsert rule: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to store rule"})),
            )
                .into_response()
        }
    }
}

/// DELETE /v1/rules/:id
async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Path(rule_id): Path<i64>,
) -> impl IntoResponse {
    match rules::delete_rule(state.pool(), rule_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "rule not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to delete rule {}: {}", rule_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to delete rule"})),
            )
                .into_response()
        }
    }
}
