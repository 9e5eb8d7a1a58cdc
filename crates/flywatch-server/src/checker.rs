//! The polling pass orchestrator.
//!
//! One pass: clean up expired rules, load the active set, pump every rule
//! through throttle -> fetch -> evaluate -> decide -> deliver under bounded
//! concurrency, then apply all row updates. A single rule's failure never
//! stops the others; the pass itself always completes with a summary.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

use flywatch_core::decision::{decide_notification, DecisionInput};
use flywatch_core::fingerprint::SlotEvaluation;
use flywatch_core::models::{criteria_blob, NotifyPolicy, RuleType, Status};
use flywatch_core::notify::build_notification;
use flywatch_core::throttle::should_skip_check;

use crate::cache::ForecastCache;
use crate::forecast::{FetchKey, ForecastProvider};
use crate::persistence::rules::{self, ActiveRule, RuleUpdate};
use crate::persistence::subscriptions;
use crate::push::{PushError, PushKeys, PushSender, PushTarget};

/// Max concurrent forecast provider calls.
const FETCH_CONCURRENCY: usize = 4;
/// Max concurrent rule pipelines.
const PIPELINE_CONCURRENCY: usize = 5;

/// Outcome of one pass, returned to the trigger caller.
#[derive(Debug, Serialize)]
pub struct PassSummary {
    pub checked_at: DateTime<Utc>,
    pub results: Vec<RuleCheckResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleCheckResult {
    pub rule_id: i64,
    pub status: Status,
    pub percent: u8,
    pub state_changed: bool,
}

/// Runs polling passes against a rule store, forecast provider and push
/// sender. Collaborators are injected so passes are testable end to end.
pub struct CheckRunner {
    pool: SqlitePool,
    provider: Arc<dyn ForecastProvider>,
    push: Arc<dyn PushSender>,
    notification_icon: Option<String>,
}

impl CheckRunner {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn ForecastProvider>,
        push: Arc<dyn PushSender>,
        notification_icon: Option<String>,
    ) -> Self {
        Self {
            pool,
            provider,
            push,
            notification_icon,
        }
    }

    /// Execute one full polling pass.
    pub async fn run_pass(&self) -> PassSummary {
        let now = Utc::now();

        // Best-effort cleanup; a failed delete never blocks the pass.
        match rules::delete_expired_rules(&self.pool, now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Removed {} expired rule(s)", n),
            Err(e) => tracing::warn!("Expired rule cleanup failed: {}", e),
        }

        let active = match rules::load_active_rules(&self.pool, now).await {
            Ok(active) => active,
            Err(e) => {
                tracing::error!("Failed to load rules, skipping pass: {}", e);
                return PassSummary {
                    checked_at: now,
                    results: Vec::new(),
                };
            }
        };

        tracing::debug!("Checking {} active rule(s)", active.len());
        let cache = ForecastCache::new(FETCH_CONCURRENCY);

        let outcomes: Vec<Option<(RuleUpdate, RuleCheckResult)>> =
            futures::stream::iter(active)
                .map(|rule| self.process_rule(rule, &cache, now))
                .buffer_unordered(PIPELINE_CONCURRENCY)
                .collect()
                .await;

        let (updates, results): (Vec<RuleUpdate>, Vec<RuleCheckResult>) =
            outcomes.into_iter().flatten().unzip();

        // Each update touches one row keyed by id, so they can land in any
        // order. Failures are logged and absorbed.
        let writes = updates
            .iter()
            .map(|update| rules::apply_rule_update(&self.pool, update));
        for (update, result) in updates.iter().zip(futures::future::join_all(writes).await) {
            if let Err(e) = result {
                tracing::warn!("Failed to persist state for rule {}: {}", update.rule_id, e);
            }
        }

        tracing::info!("Pass complete: {} rule(s) evaluated", results.len());
        PassSummary {
            checked_at: now,
            results,
        }
    }

    async fn process_rule(
        &self,
        active: ActiveRule,
        cache: &ForecastCache,
        now: DateTime<Utc>,
    ) -> Option<(RuleUpdate, RuleCheckResult)> {
        let rule = active.rule;

        let Some(subscription) = active.subscription else {
            tracing::debug!("Rule {} has no subscription, skipping", rule.id);
            return None;
        };
        if subscription.disabled {
            tracing::debug!("Rule {} subscription is disabled, skipping", rule.id);
            return None;
        }
        if rule.notify_on == NotifyPolicy::Disabled {
            tracing::debug!("Rule {} notifications disabled, skipping", rule.id);
            return None;
        }
        if should_skip_check(rule.last_checked_at, rule.start_date, now) {
            tracing::debug!("Rule {} throttled, skipping", rule.id);
            return None;
        }

        let fetched = cache
            .get_or_fetch(self.provider.as_ref(), &FetchKey::for_rule(&rule))
            .await;

        let eval = match &fetched {
            Ok(slots) => Some(SlotEvaluation::compute(slots, &rule.criteria)),
            Err(e) => {
                tracing::warn!("Forecast fetch failed for rule {}: {}", rule.id, e);
                None
            }
        };

        let decision = decide_notification(DecisionInput {
            eval: eval.as_ref(),
            prev_hash: rule.last_state_hash.as_deref(),
            prev_summary: rule.weather_summary.as_ref(),
            notify_on: rule.notify_on,
            rule_type: rule.metadata.rule_type,
        });

        if decision.should_notify {
            let payload = build_notification(
                rule.id,
                rule.start_date,
                &rule.metadata,
                &decision.summary,
                eval.as_ref().and_then(|e| e.flyable_hour_range),
                decision.entering_forecast,
                self.notification_icon.as_deref(),
            );
            let target = PushTarget {
                endpoint: subscription.endpoint.clone(),
                keys: PushKeys {
                    p256dh: subscription.p256dh.clone(),
                    auth: subscription.auth.clone(),
                },
            };

            match self.push.send(&target, &payload).await {
                Ok(()) => {
                    tracing::debug!("Notified rule {}: {}", rule.id, payload.title);
                }
                Err(PushError::Gone) => {
                    tracing::info!(
                        "Subscription {} endpoint gone, disabling",
                        subscription.id
                    );
                    if let Err(e) =
                        subscriptions::disable_subscription(&self.pool, subscription.id).await
                    {
                        tracing::warn!("Failed to disable subscription {}: {}", subscription.id, e);
                    }
                }
                Err(PushError::Delivery(msg)) => {
                    tracing::warn!("Push delivery failed for rule {}: {}", rule.id, msg);
                    if let Err(e) =
                        subscriptions::record_push_error(&self.pool, subscription.id, &msg).await
                    {
                        tracing::warn!(
                            "Failed to record push error for subscription {}: {}",
                            subscription.id,
                            e
                        );
                    }
                }
            }
        }

        // The entering-forecast transition rewrites the stored blob with the
        // rule flipped from future to standard.
        let new_blob = decision.entering_forecast.then(|| {
            let mut metadata = rule.metadata.clone();
            metadata.rule_type = RuleType::Standard;
            criteria_blob(&rule.criteria, &metadata)
        });

        let result = RuleCheckResult {
            rule_id: rule.id,
            status: decision.summary.status,
            percent: decision.summary.percent,
            state_changed: decision.state_changed,
        };
        let update = RuleUpdate {
            rule_id: rule.id,
            last_state_hash: decision.new_hash,
            last_checked_at: now,
            weather_summary: decision.summary,
            criteria_blob: new_blob,
        };

        Some((update, result))
    }
}
