//! Notification decision logic: compares the freshly computed state against
//! what the rule row last stored and applies the rule's notify policy.

use crate::fingerprint::{state_fingerprint, SlotEvaluation};
use crate::models::{NotifyPolicy, RuleType, Status, WeatherSummary, AWAITING_FORECAST};

/// Everything the decision needs about one rule's pass.
#[derive(Debug)]
pub struct DecisionInput<'a> {
    /// Fresh evaluation, or `None` when the forecast fetch failed.
    pub eval: Option<&'a SlotEvaluation>,
    /// Fingerprint stored by the previous pass.
    pub prev_hash: Option<&'a str>,
    /// Summary stored by the previous pass.
    pub prev_summary: Option<&'a WeatherSummary>,
    pub notify_on: NotifyPolicy,
    pub rule_type: RuleType,
}

/// Outcome of a rule's pass: what to store and whether to push.
#[derive(Debug, Clone)]
pub struct CheckDecision {
    pub new_hash: String,
    pub summary: WeatherSummary,
    pub should_notify: bool,
    /// The rule's target date just entered the forecast horizon; the stored
    /// metadata must flip from future to standard.
    pub entering_forecast: bool,
    pub state_changed: bool,
}

/// Apply the notification policy to a fresh evaluation.
pub fn decide_notification(input: DecisionInput<'_>) -> CheckDecision {
    let prev_flyable_count = input.prev_summary.map(|s| s.flyable_count);

    let Some(eval) = input.eval else {
        // Fetch failed: degrade to no-data. The empty pattern still produces
        // a fingerprint, so a rule that loses data counts as a state change.
        let new_hash = state_fingerprint(&[]);
        let state_changed = input.prev_hash != Some(new_hash.as_str());
        return CheckDecision {
            should_notify: state_changed && input.notify_on != NotifyPolicy::Disabled,
            new_hash,
            summary: WeatherSummary {
                status: Status::NoData,
                percent: 0,
                flyable_count: 0,
                total_count: 0,
                prev_flyable_count,
            },
            entering_forecast: false,
            state_changed,
        };
    };

    // Future-rule guard: target date still beyond the forecast horizon.
    // Nothing to say yet; hold the sentinel and a placeholder summary.
    if input.rule_type == RuleType::Future && eval.pattern.is_empty() {
        return CheckDecision {
            new_hash: AWAITING_FORECAST.to_string(),
            summary: WeatherSummary {
                status: Status::AwaitingForecast,
                percent: 0,
                flyable_count: 0,
                total_count: 0,
                prev_flyable_count,
            },
            should_notify: false,
            entering_forecast: false,
            state_changed: false,
        };
    }

    let new_hash = eval.fingerprint();
    let entering_forecast =
        input.prev_hash == Some(AWAITING_FORECAST) && !eval.pattern.is_empty();
    let state_changed = input.prev_hash != Some(new_hash.as_str());

    let should_notify = entering_forecast
        || input.notify_on == NotifyPolicy::Always
        || (state_changed && input.notify_on != NotifyPolicy::Disabled);

    CheckDecision {
        new_hash,
        summary: WeatherSummary {
            status: eval.status,
            percent: eval.percent,
            flyable_count: eval.flyable_count,
            total_count: eval.total_count,
            prev_flyable_count,
        },
        should_notify,
        entering_forecast,
        state_changed,
    }
}
