pub mod decision;
pub mod fingerprint;
pub mod models;
pub mod notify;
pub mod solar;
pub mod suitability;
pub mod throttle;

pub use decision::{decide_notification, CheckDecision, DecisionInput};
pub use fingerprint::{slot_is_relevant, state_fingerprint, SlotEvaluation};
pub use models::{
    criteria_blob, Criteria, NotificationPayload, NotifyPolicy, Rule, RuleMetadata, RuleType,
    Status, WeatherSlot, WeatherSummary, AWAITING_FORECAST,
};
pub use notify::{build_notification, date_label, normalize_base_path};
pub use solar::sun_altitude_deg;
pub use suitability::{slot_is_flyable, slot_risk};
pub use throttle::{min_interval_hours, should_skip_check};
