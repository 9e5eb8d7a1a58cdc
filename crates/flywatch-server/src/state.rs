//! Shared application state.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::checker::CheckRunner;
use crate::config::Config;
use crate::forecast::{ForecastClient, ForecastProvider};
use crate::persistence::Database;
use crate::push::{HttpPushSender, PushSender};

/// Application state: the pool plus the injected collaborators a polling
/// pass needs.
pub struct AppState {
    pub config: Config,
    db: Database,
    provider: Arc<dyn ForecastProvider>,
    push: Arc<dyn PushSender>,
}

impl AppState {
    /// Production wiring: real forecast client and push relay sender.
    pub fn new(db: Database, config: Config) -> Self {
        let provider = Arc::new(ForecastClient::new(
            &config.forecast_base_url,
            &config.forecast_model,
        ));
        let push = Arc::new(HttpPushSender::new(&config.push_relay_url));
        Self::with_collaborators(db, config, provider, push)
    }

    /// Explicit wiring, used by tests to inject scripted collaborators.
    pub fn with_collaborators(
        db: Database,
        config: Config,
        provider: Arc<dyn ForecastProvider>,
        push: Arc<dyn PushSender>,
    ) -> Self {
        Self {
            config,
            db,
            provider,
            push,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    /// Build a pass runner over this state's collaborators.
    pub fn runner(&self) -> CheckRunner {
        CheckRunner::new(
            self.pool().clone(),
            self.provider.clone(),
            self.push.clone(),
            self.config.notification_icon.clone(),
        )
    }
}
