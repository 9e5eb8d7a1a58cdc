//! Push delivery seam.
//!
//! The raw Web Push crypto lives behind a relay; this module only knows how
//! to hand a payload to it and classify the failure modes the lifecycle
//! logic cares about.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use flywatch_core::models::NotificationPayload;

/// Delivery target: a subscription's endpoint and key pair.
#[derive(Debug, Clone, Serialize)]
pub struct PushTarget {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The endpoint is permanently gone (404/410); the subscription must be
    /// disabled, not retried.
    #[error("push endpoint gone")]
    Gone,
    /// Transient delivery failure; recorded, subscription stays active.
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// Opaque push delivery capability.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, target: &PushTarget, payload: &NotificationPayload)
        -> Result<(), PushError>;
}

/// Sender that posts subscription + payload to an HTTP push relay.
pub struct HttpPushSender {
    client: Client,
    relay_url: String,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: &'a PushTarget,
    payload: &'a NotificationPayload,
}

impl HttpPushSender {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            relay_url: relay_url.into(),
        }
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(
        &self,
        target: &PushTarget,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayRequest {
                subscription: target,
                payload,
            })
            .send()
            .await
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushError::Gone),
            status => Err(PushError::Delivery(format!("relay returned {status}"))),
        }
    }
}
