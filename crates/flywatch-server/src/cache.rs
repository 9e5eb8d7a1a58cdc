//! Per-pass forecast de-duplication cache.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};

use crate::forecast::{FetchKey, ForecastProvider};
use flywatch_core::models::WeatherSlot;

/// Shared fetch result. Errors are flattened to strings so results stay
/// cloneable across every rule waiting on the same key.
pub type SharedSlots = Result<Arc<Vec<WeatherSlot>>, String>;

/// Caches forecast results for the duration of one polling pass.
///
/// Each distinct [`FetchKey`] hits the provider at most once: concurrent
/// requests for the same key wait on a shared cell, and a semaphore bounds
/// how many provider calls can be in flight at a time.
pub struct ForecastCache {
    entries: DashMap<FetchKey, Arc<OnceCell<SharedSlots>>>,
    permits: Semaphore,
}

impl ForecastCache {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            entries: DashMap::new(),
            permits: Semaphore::new(max_in_flight),
        }
    }

    pub async fn get_or_fetch(
        &self,
        provider: &dyn ForecastProvider,
        key: &FetchKey,
    ) -> SharedSlots {
        let cell = self
            .entries
            .entry(*key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| async {
            // The semaphore is never closed; acquire cannot fail here.
            let _permit = self.permits.acquire().await.ok();
            match provider.fetch_slots(key).await {
                Ok(slots) => Ok(Arc::new(slots)),
                Err(e) => Err(e.to_string()),
            }
        })
        .await
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ForecastProvider for CountingProvider {
        async fn fetch_slots(&self, _key: &FetchKey) -> Result<Vec<WeatherSlot>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    fn key(lat: f64) -> FetchKey {
        FetchKey::new(
            lat,
            6.6,
            "2026-02-16".parse().unwrap(),
            "2026-02-16".parse().unwrap(),
            9,
            17,
        )
    }

    #[tokio::test]
    async fn same_key_fetches_once() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };
        let cache = ForecastCache::new(4);

        let k = key(46.5);
        let fetches = (0..8).map(|_| cache.get_or_fetch(&provider, &k));
        futures::future::join_all(fetches).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_fetch_separately() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };
        let cache = ForecastCache::new(4);

        cache.get_or_fetch(&provider, &key(46.5)).await.unwrap();
        cache.get_or_fetch(&provider, &key(47.5)).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
