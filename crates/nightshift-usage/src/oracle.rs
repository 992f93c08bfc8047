use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nightshift_types::UsageReading;
use tokio::sync::RwLock;

use crate::adapters::UsageAdapter;
use crate::error::{UsageReadError, UsageResult};

#[derive(Clone)]
enum CachedResult {
    Ok(UsageReading),
    Err(UsageReadError),
}

struct CacheEntry {
    result: CachedResult,
    fetched_at: Instant,
}

/// Unified read interface over per-provider adapters. Caches the last
/// successful (or failed) read per provider for `ttl`; a scrape error is
/// cached alongside the attempt time so repeat callers within the window see
/// the same error rather than re-triggering an expensive scrape.
pub struct UsageOracle {
    adapters: HashMap<String, Arc<dyn UsageAdapter>>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl UsageOracle {
    pub fn new(adapters: Vec<Arc<dyn UsageAdapter>>, ttl: Duration) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|a| (a.provider().to_string(), a))
            .collect();
        Self {
            adapters,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn with_default_ttl(adapters: Vec<Arc<dyn UsageAdapter>>) -> Self {
        Self::new(adapters, Duration::from_secs(5 * 60))
    }

    pub async fn read(&self, provider: &str) -> UsageResult<UsageReading> {
        if let Some(entry) = self.cache.read().await.get(provider) {
            if entry.fetched_at.elapsed() < self.ttl {
                return match &entry.result {
                    CachedResult::Ok(reading) => Ok(reading.clone()),
                    CachedResult::Err(err) => Err(err.clone()),
                };
            }
        }

        let Some(adapter) = self.adapters.get(provider) else {
            return Err(UsageReadError::UnknownProvider(provider.to_string()));
        };

        tracing::debug!(provider, "usage cache miss, fetching");
        let outcome = match adapter.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, adapter.fetch())
                .await
                .unwrap_or(Err(UsageReadError::Timeout(timeout))),
            None => adapter.fetch().await,
        };

        let cached = match &outcome {
            Ok(reading) => CachedResult::Ok(reading.clone()),
            Err(err) => CachedResult::Err(err.clone()),
        };
        self.cache.write().await.insert(
            provider.to_string(),
            CacheEntry {
                result: cached,
                fetched_at: Instant::now(),
            },
        );

        outcome
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedAdapter;
    use nightshift_types::BudgetMode;

    fn sample_reading(weekly_pct: f64) -> UsageReading {
        UsageReading {
            provider: "claude".into(),
            session_pct: weekly_pct,
            weekly_pct,
            local_weekly: 1000,
            local_daily: 100,
            session_reset: None,
            weekly_reset: None,
        }
    }

    #[tokio::test]
    async fn unknown_provider_errors() {
        let oracle = UsageOracle::with_default_ttl(vec![]);
        let result = oracle.read("nonexistent").await;
        assert!(matches!(result, Err(UsageReadError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn cached_error_is_returned_within_ttl() {
        let adapter = Arc::new(CannedAdapter::err(
            "claude",
            UsageReadError::FileNotFound("x".into()),
        ));
        let oracle = UsageOracle::new(vec![adapter], Duration::from_secs(60));

        let first = oracle.read("claude").await;
        let second = oracle.read("claude").await;
        assert!(first.is_err());
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn successful_read_is_cached() {
        let adapter = Arc::new(CannedAdapter::ok("claude", sample_reading(42.0)));
        let oracle = UsageOracle::new(vec![adapter], Duration::from_secs(60));

        let reading = oracle.read("claude").await.unwrap();
        assert_eq!(reading.pct_for(BudgetMode::Weekly), 42.0);
    }
}
