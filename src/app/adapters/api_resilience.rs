//! Retry and caching wrappers around the sensor API
//!
//! [`RetryingApi`] wraps any [`SensorApi`] and re-issues failed calls:
//! a permission failure triggers one re-login with the stored credentials,
//! timeouts and other failures are retried with a linear backoff until the
//! attempt limit is reached.
//!
//! [`LookupCache`] memoizes catalog id lookups for a fixed time-to-live,
//! keyed by the lookup arguments.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::sensor_api::{ApiError, ApiResult, SensorApi};
use crate::app::models::{CatalogEntry, RemoteSensorSpec, ValueBatch};
use crate::constants::{DEFAULT_LOOKUP_TTL_SECS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS};
use crate::Result;

/// How often and how patiently failed calls are repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call for timeout and generic failures
    pub max_attempts: u32,

    /// Delay before the second attempt; grows linearly afterwards
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// Sensor API decorator adding re-login and retries
pub struct RetryingApi<A> {
    inner: A,
    policy: RetryPolicy,
    credentials: RwLock<Option<Credentials>>,
}

impl<A: SensorApi> RetryingApi<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            credentials: RwLock::new(None),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn relogin(&self) -> ApiResult<()> {
        let credentials = self.credentials.read().await.clone().ok_or_else(|| {
            ApiError::Permission("no stored credentials for re-login".to_string())
        })?;
        self.inner
            .login(&credentials.username, &credentials.password)
            .await
            .map(|_| ())
    }

    async fn call<T, F, Fut>(&self, operation: &str, allow_relogin: bool, mut request: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ApiResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        let mut relogged = !allow_relogin;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(ApiError::Permission(message)) if !relogged => {
                    relogged = true;
                    warn!("{} refused ({}), logging in again", operation, message);
                    self.relogin().await?;
                }
                Err(e @ (ApiError::Timeout(_) | ApiError::Other(_)))
                    if attempt < self.policy.max_attempts =>
                {
                    let delay = self.policy.backoff * attempt;
                    warn!(
                        "{} failed with {} error (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        e.kind(),
                        attempt,
                        self.policy.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<A: SensorApi> SensorApi for RetryingApi<A> {
    async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        *self.credentials.write().await = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self.call("login", false, || self.inner.login(username, password))
            .await
    }

    async fn add_sensor(&self, spec: &RemoteSensorSpec) -> ApiResult<u64> {
        self.call("addSensor", true, || self.inner.add_sensor(spec)).await
    }

    async fn get_measurands(&self, name: &str) -> ApiResult<Vec<CatalogEntry>> {
        self.call("getMeasurands", true, || self.inner.get_measurands(name))
            .await
    }

    async fn get_units(&self, name: &str, measurand_id: u64) -> ApiResult<Vec<CatalogEntry>> {
        self.call("getUnits", true, || self.inner.get_units(name, measurand_id))
            .await
    }

    async fn get_licenses(&self, short_name: &str) -> ApiResult<Vec<CatalogEntry>> {
        self.call("getLicenses", true, || self.inner.get_licenses(short_name))
            .await
    }

    async fn add_multiple_values(&self, batch: &ValueBatch) -> ApiResult<String> {
        self.call("addMultipleValues", true, || {
            self.inner.add_multiple_values(batch)
        })
        .await
    }
}

/// Time-limited memo of catalog id lookups
#[derive(Debug)]
pub struct LookupCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, u64)>>,
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_LOOKUP_TTL_SECS))
    }
}

impl LookupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached id for `key`, or fetch and remember it
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64>>,
    {
        if let Some((stored_at, id)) = self.entries.lock().await.get(key).copied() {
            if stored_at.elapsed() < self.ttl {
                debug!("Lookup cache hit for {}", key);
                return Ok(id);
            }
        }

        let id = fetch().await?;
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (Instant::now(), id));
        Ok(id)
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}
