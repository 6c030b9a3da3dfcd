//! In-process sensor API that accepts everything
//!
//! Used for `--dry-run` ingests and as the test double for handler tests.
//! Push outcomes can be scripted; unscripted pushes succeed.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::sensor_api::{ApiResult, SensorApi};
use crate::app::models::{CatalogEntry, RemoteSensorSpec, ValueBatch, ValueMessage};
use crate::constants::PUSH_OK_STATUS;

#[derive(Debug, Default)]
pub struct FakeApi {
    next_sensor_id: AtomicU64,
    logins: AtomicU64,
    lookups: AtomicU64,
    catalog: Mutex<HashMap<String, u64>>,
    push_script: Mutex<VecDeque<ApiResult<String>>>,
    pushed: Mutex<Vec<ValueBatch>>,
    created: Mutex<Vec<RemoteSensorSpec>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            next_sensor_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    /// Outcomes for the next pushes, in order
    pub async fn script_pushes(&self, outcomes: Vec<ApiResult<String>>) {
        self.push_script.lock().await.extend(outcomes);
    }

    /// Batches accepted so far
    pub async fn pushed_batches(&self) -> Vec<ValueBatch> {
        self.pushed.lock().await.clone()
    }

    pub async fn pushed_values(&self) -> Vec<ValueMessage> {
        self.pushed
            .lock()
            .await
            .iter()
            .flat_map(|batch| batch.collapsed_messages.iter().cloned())
            .collect()
    }

    pub async fn created_sensors(&self) -> Vec<RemoteSensorSpec> {
        self.created.lock().await.clone()
    }

    pub fn login_count(&self) -> u64 {
        self.logins.load(Ordering::SeqCst)
    }

    /// Catalog lookups served, across measurands, units and licenses
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn catalog_entry(&self, key: String, name: &str) -> Vec<CatalogEntry> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let mut catalog = self.catalog.lock().await;
        let next = catalog.len() as u64 + 1;
        let id = *catalog.entry(key).or_insert(next);
        vec![CatalogEntry {
            id,
            name: Some(name.to_string()),
        }]
    }
}

#[async_trait]
impl SensorApi for FakeApi {
    async fn login(&self, _username: &str, _password: &str) -> ApiResult<String> {
        let n = self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(format!("fake-token-{}", n))
    }

    async fn add_sensor(&self, spec: &RemoteSensorSpec) -> ApiResult<u64> {
        self.created.lock().await.push(spec.clone());
        Ok(self.next_sensor_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn get_measurands(&self, name: &str) -> ApiResult<Vec<CatalogEntry>> {
        Ok(self.catalog_entry(format!("measurand:{}", name), name).await)
    }

    async fn get_units(&self, name: &str, measurand_id: u64) -> ApiResult<Vec<CatalogEntry>> {
        Ok(self
            .catalog_entry(format!("unit:{}:{}", name, measurand_id), name)
            .await)
    }

    async fn get_licenses(&self, short_name: &str) -> ApiResult<Vec<CatalogEntry>> {
        Ok(self
            .catalog_entry(format!("license:{}", short_name), short_name)
            .await)
    }

    async fn add_multiple_values(&self, batch: &ValueBatch) -> ApiResult<String> {
        let outcome = self
            .push_script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(PUSH_OK_STATUS.to_string()));
        if matches!(outcome.as_deref(), Ok(PUSH_OK_STATUS)) {
            self.pushed.lock().await.push(batch.clone());
        }
        outcome
    }
}
