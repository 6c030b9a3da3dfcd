//! Sensor mapping persistence
//!
//! Each local id owns one [`SensorMapping`]. Next to the mappings the store
//! keeps the aggregate [`Counters`]. Two implementations share the same state
//! type: [`MemoryStore`] for tests and dry runs, and [`JsonFileStore`] which
//! rewrites a JSON document atomically after every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::app::models::{Counter, Counters, SentRange, Sensor, SensorMapping, Timestamp};
use crate::{Error, Result};

/// Operations the importer needs from its persistence layer
#[async_trait]
pub trait SensorStore: Send + Sync {
    /// Fail with [`Error::PersistenceUnavailable`] if the store cannot be used
    async fn ping(&self) -> Result<()>;

    async fn find_mapping(&self, local_id: &str) -> Result<Option<SensorMapping>>;

    /// Create an empty mapping unless one exists; returns whether it was created
    async fn insert_mapping(&self, local_id: &str) -> Result<bool>;

    /// Add a sensor to its mapping unless an identical one is present
    async fn add_sensor(&self, sensor: Sensor) -> Result<()>;

    async fn set_latest_day(&self, local_id: &str, index: u32, latest: Timestamp) -> Result<()>;

    /// Replace a sensor's sent ranges
    async fn set_sent_ranges(
        &self,
        local_id: &str,
        index: u32,
        ranges: Vec<SentRange>,
    ) -> Result<()>;

    /// Record one sent range; returns false if it was already recorded
    async fn add_sent_range(&self, local_id: &str, index: u32, range: SentRange) -> Result<bool>;

    async fn increment_counter(&self, counter: Counter, by: u64) -> Result<()>;

    async fn counters(&self) -> Result<Counters>;

    async fn all_mappings(&self) -> Result<Vec<SensorMapping>>;
}

/// Serializable contents of a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub mappings: BTreeMap<String, SensorMapping>,

    #[serde(default)]
    pub counters: Counters,
}

impl StoreState {
    fn sensor_mut(&mut self, local_id: &str, index: u32) -> Result<&mut Sensor> {
        self.mappings
            .get_mut(local_id)
            .ok_or_else(|| Error::mapping_not_found(local_id))?
            .sensor_mut(index)
            .ok_or_else(|| {
                Error::persistence(format!("Sensor {} of '{}' does not exist", index, local_id))
            })
    }

    fn insert_mapping(&mut self, local_id: &str) -> bool {
        if self.mappings.contains_key(local_id) {
            return false;
        }
        self.mappings
            .insert(local_id.to_string(), SensorMapping::new(local_id));
        true
    }

    fn add_sensor(&mut self, sensor: Sensor) -> Result<()> {
        let mapping = self
            .mappings
            .get_mut(&sensor.local_id)
            .ok_or_else(|| Error::mapping_not_found(&sensor.local_id))?;
        if !mapping.sensors.contains(&sensor) {
            mapping.sensors.push(sensor);
        }
        Ok(())
    }

    fn set_latest_day(&mut self, local_id: &str, index: u32, latest: Timestamp) -> Result<()> {
        self.sensor_mut(local_id, index)?.latest_day = Some(latest);
        Ok(())
    }

    fn set_sent_ranges(&mut self, local_id: &str, index: u32, ranges: Vec<SentRange>) -> Result<()> {
        self.sensor_mut(local_id, index)?.sent_ranges = ranges;
        Ok(())
    }

    fn add_sent_range(&mut self, local_id: &str, index: u32, range: SentRange) -> Result<bool> {
        let sensor = self.sensor_mut(local_id, index)?;
        if sensor.sent_ranges.contains(&range) {
            return Ok(false);
        }
        sensor.sent_ranges.push(range);
        Ok(true)
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every later operation fail as if the backend went away
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::persistence("in-memory store marked unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check()
    }

    async fn find_mapping(&self, local_id: &str) -> Result<Option<SensorMapping>> {
        self.check()?;
        Ok(self.state.lock().await.mappings.get(local_id).cloned())
    }

    async fn insert_mapping(&self, local_id: &str) -> Result<bool> {
        self.check()?;
        Ok(self.state.lock().await.insert_mapping(local_id))
    }

    async fn add_sensor(&self, sensor: Sensor) -> Result<()> {
        self.check()?;
        self.state.lock().await.add_sensor(sensor)
    }

    async fn set_latest_day(&self, local_id: &str, index: u32, latest: Timestamp) -> Result<()> {
        self.check()?;
        self.state.lock().await.set_latest_day(local_id, index, latest)
    }

    async fn set_sent_ranges(
        &self,
        local_id: &str,
        index: u32,
        ranges: Vec<SentRange>,
    ) -> Result<()> {
        self.check()?;
        self.state
            .lock()
            .await
            .set_sent_ranges(local_id, index, ranges)
    }

    async fn add_sent_range(&self, local_id: &str, index: u32, range: SentRange) -> Result<bool> {
        self.check()?;
        self.state.lock().await.add_sent_range(local_id, index, range)
    }

    async fn increment_counter(&self, counter: Counter, by: u64) -> Result<()> {
        self.check()?;
        self.state.lock().await.counters.increment(counter, by);
        Ok(())
    }

    async fn counters(&self) -> Result<Counters> {
        self.check()?;
        Ok(self.state.lock().await.counters.clone())
    }

    async fn all_mappings(&self) -> Result<Vec<SensorMapping>> {
        self.check()?;
        Ok(self.state.lock().await.mappings.values().cloned().collect())
    }
}

// =============================================================================
// JSON file store
// =============================================================================

/// Store persisted as one JSON document
///
/// The whole state is held in memory and written back after each change
/// through a temporary file in the same directory, so readers never see a
/// half-written document. A change that cannot be written is not applied.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => StoreState::default(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::json(format!("Corrupt sensor store {}", path.display()), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Creating new sensor store at {}", path.display());
                StoreState::default()
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        debug!(
            "Opened sensor store {} with {} mappings",
            path.display(),
            state.mappings.len()
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current contents
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    fn directory(&self) -> &Path {
        directory_of(&self.path)
    }

    fn write_document(path: &Path, json: &[u8]) -> Result<()> {
        let mut file = NamedTempFile::new_in(directory_of(path))
            .map_err(|e| Error::persistence(format!("Cannot stage store write: {}", e)))?;
        std::io::Write::write_all(&mut file, json)
            .map_err(|e| Error::persistence(format!("Cannot write store: {}", e)))?;
        file.persist(path).map_err(|e| {
            Error::persistence(format!("Cannot replace {}: {}", path.display(), e.error))
        })?;
        Ok(())
    }

    /// Apply `change` to a copy of the state and adopt it once it is on disk
    async fn mutate<R>(&self, change: impl FnOnce(&mut StoreState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let result = change(&mut next)?;

        let json = serde_json::to_vec_pretty(&next)
            .map_err(|e| Error::json("Failed to serialize sensor store", e))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::write_document(&path, &json))
            .await
            .map_err(|e| Error::persistence(format!("Store write task failed: {}", e)))??;

        *state = next;
        Ok(result)
    }
}

fn directory_of(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

#[async_trait]
impl SensorStore for JsonFileStore {
    async fn ping(&self) -> Result<()> {
        let dir = self.directory();
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Ok(()),
            Ok(_) => Err(Error::persistence(format!(
                "{} is not a writable directory",
                dir.display()
            ))),
            Err(e) => Err(Error::persistence(format!("{}: {}", dir.display(), e))),
        }
    }

    async fn find_mapping(&self, local_id: &str) -> Result<Option<SensorMapping>> {
        Ok(self.state.lock().await.mappings.get(local_id).cloned())
    }

    async fn insert_mapping(&self, local_id: &str) -> Result<bool> {
        self.mutate(|state| Ok(state.insert_mapping(local_id))).await
    }

    async fn add_sensor(&self, sensor: Sensor) -> Result<()> {
        self.mutate(|state| state.add_sensor(sensor)).await
    }

    async fn set_latest_day(&self, local_id: &str, index: u32, latest: Timestamp) -> Result<()> {
        self.mutate(|state| state.set_latest_day(local_id, index, latest))
            .await
    }

    async fn set_sent_ranges(
        &self,
        local_id: &str,
        index: u32,
        ranges: Vec<SentRange>,
    ) -> Result<()> {
        self.mutate(|state| state.set_sent_ranges(local_id, index, ranges))
            .await
    }

    async fn add_sent_range(&self, local_id: &str, index: u32, range: SentRange) -> Result<bool> {
        self.mutate(|state| state.add_sent_range(local_id, index, range))
            .await
    }

    async fn increment_counter(&self, counter: Counter, by: u64) -> Result<()> {
        self.mutate(|state| {
            state.counters.increment(counter, by);
            Ok(())
        })
        .await
    }

    async fn counters(&self) -> Result<Counters> {
        Ok(self.state.lock().await.counters.clone())
    }

    async fn all_mappings(&self) -> Result<Vec<SensorMapping>> {
        Ok(self.state.lock().await.mappings.values().cloned().collect())
    }
}
