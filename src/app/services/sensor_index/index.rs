//! Per-local-id sensor snapshot backed by the sensor store

use tracing::{debug, warn};

use super::partition::{SensorChunk, separate_by_sensor};
use super::sent_ranges::merge_sent_ranges;
use crate::Result;
use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::{Sensor, SensorMapping, TimeClass, Timestamp};

/// How a product's observations fell across the sensors of one local id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub chunks: Vec<SensorChunk>,

    /// Observations newer than every closed sensor
    pub uncovered_tail: usize,

    /// Observations assigned to no sensor, tail included
    pub dropped: usize,
}

/// Oldest-first sensors of one local id
#[derive(Debug, Clone, PartialEq)]
pub struct SensorIndex {
    pub local_id: String,
    pub sensors: Vec<Sensor>,
}

impl SensorIndex {
    pub fn from_mapping(mapping: &SensorMapping) -> Self {
        Self {
            local_id: mapping.local_id.clone(),
            sensors: mapping.sorted_by_earliest(),
        }
    }

    /// Load a local id's sensors with merged sent ranges
    ///
    /// Sensors whose ranges shrank on merging are written back. Returns `None`
    /// when the store has no mapping for `local_id`.
    pub async fn load_merged(
        store: &dyn SensorStore,
        local_id: &str,
        time_class: &TimeClass,
    ) -> Result<Option<Self>> {
        let Some(mapping) = store.find_mapping(local_id).await? else {
            return Ok(None);
        };

        let mut index = Self::from_mapping(&mapping);
        for sensor in &mut index.sensors {
            let merged = merge_sent_ranges(&sensor.sent_ranges, time_class);
            if merged != sensor.sent_ranges {
                debug!(
                    "{} sensor {}: merged {} sent ranges into {}",
                    local_id,
                    sensor.index,
                    sensor.sent_ranges.len(),
                    merged.len()
                );
                store
                    .set_sent_ranges(local_id, sensor.index, merged.clone())
                    .await?;
                sensor.sent_ranges = merged;
            }
        }
        Ok(Some(index))
    }

    /// Merge and write back the sent ranges stored for `local_id`
    ///
    /// Returns the number of ranges left over all sensors, zero when the
    /// store has no mapping for `local_id`.
    pub async fn merge_stored_ranges(
        store: &dyn SensorStore,
        local_id: &str,
        time_class: &TimeClass,
    ) -> Result<usize> {
        let ranges = Self::load_merged(store, local_id, time_class)
            .await?
            .map(|index| index.sensors.iter().map(|s| s.sent_ranges.len()).sum())
            .unwrap_or(0);
        Ok(ranges)
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn has_open_sensor(&self) -> bool {
        self.sensors.iter().any(Sensor::is_open_ended)
    }

    /// Latest closing day over all sensors, if none is open-ended
    fn latest_bound(&self) -> Option<Timestamp> {
        if self.has_open_sensor() {
            return None;
        }
        self.sensors.iter().filter_map(|s| s.latest_day).max()
    }

    /// Split sorted timestamps across the sensors
    pub fn partition(&self, timestamps: &[Timestamp]) -> Partition {
        let chunks = separate_by_sensor(timestamps, &self.sensors);
        let covered: usize = chunks.iter().map(SensorChunk::len).sum();

        let uncovered_tail = self
            .latest_bound()
            .map(|bound| timestamps.iter().rev().take_while(|ts| **ts > bound).count())
            .unwrap_or(0);

        if uncovered_tail > 0 {
            warn!(
                "{}: {} observations are newer than every sensor and were not sent",
                self.local_id, uncovered_tail
            );
        }

        Partition {
            chunks,
            uncovered_tail,
            dropped: timestamps.len() - covered,
        }
    }
}
